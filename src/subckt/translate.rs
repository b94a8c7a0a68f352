//! Hygienic renaming of an expanded subcircuit body.
//!
//! ## Passes
//!
//! 1. **Models**: every live `.model` line is renamed for the instance, its
//!    parameters substituted, and the mapping recorded in the frame's aliases.
//! 2. **Devices**: every live device line gets its name, nodes, device
//!    references and model reference translated. The trailing parameter text
//!    is substituted and then run through `finish_line`, which renames the
//!    `v(...)`, `i(...)` and `@dev[...]` references embedded in expressions.
//!
//! Node translation: ground and global nodes pass through, formals become
//! their actuals, anything else is internal and gets the instance catenated.

use crate::config::{CatMode, ExpandConfig};
use crate::deck::{Deck, Line};
use crate::device::DeviceCatalog;
use crate::errors::{ErrorKind, ErrorReporting, NetlistError, PhaseContext};
use crate::lexer::{split_words, tokenize, Token, TokenKind, Word};
use crate::params::ParamTable;
use crate::symtab::NameSet;

use super::trans::TranslationTable;
use super::types::{split_bin, ScopeStack};

/// Largest accepted `poly(N)` dimension.
pub const MAX_POLY_DIM: usize = 20;

const NODE_ACCESSORS: [&str; 6] = ["v", "vm", "vp", "vr", "vi", "vdb"];
const BRANCH_ACCESSORS: [&str; 6] = ["i", "im", "ip", "ir", "ii", "idb"];

// ============================================================================
// CATENATION
// ============================================================================

/// Builds instance-scoped names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Catenation {
    pub mode: CatMode,
    pub sep: char,
}

impl Catenation {
    pub fn from_config(config: &ExpandConfig) -> Self {
        Self {
            mode: config.cat_mode,
            sep: config.cat_char,
        }
    }

    pub fn node(&self, name: &str, inst: &str) -> String {
        match self.mode {
            CatMode::Wrspice => format!("{}{}{}", name, self.sep, inst),
            CatMode::Spice3 => format!("{}{}{}", inst, self.sep, name),
        }
    }

    /// The device key letter stays in front under both modes.
    pub fn device(&self, name: &str, inst: &str) -> String {
        match self.mode {
            CatMode::Wrspice => format!("{}{}{}", name, self.sep, inst),
            CatMode::Spice3 => {
                let key = name.chars().next().map(String::from).unwrap_or_default();
                format!("{}{}{}{}{}", key, self.sep, inst, self.sep, name)
            }
        }
    }

    /// Binned names keep their `.N` suffix last.
    pub fn model(&self, name: &str, inst: &str) -> String {
        let (base, bin) = split_bin(name);
        let joined = self.node(base, inst);
        match bin {
            Some(bin) => joined + bin,
            None => joined,
        }
    }
}

// ============================================================================
// TRANSLATOR
// ============================================================================

enum PolyMode {
    Nodes,
    DeviceRefs,
}

/// Renames one instantiation's body.
pub struct Translator<'a> {
    instance: &'a str,
    table: &'a TranslationTable,
    params: &'a ParamTable,
    globals: &'a NameSet,
    config: &'a ExpandConfig,
    devices: &'a dyn DeviceCatalog,
    cat: Catenation,
    reporter: PhaseContext,
}

impl<'a> Translator<'a> {
    pub fn new(
        instance: &'a str,
        table: &'a TranslationTable,
        params: &'a ParamTable,
        globals: &'a NameSet,
        config: &'a ExpandConfig,
        devices: &'a dyn DeviceCatalog,
    ) -> Self {
        Self {
            instance,
            table,
            params,
            globals,
            config,
            devices,
            cat: Catenation::from_config(config),
            reporter: PhaseContext::new("translate"),
        }
    }

    /// Runs both passes over `body`. Model aliases are recorded in the top
    /// frame of `stack`, which must be the frame the body was expanded in.
    pub fn translate(&self, body: &mut Deck, stack: &mut ScopeStack) -> Result<(), NetlistError> {
        let directives = &self.config.directives;

        for id in body.ids() {
            let Some(line) = body.get_mut(id) else { continue };
            if line.is_live() && directives.is_model(line.keyword()) {
                if let Some((orig, translated, text)) = self.translate_model(&line.text) {
                    stack.top_mut().models.insert(&orig, &translated);
                    line.text = text;
                }
            }
        }

        for id in body.ids() {
            let Some(line) = body.get_mut(id) else { continue };
            if !line.is_live() {
                continue;
            }
            let keyword = line.keyword();
            let first = keyword.chars().next();
            if first.map_or(false, |c| c.is_ascii_alphabetic()) {
                match self.translate_device(line, stack) {
                    Ok(text) => line.text = text,
                    Err(err) => {
                        line.set_error(err.kind.to_string());
                        return Err(err);
                    }
                }
            } else if first == Some('.') && self.is_plain_control(keyword) {
                line.text = self.translate_control(&line.text);
            }
        }
        Ok(())
    }

    /// Translation of a node token.
    pub fn translate_node(&self, name: &str) -> String {
        let name = if self.config.subst_nodes {
            self.params.substitute(name)
        } else {
            name.to_string()
        };
        self.table
            .gettrans(&name, self.globals)
            .unwrap_or_else(|| self.cat.node(&name, self.instance))
    }

    pub fn translate_device_name(&self, name: &str) -> String {
        self.cat.device(name, self.instance)
    }

    // Returns (original name, translated name, new line text).
    fn translate_model(&self, text: &str) -> Option<(String, String, String)> {
        let words = split_words(text);
        let keyword = words.first()?;
        let name = words.get(1)?;
        let translated = self.cat.model(name.text, self.instance);
        let rest = self.params.substitute(&text[name.end..]);
        let line = format!("{} {}{}", keyword.text, translated, rest);
        Some((name.text.to_string(), translated, line))
    }

    fn is_plain_control(&self, keyword: &str) -> bool {
        let d = &self.config.directives;
        !(d.is_model(keyword)
            || d.is_start(keyword)
            || d.is_end(keyword)
            || d.is_param(keyword)
            || d.is_global(keyword)
            || d.is_cache_start(keyword)
            || d.is_cache_end(keyword))
    }

    // `.ic v(a)=1` and friends: references renamed, parameters substituted.
    fn translate_control(&self, text: &str) -> String {
        let split = text.find(char::is_whitespace).unwrap_or(text.len());
        let (keyword, rest) = text.split_at(split);
        format!("{}{}", keyword, self.finish_line(&self.params.substitute(rest)))
    }

    fn translate_device(&self, line: &Line, stack: &ScopeStack) -> Result<String, NetlistError> {
        let text = line.text.as_str();
        let words = split_words(text);
        let Some(name) = words.first() else {
            return Ok(text.to_string());
        };
        let mut head = vec![self.translate_device_name(name.text)];
        let mut i = 1;
        let key = name.text.chars().next().unwrap_or(' ');
        let mut model_seen = false;

        if let Some(info) = self.devices.info(key) {
            let mut poly_seen = false;
            let mut nodes = 0;
            while nodes < info.max_nodes && i < words.len() && !is_assignment(&words, i) {
                let word = words[i].text;
                if is_poly(word) {
                    i = self.polytrans(&words, i, PolyMode::Nodes, &mut head, line)?;
                    poly_seen = true;
                    break;
                }
                if info.has_model && nodes >= info.min_nodes {
                    if let Some(alias) = self.find_model(stack, word, line)? {
                        head.push(alias);
                        model_seen = true;
                        i += 1;
                        break;
                    }
                }
                head.push(self.translate_node(word));
                nodes += 1;
                i += 1;
            }

            if !poly_seen && !model_seen {
                for _ in 0..info.dev_refs {
                    if i >= words.len() || is_assignment(&words, i) {
                        break;
                    }
                    if is_poly(words[i].text) {
                        i = self.polytrans(&words, i, PolyMode::DeviceRefs, &mut head, line)?;
                        break;
                    }
                    head.push(self.translate_device_name(words[i].text));
                    i += 1;
                }
            }

            if info.has_model && !model_seen {
                if i >= words.len() || is_assignment(&words, i) {
                    return Err(self.reporter.missing_model(name.text, line));
                }
                let word = words[i].text;
                match self.find_model(stack, word, line)? {
                    Some(alias) => head.push(alias),
                    None if self.config.strict_models => {
                        return Err(self.reporter.report(
                            ErrorKind::UnknownModel {
                                device: name.text.to_string(),
                                model: word.to_string(),
                            },
                            line,
                        ))
                    }
                    None => head.push(word.to_string()),
                }
                model_seen = true;
                i += 1;
            }
        }

        // Value-or-model slot of devices whose model is optional (`r1 a b rmod`).
        if !model_seen && i < words.len() && !is_assignment(&words, i) {
            let word = words[i].text;
            if word.starts_with(|c: char| c.is_ascii_alphabetic()) {
                let local = stack
                    .top()
                    .models
                    .lookup(word)
                    .map_err(|kind| self.reporter.report(kind, line))?;
                if let Some(alias) = local {
                    head.push(alias);
                    i += 1;
                }
            }
        }

        let rest_start = words.get(i).map_or(text.len(), |w| w.start);
        let rest = self.finish_line(&self.params.substitute(&text[rest_start..]));
        let head = head.join(" ");
        Ok(if rest.trim().is_empty() {
            head
        } else {
            format!("{} {}", head, rest.trim_start())
        })
    }

    fn find_model(
        &self,
        stack: &ScopeStack,
        name: &str,
        line: &Line,
    ) -> Result<Option<String>, NetlistError> {
        stack
            .find_model(name)
            .map_err(|kind| self.reporter.report(kind, line))
    }

    /// Translates a `poly(N)` construct starting at `words[at]` and returns
    /// the index of the first word after it.
    fn polytrans(
        &self,
        words: &[Word<'_>],
        at: usize,
        mode: PolyMode,
        out: &mut Vec<String>,
        line: &Line,
    ) -> Result<usize, NetlistError> {
        let malformed = |reason: String| {
            self.reporter
                .report(ErrorKind::MalformedPoly { reason }, line)
        };
        let (dim_text, mut next) = match poly_dimension(words[at].text) {
            Some(dim) => (dim, at + 1),
            None => match words.get(at + 1) {
                Some(word) => (word.text.trim_matches(|c: char| c == '(' || c == ')').to_string(), at + 2),
                None => return Err(malformed("missing dimension".into())),
            },
        };
        let dim: usize = dim_text
            .parse()
            .map_err(|_| malformed(format!("bad dimension '{}'", dim_text)))?;
        if dim > MAX_POLY_DIM {
            return Err(malformed(format!(
                "dimension {} out of range 0..={}",
                dim, MAX_POLY_DIM
            )));
        }
        let needed = match mode {
            PolyMode::Nodes => 2 * dim,
            PolyMode::DeviceRefs => dim,
        };
        let mut names = Vec::with_capacity(needed);
        while names.len() < needed {
            let Some(word) = words.get(next) else {
                return Err(malformed(format!(
                    "expected {} controlling names, found {}",
                    needed,
                    names.len()
                )));
            };
            next += 1;
            let name = word.text.trim_matches(|c: char| c == '(' || c == ')');
            if name.is_empty() {
                continue;
            }
            names.push(match mode {
                PolyMode::Nodes => self.translate_node(name),
                PolyMode::DeviceRefs => self.translate_device_name(name),
            });
        }
        out.push(format!("poly({})", dim));
        out.extend(names);
        Ok(next)
    }

    /// Renames references embedded in expression text: the arguments of
    /// `v(...)`-style accessors are nodes, those of `i(...)`-style accessors
    /// are devices, and `@dev[param]` names a device. Everything else is
    /// copied through.
    pub fn finish_line(&self, text: &str) -> String {
        let tokens = tokenize(text);
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < tokens.len() {
            let tok = tokens[i];
            let after_name = i > 0 && tokens[i - 1].is_name();
            if tok.kind == TokenKind::Ident && !after_name {
                if let Some(end) = self.accessor(&tokens, i, &mut out) {
                    i = end;
                    continue;
                }
            }
            if tok.kind == TokenKind::At {
                if let Some(dev) = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Ident) {
                    out.push('@');
                    out.push_str(&self.translate_device_name(dev.text));
                    i += 2;
                    continue;
                }
            }
            out.push_str(tok.text);
            i += 1;
        }
        out
    }

    // Rewrites an accessor call starting at `tokens[at]` into `out`. Returns
    // the index past the closing parenthesis.
    fn accessor(&self, tokens: &[Token<'_>], at: usize, out: &mut String) -> Option<usize> {
        let name = tokens[at].text.to_ascii_lowercase();
        let nodes = NODE_ACCESSORS.contains(&name.as_str());
        if !nodes && !BRANCH_ACCESSORS.contains(&name.as_str()) {
            return None;
        }
        if !tokens.get(at + 1).map_or(false, |t| t.is(TokenKind::ParenOpen)) {
            return None;
        }
        let close = tokens[at + 2..]
            .iter()
            .position(|t| t.is(TokenKind::ParenClose))
            .map(|p| p + at + 2)?;

        out.push_str(tokens[at].text);
        out.push('(');
        for tok in &tokens[at + 2..close] {
            if tok.is_name() {
                let renamed = if nodes {
                    self.translate_node(tok.text)
                } else {
                    self.translate_device_name(tok.text)
                };
                out.push_str(&renamed);
            } else {
                out.push_str(tok.text);
            }
        }
        out.push(')');
        Some(close + 1)
    }
}

/// Byte offset where the node tokens of a device line end.
///
/// Covers the device name and up to `max_nodes` following words, stopping
/// early at an assignment or a `poly(N)` construct. Unknown device letters
/// only cover the name.
pub fn node_span(text: &str, devices: &dyn DeviceCatalog) -> usize {
    let words = split_words(text);
    let Some(name) = words.first() else {
        return text.len();
    };
    let Some(info) = name.text.chars().next().and_then(|key| devices.info(key)) else {
        return name.end;
    };
    let mut end = name.end;
    for i in 1..words.len().min(info.max_nodes + 1) {
        if is_assignment(&words, i) || is_poly(words[i].text) {
            break;
        }
        end = words[i].end;
    }
    end
}

fn is_assignment(words: &[Word<'_>], i: usize) -> bool {
    words[i].text.contains('=')
        || words
            .get(i + 1)
            .map_or(false, |next| next.text.starts_with('='))
}

fn is_poly(word: &str) -> bool {
    let tokens = tokenize(word);
    match tokens.as_slice() {
        [first, rest @ ..] => {
            first.kind == TokenKind::Ident
                && first.text.eq_ignore_ascii_case("poly")
                && rest.first().map_or(true, |t| t.is(TokenKind::ParenOpen))
        }
        [] => false,
    }
}

// `poly(3)` -> Some("3"); bare `poly` -> None.
fn poly_dimension(word: &str) -> Option<String> {
    let open = word.find('(')?;
    let inner = &word[open + 1..];
    Some(inner.trim_end_matches(')').trim().to_string())
}
