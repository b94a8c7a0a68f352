//! Parameter and user-function tables.
//!
//! The engine never evaluates an expression. It only decides where names are
//! replaced by their bound text: `substitute` swaps every parameter reference
//! in a fragment for its (recursively resolved) value and leaves everything
//! else byte-for-byte intact.
//!
//! Parameter names always compare case-insensitively.

use std::fmt;

use crate::lexer::{tokenize, Token, TokenKind};
use crate::symtab::{KeyPolicy, SymbolTable};

/// Bound on value-to-value resolution, so `a=b b=a` terminates.
const MAX_RESOLVE_DEPTH: usize = 8;

// ============================================================================
// ASSIGNMENTS
// ============================================================================

/// One `name=value` or `name(args)=body` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    /// Present for user-function definitions.
    pub args: Option<Vec<String>>,
    pub value: String,
}

/// Parses a run of assignments such as `w=1u, l = {2*w} f(x)=x*x`.
///
/// A leading `params:` keyword is skipped. Values end at the first blank or
/// comma outside parentheses, braces, brackets and single quotes. Items that
/// are not assignments are ignored.
pub fn parse_assignments(text: &str) -> Vec<Assignment> {
    let tokens = tokenize(text);
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];
        if tok.kind != TokenKind::Ident || tok.text.eq_ignore_ascii_case("params:") {
            i += 1;
            continue;
        }
        let name = tok.text.to_string();
        let mut j = skip_space(&tokens, i + 1);
        let mut args = None;
        if tokens.get(j).map_or(false, |t| t.is(TokenKind::ParenOpen)) {
            let mut list = Vec::new();
            j += 1;
            while let Some(t) = tokens.get(j) {
                match t.kind {
                    TokenKind::ParenClose => break,
                    TokenKind::Ident => list.push(t.text.to_string()),
                    _ => {}
                }
                j += 1;
            }
            args = Some(list);
            j = skip_space(&tokens, j + 1);
        }
        if !tokens.get(j).map_or(false, |t| t.is(TokenKind::Equals)) {
            i += 1;
            continue;
        }
        j = skip_space(&tokens, j + 1);
        let (value, next) = scan_value(&tokens, j);
        out.push(Assignment { name, args, value });
        i = next;
    }
    out
}

fn skip_space(tokens: &[Token<'_>], mut i: usize) -> usize {
    while tokens.get(i).map_or(false, |t| t.is(TokenKind::Space)) {
        i += 1;
    }
    i
}

fn scan_value(tokens: &[Token<'_>], start: usize) -> (String, usize) {
    let mut depth = 0usize;
    let mut quoted = false;
    let mut value = String::new();
    let mut i = start;
    while let Some(t) = tokens.get(i) {
        let at_top = depth == 0 && !quoted;
        if at_top && matches!(t.kind, TokenKind::Space | TokenKind::Comma) {
            break;
        }
        match (t.kind, t.text) {
            (TokenKind::ParenOpen | TokenKind::BracketOpen, _) | (TokenKind::Punct, "{") => {
                depth += 1
            }
            (TokenKind::ParenClose | TokenKind::BracketClose, _) | (TokenKind::Punct, "}") => {
                depth = depth.saturating_sub(1)
            }
            (TokenKind::Punct, "'") => quoted = !quoted,
            _ => {}
        }
        value.push_str(t.text);
        i += 1;
    }
    (value, i)
}

// ============================================================================
// PARAMETER TABLE
// ============================================================================

/// Parameter name to value text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTable {
    table: SymbolTable<String>,
}

impl Default for ParamTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamTable {
    pub fn new() -> Self {
        Self {
            table: SymbolTable::new(KeyPolicy::Insensitive),
        }
    }

    /// Table holding the plain assignments found in `text`, values kept raw.
    pub fn from_assignments(text: &str) -> Self {
        let mut table = Self::new();
        for item in parse_assignments(text) {
            if item.args.is_none() {
                table.define(&item.name, &item.value);
            }
        }
        table
    }

    pub fn define(&mut self, name: &str, value: &str) {
        self.table.insert(name, value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.table.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.table.names()
    }

    /// `(name, value)` pairs sorted by name.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .table
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        entries.sort();
        entries
    }

    /// New table with every entry of `overlay` layered over `base`.
    pub fn update(base: &ParamTable, overlay: &ParamTable) -> ParamTable {
        ParamTable {
            table: base.table.update(&overlay.table),
        }
    }

    /// Defines the assignments of a `.param` statement body. Right-hand sides
    /// are resolved against the table as it stands, so later definitions see
    /// earlier ones. Function definitions go to `funcs`.
    pub fn define_statement(&mut self, text: &str, funcs: &mut UserFuncTable) {
        for item in parse_assignments(text) {
            match item.args {
                Some(args) => funcs.define(&item.name, args, &item.value),
                None => {
                    let value = self.substitute(&item.value);
                    self.define(&item.name, &value);
                }
            }
        }
    }

    /// Replaces parameter references in an expression fragment.
    ///
    /// Identifiers are left alone when they are called (`f(...)`), assigned
    /// (`name=`), follow a `.` or `@`, or sit inside a double-quoted string.
    pub fn substitute(&self, text: &str) -> String {
        self.substitute_at(text, 0)
    }

    /// Like `substitute`, but keeps the first word (the statement's own name).
    pub fn substitute_line(&self, text: &str) -> String {
        let lead = text.len() - text.trim_start().len();
        let body = &text[lead..];
        let split = body
            .find(|c: char| c.is_whitespace())
            .unwrap_or(body.len());
        let (head, tail) = text.split_at(lead + split);
        format!("{}{}", head, self.substitute(tail))
    }

    fn substitute_at(&self, text: &str, depth: usize) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        let tokens = tokenize(text);
        let mut out = String::with_capacity(text.len());
        for (i, tok) in tokens.iter().enumerate() {
            if tok.kind == TokenKind::Ident && self.is_reference(&tokens, i) {
                if let Some(value) = self.get(tok.text) {
                    if depth < MAX_RESOLVE_DEPTH {
                        out.push_str(&self.substitute_at(value, depth + 1));
                    } else {
                        out.push_str(value);
                    }
                    continue;
                }
            }
            out.push_str(tok.text);
        }
        out
    }

    fn is_reference(&self, tokens: &[Token<'_>], i: usize) -> bool {
        if i > 0 {
            let prev = tokens[i - 1];
            if prev.is(TokenKind::At) || (prev.is(TokenKind::Punct) && prev.text == ".") {
                return false;
            }
        }
        let next = skip_space(tokens, i + 1);
        match tokens.get(next) {
            Some(t) if t.is(TokenKind::ParenOpen) => false,
            Some(t) if t.is(TokenKind::Equals) => {
                // `a == b` is a comparison, not an assignment.
                tokens
                    .get(next + 1)
                    .map_or(false, |after| after.is(TokenKind::Equals))
            }
            _ => true,
        }
    }
}

impl fmt::Display for ParamTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .entries()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}", items.join(" "))
    }
}

// ============================================================================
// USER FUNCTIONS
// ============================================================================

/// A `name(args)=body` definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFunc {
    pub args: Vec<String>,
    pub body: String,
}

/// User-defined functions, carried alongside parameters and through caches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserFuncTable {
    table: SymbolTable<UserFunc>,
}

impl UserFuncTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, args: Vec<String>, body: &str) {
        self.table.insert(
            name,
            UserFunc {
                args,
                body: body.to_string(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&UserFunc> {
        self.table.get(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.table.names()
    }

    pub fn update(base: &UserFuncTable, overlay: &UserFuncTable) -> UserFuncTable {
        UserFuncTable {
            table: base.table.update(&overlay.table),
        }
    }
}
