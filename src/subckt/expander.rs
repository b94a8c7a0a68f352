//! The expansion driver.
//!
//! For each nesting level the driver extracts the level's definitions into
//! the current frame, seeds the frame's model aliases, and walks the
//! remaining lines. Every call is parsed, resolved innermost-first through the
//! scope stack, recursively expanded in a fresh frame, translated for its
//! instance and spliced in after the (commented-out) call line.
//!
//! ## Error policy
//!
//! - Unknown subcircuits are batched: the walk continues, each distinct name
//!   is reported once, and the expansion fails after the top-level walk.
//! - Every other error aborts the expansion immediately. The offending line is
//!   annotated at each level on the way out.
//! - An empty subcircuit body only produces a warning.

use once_cell::sync::Lazy;

use crate::cache::CacheStore;
use crate::config::{ExpandConfig, MergePolicy};
use crate::deck::{Deck, Line, LineId};
use crate::device::{DeviceCatalog, SpiceDevices};
use crate::errors::{ErrorKind, ErrorReporting, ExpansionErrors, NetlistError, PhaseContext, Warning};
use crate::lexer::{assignment_start, split_words};
use crate::params::{parse_assignments, ParamTable, UserFuncTable};
use crate::symtab::{KeyPolicy, NameSet};

use super::extract::{collect_globals, collect_params, extract_definitions, seed_models};
use super::trans::TranslationTable;
use super::translate::{node_span, Translator};
use super::types::{ExpansionStep, ScopeStack};

static SPICE_DEVICES: Lazy<SpiceDevices> = Lazy::new(SpiceDevices::new);

// ============================================================================
// CALL PARSING
// ============================================================================

/// The parts of an instantiation statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub instance: String,
    pub actuals: Vec<String>,
    pub subckt: String,
    /// The trailing `name=value` text, verbatim.
    pub assignments: String,
}

/// Splits `x1 a b sub [params:] w=1` into its parts. `None` when the
/// statement has no subcircuit name.
pub fn parse_call(text: &str) -> Option<CallSite> {
    let split = assignment_start(text);
    let words: Vec<&str> = split_words(&text[..split])
        .iter()
        .map(|w| w.text)
        .filter(|w| !w.eq_ignore_ascii_case("params:"))
        .collect();
    let (instance, rest) = words.split_first()?;
    let (subckt, actuals) = rest.split_last()?;
    Some(CallSite {
        instance: instance.to_string(),
        actuals: actuals.iter().map(|a| a.to_string()).collect(),
        subckt: subckt.to_string(),
        assignments: text[split..].trim().to_string(),
    })
}

// ============================================================================
// RESULT
// ============================================================================

/// A successful expansion.
#[derive(Debug, Clone)]
pub struct Expansion {
    /// The flat deck. Definition and call lines are retained, disabled.
    pub deck: Deck,
    /// Top-level parameters after `.param` collection.
    pub params: ParamTable,
    pub user_funcs: UserFuncTable,
    pub globals: NameSet,
    pub warnings: Vec<Warning>,
    /// Inlined calls, innermost first.
    pub trace: Vec<ExpansionStep>,
}

// ============================================================================
// EXPANDER
// ============================================================================

/// Per-expansion state. Consumed by `expand`.
pub struct Expander<'a> {
    config: &'a ExpandConfig,
    devices: &'a dyn DeviceCatalog,
    cache: &'a CacheStore,
    reporter: PhaseContext,
    globals: NameSet,
    funcs: UserFuncTable,
    warnings: Vec<Warning>,
    trace: Vec<ExpansionStep>,
    unresolved: Vec<NetlistError>,
    unresolved_names: NameSet,
}

impl<'a> Expander<'a> {
    pub fn new(config: &'a ExpandConfig) -> Self {
        Self {
            config,
            devices: &*SPICE_DEVICES,
            cache: CacheStore::global(),
            reporter: PhaseContext::new("expand"),
            globals: NameSet::new(config.case_policy),
            funcs: UserFuncTable::new(),
            warnings: Vec::new(),
            trace: Vec::new(),
            unresolved: Vec::new(),
            unresolved_names: NameSet::new(KeyPolicy::Insensitive),
        }
    }

    pub fn with_devices(mut self, devices: &'a dyn DeviceCatalog) -> Self {
        self.devices = devices;
        self
    }

    pub fn with_cache(mut self, cache: &'a CacheStore) -> Self {
        self.cache = cache;
        self
    }

    /// Expands every instantiation in `deck`.
    ///
    /// With a cache block name, the block's definitions are loaded into the
    /// root frame, its parameters and functions become the base layer under
    /// `params` and `funcs`, and its `.model` lines are placed at the front of
    /// the deck.
    pub fn expand(
        mut self,
        mut deck: Deck,
        params: &ParamTable,
        funcs: &UserFuncTable,
        block: Option<&str>,
    ) -> Result<Expansion, ExpansionErrors> {
        let mut stack = ScopeStack::new(self.config.max_depth, self.config.case_policy);
        let mut params = params.clone();
        self.funcs = funcs.clone();

        if let Some(name) = block {
            let Some(cached) = self.cache.get(name) else {
                let err = self.reporter.report_unlined(
                    ErrorKind::CacheBlockNotFound {
                        name: name.to_string(),
                    },
                    &format!("{} {}", self.config.directives.cache_start, name),
                );
                return Err(ExpansionErrors::single(err).with_deck(deck));
            };
            let root = stack.root_mut();
            for (def_name, def) in cached.subckts.iter() {
                root.subckts.insert(def_name, def.clone());
            }
            params = ParamTable::update(&cached.params, &params);
            self.funcs = UserFuncTable::update(&cached.user_funcs, &self.funcs);
            let models = cached
                .models
                .names()
                .into_iter()
                .filter_map(|model| cached.models.get(&model).map(Line::synthesized))
                .collect::<Deck>();
            deck.splice_front(models);
        }

        if let Err(err) = self.expand_level(&mut deck, &mut stack, &mut params, 0) {
            return Err(ExpansionErrors {
                errors: vec![err],
                deck: Some(deck),
            });
        }
        if !self.unresolved.is_empty() {
            return Err(ExpansionErrors {
                errors: self.unresolved,
                deck: Some(deck),
            });
        }
        Ok(Expansion {
            deck,
            params,
            user_funcs: self.funcs,
            globals: self.globals,
            warnings: self.warnings,
            trace: self.trace,
        })
    }

    fn expand_level(
        &mut self,
        deck: &mut Deck,
        stack: &mut ScopeStack,
        params: &mut ParamTable,
        depth: usize,
    ) -> Result<(), NetlistError> {
        let config = self.config;
        let directives = &config.directives;
        let found = extract_definitions(
            deck,
            stack.top_mut(),
            directives,
            config.case_policy,
            &self.reporter,
        )?;
        self.warnings.extend(found);
        seed_models(deck, stack.top_mut(), directives);
        if depth == 0 {
            collect_globals(deck, &mut self.globals, directives);
            collect_params(deck, params, &mut self.funcs, directives);
        }

        let mut cursor = deck.first();
        while let Some(id) = cursor {
            // Captured before splicing so inlined lines are not walked again.
            cursor = deck.next(id);
            let Some(line) = deck.get(id) else { continue };
            if !line.is_live() {
                continue;
            }
            if directives.is_call(line.keyword()) {
                if let Err(err) = self.expand_call(deck, id, stack, params, depth) {
                    if let Some(line) = deck.get_mut(id) {
                        line.set_error(err.kind.to_string());
                    }
                    return Err(err);
                }
            } else if depth == 0 {
                let text = self.substitute_top_level(&line.text, params);
                if let Some(line) = deck.get_mut(id) {
                    line.text = text;
                }
            }
        }
        Ok(())
    }

    fn expand_call(
        &mut self,
        deck: &mut Deck,
        id: LineId,
        stack: &mut ScopeStack,
        params: &ParamTable,
        depth: usize,
    ) -> Result<(), NetlistError> {
        let Some(line) = deck.get(id).cloned() else {
            return Ok(());
        };
        let call = parse_call(&line.text)
            .ok_or_else(|| self.reporter.malformed_call("missing subcircuit name", &line))?;
        let name = match params.substitute(&call.subckt).trim() {
            "" => call.subckt.clone(),
            substituted => substituted.to_string(),
        };

        let Some(def) = stack.find_subckt(&name) else {
            self.unresolved_call(deck, id, &line, &call, &name, params, depth);
            return Ok(());
        };
        if def.is_empty() {
            self.warnings.push(Warning::at(
                &line,
                format!("subcircuit '{}' has an empty body, call dropped", def.name),
            ));
            deck.comment_out(id);
            return Ok(());
        }

        let table = TranslationTable::settrans(
            &def.name,
            &def.formals,
            &call.actuals,
            self.config.case_policy,
            &line,
            &self.reporter,
        )?;
        let mut effective = self.merge_params(params, &def.defaults, &call.assignments);
        let mut body = def.body.copy_deep();
        let limit = stack.capacity();
        {
            let mut scope = stack.enter().ok_or_else(|| {
                self.reporter.report(
                    ErrorKind::MaxCallDepth {
                        limit,
                        call: line.text.clone(),
                    },
                    &line,
                )
            })?;
            self.expand_level(&mut body, &mut scope, &mut effective, depth + 1)?;
            Translator::new(
                &call.instance,
                &table,
                &effective,
                &self.globals,
                self.config,
                self.devices,
            )
            .translate(&mut body, &mut scope)?;
        }

        self.funcs = UserFuncTable::update(&self.funcs, &def.funcs);
        self.trace.push(ExpansionStep {
            depth,
            instance: call.instance,
            subckt: def.name.clone(),
            call_text: line.text.clone(),
            expanded: body
                .iter()
                .filter(|l| l.is_live())
                .map(|l| l.text.clone())
                .collect(),
        });
        deck.comment_out(id);
        deck.splice_after(id, body);
        Ok(())
    }

    // Remaps the call to a device through the prefix table, or records the
    // name as unresolved (once per name) and leaves the line annotated.
    #[allow(clippy::too_many_arguments)]
    fn unresolved_call(
        &mut self,
        deck: &mut Deck,
        id: LineId,
        line: &Line,
        call: &CallSite,
        name: &str,
        params: &ParamTable,
        depth: usize,
    ) {
        if let Some(letter) = self.config.map_prefix(&call.instance) {
            let mut text = format!("{}{}", letter, line.text.trim_start());
            if depth == 0 {
                text = self.substitute_top_level(&text, params);
            }
            if let Some(target) = deck.get_mut(id) {
                target.text = text;
            }
            return;
        }
        let err = self.reporter.unknown_subckt(name, line);
        if let Some(target) = deck.get_mut(id) {
            target.set_error(err.kind.to_string());
        }
        if self.unresolved_names.insert(name) {
            self.unresolved.push(err);
        }
    }

    /// Parameter table seen by an instantiation's body.
    ///
    /// Call-site values are resolved in the caller's scope first. Under
    /// `global`, caller parameters override the defaults, which override the
    /// call's assignments. Under `local` the order is reversed.
    pub fn merge_params(&self, caller: &ParamTable, defaults: &ParamTable, assignments: &str) -> ParamTable {
        let mut call = ParamTable::new();
        for item in parse_assignments(assignments) {
            if item.args.is_none() {
                call.define(&item.name, &caller.substitute(&item.value));
            }
        }
        match self.config.param_merge {
            MergePolicy::Global => ParamTable::update(&ParamTable::update(&call, defaults), caller),
            MergePolicy::Local => ParamTable::update(&ParamTable::update(caller, defaults), &call),
        }
    }

    fn substitute_top_level(&self, text: &str, params: &ParamTable) -> String {
        let directives = &self.config.directives;
        let keyword = text.split_whitespace().next().unwrap_or("");
        if directives.is_global(keyword) || directives.is_cache_start(keyword) {
            return text.to_string();
        }
        if directives.is_model(keyword) {
            if let Some(name) = split_words(text).get(1) {
                let (head, tail) = text.split_at(name.end);
                return format!("{}{}", head, params.substitute(tail));
            }
        }
        if self.config.subst_nodes || !keyword.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return params.substitute_line(text);
        }
        // Node tokens of a device line keep their names.
        let (head, tail) = text.split_at(node_span(text, self.devices));
        format!("{}{}", head, params.substitute(tail))
    }
}

/// Expands `deck` with the default configuration, the SPICE device table and
/// the process-wide cache.
pub fn expand(
    deck: Deck,
    params: &ParamTable,
    funcs: &UserFuncTable,
    block: Option<&str>,
) -> Result<Expansion, ExpansionErrors> {
    let config = ExpandConfig::default();
    Expander::new(&config).expand(deck, params, funcs, block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_parts() {
        let call = parse_call("x1 a b inv params: w=2 l = 1").unwrap();
        assert_eq!(call.instance, "x1");
        assert_eq!(call.actuals, vec!["a", "b"]);
        assert_eq!(call.subckt, "inv");
        assert_eq!(call.assignments, "w=2 l = 1");
        assert_eq!(parse_call("x1 sub").map(|c| c.actuals.len()), Some(0));
        assert_eq!(parse_call("x1"), None);
    }

    #[test]
    fn merge_policies() {
        let mut caller = ParamTable::new();
        caller.define("w", "1");
        caller.define("k", "3");
        let defaults = ParamTable::from_assignments("w=2 l=2");

        let global = ExpandConfig::default();
        let merged = Expander::new(&global).merge_params(&caller, &defaults, "w=5 l=k m=4");
        assert_eq!(merged.get("w"), Some("1"));
        assert_eq!(merged.get("l"), Some("2"));
        assert_eq!(merged.get("m"), Some("4"));

        let mut local = ExpandConfig::default();
        local.param_merge = MergePolicy::Local;
        let merged = Expander::new(&local).merge_params(&caller, &defaults, "w=5 l=k");
        assert_eq!(merged.get("w"), Some("5"));
        assert_eq!(merged.get("l"), Some("3"));
    }
}
