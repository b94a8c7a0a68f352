//! Definition extraction and top-level collection passes.
//!
//! `extract_definitions` lifts every outermost `.subckt` ... `.ends` block out
//! of a deck into a frame. Inner blocks stay inside the outer body untouched;
//! they are extracted when that body is expanded, into the inner scope. The
//! original lines are kept, commented out.

use std::sync::Arc;

use crate::config::Directives;
use crate::deck::{Deck, LineId};
use crate::errors::{ErrorKind, ErrorReporting, NetlistError, Warning};
use crate::lexer::split_words;
use crate::params::{ParamTable, UserFuncTable};
use crate::symtab::{KeyPolicy, NameSet, SymbolTable};

use super::definition::{build_definition, parse_header, DefHeader};
use super::types::ScopeFrame;

struct OpenDef {
    header: DefHeader,
    start: LineId,
    line_no: usize,
    body: Deck,
}

/// Moves the deck's subcircuit definitions into `frame`.
///
/// Returns a warning for every definition that replaced an earlier one of the
/// same name in this frame.
pub fn extract_definitions(
    deck: &mut Deck,
    frame: &mut ScopeFrame,
    directives: &Directives,
    policy: KeyPolicy,
    reporter: &impl ErrorReporting,
) -> Result<Vec<Warning>, NetlistError> {
    let mut warnings = Vec::new();
    let mut nest = 0usize;
    let mut open: Option<OpenDef> = None;

    for id in deck.ids() {
        let Some(line) = deck.get(id) else { continue };
        if !line.is_live() {
            continue;
        }
        let keyword = line.keyword();

        if directives.is_start(keyword) {
            if nest == 0 {
                let header = parse_header(line, reporter)?;
                open = Some(OpenDef {
                    header,
                    start: id,
                    line_no: line.line_no,
                    body: Deck::new(),
                });
            } else if let Some(def) = open.as_mut() {
                def.body.push_back(line.clone());
            }
            nest += 1;
        } else if directives.is_end(keyword) {
            if nest == 0 {
                return Err(reporter.report(
                    ErrorKind::EndWithoutStart {
                        directive: keyword.to_string(),
                    },
                    line,
                ));
            }
            nest -= 1;
            if nest > 0 {
                if let Some(def) = open.as_mut() {
                    def.body.push_back(line.clone());
                }
            } else if let Some(def) = open.take() {
                let built = build_definition(def.header, def.body, def.line_no, directives, policy);
                if frame.subckts.contains(&built.name) {
                    warnings.push(Warning::at(
                        line,
                        format!("subcircuit '{}' redefined, later definition wins", built.name),
                    ));
                }
                let name = built.name.clone();
                frame.subckts.insert(&name, Arc::new(built));
            }
        } else if let Some(def) = open.as_mut() {
            def.body.push_back(line.clone());
        } else {
            continue;
        }
        deck.comment_out(id);
    }

    if let Some(def) = open {
        let name = def.header.name.clone();
        let kind = ErrorKind::UnterminatedSubckt { name };
        return Err(match deck.get(def.start) {
            Some(line) => reporter.report(kind, line),
            None => reporter.report_unlined(kind, "subcircuit start"),
        });
    }
    Ok(warnings)
}

/// Name declared by a `.model NAME ...` statement.
pub fn model_name(text: &str) -> Option<&str> {
    split_words(text).get(1).map(|w| w.text)
}

/// Seeds identity aliases for the live `.model` lines of a deck.
pub fn seed_models(deck: &Deck, frame: &mut ScopeFrame, directives: &Directives) {
    for line in deck.iter().filter(|l| l.is_live()) {
        if directives.is_model(line.keyword()) {
            if let Some(name) = model_name(&line.text) {
                frame.models.seed(name);
            }
        }
    }
}

/// Collects live `.model` statements as name to full line text.
pub fn collect_models(deck: &Deck, directives: &Directives, policy: KeyPolicy) -> SymbolTable<String> {
    let mut models = SymbolTable::new(policy);
    for line in deck.iter().filter(|l| l.is_live()) {
        if directives.is_model(line.keyword()) {
            if let Some(name) = model_name(&line.text) {
                models.insert(name, line.text.clone());
            }
        }
    }
    models
}

/// Adds every node named on a live `.global` line.
pub fn collect_globals(deck: &Deck, globals: &mut NameSet, directives: &Directives) {
    for line in deck.iter().filter(|l| l.is_live()) {
        if directives.is_global(line.keyword()) {
            for word in split_words(&line.text).iter().skip(1) {
                globals.insert(word.text);
            }
        }
    }
}

/// Layers the deck's `.param` statements over `params` and comments them out.
pub fn collect_params(
    deck: &mut Deck,
    params: &mut ParamTable,
    funcs: &mut UserFuncTable,
    directives: &Directives,
) {
    for id in deck.ids() {
        let Some(line) = deck.get_mut(id) else { continue };
        if line.is_live() && directives.is_param(line.keyword()) {
            let rest = line.text.trim_start()[line.keyword().len()..].to_string();
            params.define_statement(&rest, funcs);
            line.comment_out();
        }
    }
}
