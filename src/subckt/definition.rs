//! Subcircuit definition construction.
//!
//! Parses the start line, folds body `.param` lines into the defaults and
//! applies duplicate-formal hygiene.

use crate::config::Directives;
use crate::deck::{Deck, Line};
use crate::errors::{ErrorKind, ErrorReporting, NetlistError};
use crate::lexer::{assignment_start, split_words};
use crate::params::{ParamTable, UserFuncTable};
use crate::symtab::{KeyPolicy, NameSet};

use super::types::SubcktDef;

/// Fields of a `.subckt NAME n1 n2 ... [params:] p=v ...` line.
#[derive(Debug, Clone, PartialEq)]
pub struct DefHeader {
    pub name: String,
    pub formals: Vec<String>,
    pub defaults: ParamTable,
}

/// Parses a subcircuit start line.
pub fn parse_header(line: &Line, reporter: &impl ErrorReporting) -> Result<DefHeader, NetlistError> {
    let text = line.text.as_str();
    let split = assignment_start(text);
    let words = split_words(&text[..split]);
    let mut names = words
        .iter()
        .skip(1)
        .map(|w| w.text)
        .filter(|w| !w.eq_ignore_ascii_case("params:"));
    let name = names.next().ok_or_else(|| {
        reporter.report(
            ErrorKind::MissingName {
                directive: line.keyword().to_string(),
            },
            line,
        )
    })?;
    Ok(DefHeader {
        name: name.to_string(),
        formals: names.map(str::to_string).collect(),
        defaults: ParamTable::from_assignments(&text[split..]),
    })
}

/// Renames repeated formals and returns the lines that tie them together.
///
/// The second and later occurrences of a name become `name__2`, `name__3`, ...
/// (skipping anything already taken), and a zero-volt source from the original
/// name to each synthesized one is returned for the body.
pub fn dedupe_formals(formals: &[String], policy: KeyPolicy) -> (Vec<String>, Vec<Line>) {
    let mut taken = NameSet::new(policy);
    for formal in formals {
        taken.insert(formal);
    }
    let mut seen = NameSet::new(policy);
    let mut renamed = Vec::with_capacity(formals.len());
    let mut extra = Vec::new();
    for formal in formals {
        if seen.insert(formal) {
            renamed.push(formal.clone());
            continue;
        }
        let mut n = 2;
        let synthesized = loop {
            let candidate = format!("{}__{}", formal, n);
            if taken.insert(&candidate) {
                break candidate;
            }
            n += 1;
        };
        extra.push(Line::synthesized(format!(
            "v__dup{} {} {} 0",
            extra.len() + 1,
            formal,
            synthesized
        )));
        renamed.push(synthesized);
    }
    (renamed, extra)
}

/// Assembles a definition from its header and collected body.
///
/// Body `.param` lines override start-line defaults (later wins) and are
/// commented out. Lines inside nested definitions belong to the inner scope
/// and are left alone. Hygiene lines go to the front of the body.
pub fn build_definition(
    header: DefHeader,
    mut body: Deck,
    line_no: usize,
    directives: &Directives,
    policy: KeyPolicy,
) -> SubcktDef {
    let mut defaults = header.defaults;
    let mut funcs = UserFuncTable::new();
    let mut nest = 0usize;
    for id in body.ids() {
        let Some(line) = body.get_mut(id) else {
            continue;
        };
        if !line.is_live() {
            continue;
        }
        let keyword = line.keyword();
        if directives.is_start(keyword) {
            nest += 1;
        } else if directives.is_end(keyword) {
            nest = nest.saturating_sub(1);
        } else if nest == 0 && directives.is_param(keyword) {
            let rest = line.text.trim_start()[line.keyword().len()..].to_string();
            let mut local = ParamTable::new();
            local.define_statement(&rest, &mut funcs);
            defaults = ParamTable::update(&defaults, &local);
            line.comment_out();
        }
    }

    let (formals, extra) = dedupe_formals(&header.formals, policy);
    body.splice_front(Deck::from_lines(extra));

    SubcktDef {
        name: header.name,
        formals,
        defaults,
        funcs,
        body,
        line_no,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PhaseContext;

    #[test]
    fn header_splits_formals_and_defaults() {
        let line = Line::new(".subckt amp in out params: gain=2 bw = 1meg", 4);
        let header = parse_header(&line, &PhaseContext::new("extract")).unwrap();
        assert_eq!(header.name, "amp");
        assert_eq!(header.formals, vec!["in", "out"]);
        assert_eq!(header.defaults.get("gain"), Some("2"));
        assert_eq!(header.defaults.get("bw"), Some("1meg"));
    }

    #[test]
    fn header_without_name_is_rejected() {
        let line = Line::new(".subckt", 2);
        let err = parse_header(&line, &PhaseContext::new("extract")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MissingName { .. }));
    }

    #[test]
    fn repeated_formals_get_unique_names_and_a_tie_source() {
        let formals: Vec<String> = ["a", "b", "a", "a__2"].iter().map(|s| s.to_string()).collect();
        let (renamed, extra) = dedupe_formals(&formals, KeyPolicy::Insensitive);
        assert_eq!(renamed, vec!["a", "b", "a__3", "a__2"]);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].text, "v__dup1 a a__3 0");
    }

    #[test]
    fn body_params_override_header_defaults() {
        let header = DefHeader {
            name: "sub".into(),
            formals: vec!["a".into()],
            defaults: ParamTable::from_assignments("w=1 l=2"),
        };
        let body = Deck::from_lines(vec![
            Line::new(".param w=5 sq(x)=x*x", 2),
            Line::new("r1 a 0 w", 3),
        ]);
        let def = build_definition(header, body, 1, &Directives::default(), KeyPolicy::Insensitive);
        assert_eq!(def.defaults.get("w"), Some("5"));
        assert_eq!(def.defaults.get("l"), Some("2"));
        assert!(def.funcs.get("sq").is_some());
        assert_eq!(def.body.iter().filter(|l| l.is_live()).count(), 1);
    }

    #[test]
    fn nested_body_params_stay_with_the_inner_definition() {
        let header = DefHeader {
            name: "outer".into(),
            formals: vec!["a".into()],
            defaults: ParamTable::from_assignments("w=1"),
        };
        let body = Deck::from_lines(vec![
            Line::new(".subckt inner b", 2),
            Line::new(".param w=5", 3),
            Line::new("r1 b 0 w", 4),
            Line::new(".ends inner", 5),
            Line::new("r2 a 0 w", 6),
        ]);
        let def = build_definition(header, body, 1, &Directives::default(), KeyPolicy::Insensitive);
        assert_eq!(def.defaults.get("w"), Some("1"));
        assert!(def.body.iter().any(|l| l.is_live() && l.text == ".param w=5"));
    }
}
