//! Formal-to-actual translation table for one instantiation.

use crate::deck::Line;
use crate::errors::{ErrorKind, ErrorReporting, NetlistError};
use crate::symtab::{KeyPolicy, NameSet};

/// The universal ground node.
pub const GROUND: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransEntry {
    pub formal: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTable {
    entries: Vec<TransEntry>,
    policy: KeyPolicy,
}

impl TranslationTable {
    /// Pairs formals with actuals in order. The counts must match exactly.
    pub fn settrans(
        subckt: &str,
        formals: &[String],
        actuals: &[String],
        policy: KeyPolicy,
        call: &Line,
        reporter: &impl ErrorReporting,
    ) -> Result<Self, NetlistError> {
        let (expected, actual) = (formals.len(), actuals.len());
        if actual > expected {
            return Err(reporter.report(
                ErrorKind::TooManyArgs {
                    subckt: subckt.to_string(),
                    expected,
                    actual,
                },
                call,
            ));
        }
        if actual < expected {
            return Err(reporter.report(
                ErrorKind::TooFewArgs {
                    subckt: subckt.to_string(),
                    expected,
                    actual,
                },
                call,
            ));
        }
        let entries = formals
            .iter()
            .zip(actuals)
            .map(|(formal, actual)| TransEntry {
                formal: formal.clone(),
                actual: actual.clone(),
            })
            .collect();
        Ok(Self { entries, policy })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TransEntry] {
        &self.entries
    }

    /// Replacement for a node name.
    ///
    /// Ground and global nodes come back unchanged, formals come back as
    /// their actual. `None` means the name is internal to the instance.
    pub fn gettrans(&self, name: &str, globals: &NameSet) -> Option<String> {
        if name == GROUND || globals.contains(name) {
            return Some(name.to_string());
        }
        self.entries
            .iter()
            .find(|e| self.policy.same(&e.formal, name))
            .map(|e| e.actual.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PhaseContext;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn build(formals: &[&str], actuals: &[&str]) -> Result<TranslationTable, NetlistError> {
        TranslationTable::settrans(
            "sub",
            &strings(formals),
            &strings(actuals),
            KeyPolicy::Insensitive,
            &Line::new("x1 ... sub", 1),
            &PhaseContext::new("expand"),
        )
    }

    #[test]
    fn arity_must_match_exactly() {
        assert_eq!(build(&["a", "b"], &["n1", "n2"]).map(|t| t.len()).ok(), Some(2));
        let many = build(&["a", "b"], &["n1", "n2", "n3"]).unwrap_err();
        assert!(matches!(many.kind, ErrorKind::TooManyArgs { expected: 2, actual: 3, .. }));
        let few = build(&["a", "b"], &["n1"]).unwrap_err();
        assert!(matches!(few.kind, ErrorKind::TooFewArgs { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn ground_and_globals_pass_through() {
        let table = build(&["a", "vdd"], &["n1", "n2"]).unwrap();
        let mut globals = NameSet::new(KeyPolicy::Insensitive);
        globals.insert("vdd");
        assert_eq!(table.gettrans("0", &globals).as_deref(), Some("0"));
        assert_eq!(table.gettrans("VDD", &globals).as_deref(), Some("VDD"));
        assert_eq!(table.gettrans("A", &globals).as_deref(), Some("n1"));
        assert_eq!(table.gettrans("internal", &globals), None);
    }
}
