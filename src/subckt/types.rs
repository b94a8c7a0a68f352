//!
//! Core types of the subcircuit system. This module has no dependencies on the
//! other `subckt` modules.
//!
//! ## Ownership
//!
//! - A `SubcktDef` is immutable once built and shared through `Arc`, so a
//!   definition can sit in a live frame and a cache block at the same time.
//! - Every expansion owns its `ScopeStack`. Frames are pushed through
//!   `ScopeStack::enter`, whose guard pops the frame on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::Serialize;

use crate::deck::Deck;
use crate::errors::ErrorKind;
use crate::params::{ParamTable, UserFuncTable};
use crate::symtab::{KeyPolicy, SymbolTable};

// ============================================================================
// DEFINITIONS
// ============================================================================

/// A parsed `.subckt` block.
#[derive(Debug, Clone)]
pub struct SubcktDef {
    pub name: String,
    /// Formal node names, pairwise distinct.
    pub formals: Vec<String>,
    pub defaults: ParamTable,
    /// Function definitions found among the body's `.param` lines.
    pub funcs: UserFuncTable,
    pub body: Deck,
    /// Line number of the start directive.
    pub line_no: usize,
}

impl SubcktDef {
    pub fn arg_count(&self) -> usize {
        self.formals.len()
    }

    /// True when the body holds no live statement.
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(|line| !line.is_live())
    }
}

/// Subcircuit name to definition. Names always compare case-insensitively.
pub type SubcktTable = SymbolTable<Arc<SubcktDef>>;

pub fn subckt_table() -> SubcktTable {
    SymbolTable::new(KeyPolicy::Insensitive)
}

// ============================================================================
// MODEL ALIASES
// ============================================================================

/// Original model name to translated name, for one scope level.
#[derive(Debug, Clone, Default)]
pub struct ModelAliases {
    policy: KeyPolicy,
    entries: Vec<(String, String)>,
}

/// Splits `nch.3` into `("nch", Some(".3"))`. Only an all-digit suffix counts.
pub fn split_bin(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(dot)
            if dot > 0
                && dot + 1 < name.len()
                && name[dot + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            (&name[..dot], Some(&name[dot..]))
        }
        _ => (name, None),
    }
}

impl ModelAliases {
    pub fn new(policy: KeyPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
        }
    }

    /// Records a mapping, replacing an earlier one for the same name.
    pub fn insert(&mut self, orig: &str, translated: &str) {
        let policy = self.policy;
        match self.entries.iter().position(|(o, _)| policy.same(o, orig)) {
            Some(pos) => self.entries[pos].1 = translated.to_string(),
            None => self.entries.push((orig.to_string(), translated.to_string())),
        }
    }

    /// Seeds `name -> name` unless the name is already known.
    pub fn seed(&mut self, name: &str) {
        if self.direct(name).is_none() {
            self.entries.push((name.to_string(), name.to_string()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(o, t)| (o.as_str(), t.as_str()))
    }

    fn direct(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(o, _)| self.policy.same(o, name))
            .map(|(_, t)| t.as_str())
    }

    /// Resolves a model reference.
    ///
    /// Tries the exact name first. Then, for binned models, `nch` matches any
    /// `nch.N` entry (yielding the translated base) and `nch.2` matches an
    /// unbinned `nch` entry (yielding the translated name plus `.2`). Bins that
    /// translate to different bases make the reference ambiguous.
    pub fn lookup(&self, name: &str) -> Result<Option<String>, ErrorKind> {
        if let Some(hit) = self.direct(name) {
            return Ok(Some(hit.to_string()));
        }
        let (base, bin) = split_bin(name);
        if let Some(bin) = bin {
            return Ok(self.direct(base).map(|t| format!("{}{}", t, bin)));
        }
        let mut bases: Vec<&str> = Vec::new();
        for (orig, translated) in &self.entries {
            let (orig_base, orig_bin) = split_bin(orig);
            if orig_bin.is_some() && self.policy.same(orig_base, base) {
                let (translated_base, _) = split_bin(translated);
                if !bases.contains(&translated_base) {
                    bases.push(translated_base);
                }
            }
        }
        match bases.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(only.to_string())),
            many => Err(ErrorKind::AmbiguousModel {
                name: name.to_string(),
                candidates: many.join(", "),
            }),
        }
    }
}

// ============================================================================
// SCOPE STACK
// ============================================================================

/// Definitions and model aliases visible at one nesting level.
#[derive(Debug, Clone)]
pub struct ScopeFrame {
    pub subckts: SubcktTable,
    pub models: ModelAliases,
}

impl ScopeFrame {
    pub fn new(policy: KeyPolicy) -> Self {
        Self {
            subckts: subckt_table(),
            models: ModelAliases::new(policy),
        }
    }
}

/// Fixed-capacity stack of frames. The root frame counts toward the capacity.
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
    capacity: usize,
    policy: KeyPolicy,
}

impl ScopeStack {
    pub fn new(capacity: usize, policy: KeyPolicy) -> Self {
        let mut frames = Vec::with_capacity(capacity.max(1));
        frames.push(ScopeFrame::new(policy));
        Self {
            frames,
            capacity: capacity.max(1),
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live frames, root included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn root_mut(&mut self) -> &mut ScopeFrame {
        &mut self.frames[0]
    }

    pub fn top(&self) -> &ScopeFrame {
        &self.frames[self.frames.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut ScopeFrame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Pushes a fresh frame. Returns `None` when the stack is full.
    pub fn enter(&mut self) -> Option<ScopeGuard<'_>> {
        if self.frames.len() >= self.capacity {
            return None;
        }
        self.frames.push(ScopeFrame::new(self.policy));
        Some(ScopeGuard { stack: self })
    }

    /// Innermost definition named `name`.
    pub fn find_subckt(&self, name: &str) -> Option<Arc<SubcktDef>> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.subckts.get(name).cloned())
    }

    /// Innermost alias for a model reference.
    pub fn find_model(&self, name: &str) -> Result<Option<String>, ErrorKind> {
        for frame in self.frames.iter().rev() {
            if let Some(hit) = frame.models.lookup(name)? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}

/// Pops its frame when dropped.
pub struct ScopeGuard<'a> {
    stack: &'a mut ScopeStack,
}

impl Deref for ScopeGuard<'_> {
    type Target = ScopeStack;

    fn deref(&self) -> &ScopeStack {
        &*self.stack
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScopeStack {
        &mut *self.stack
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.stack.frames.len() > 1 {
            self.stack.frames.pop();
        }
    }
}

// ============================================================================
// TRACE
// ============================================================================

/// One inlined instantiation, for traceability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionStep {
    /// Nesting depth of the call, 0 for top-level calls.
    pub depth: usize,
    pub instance: String,
    pub subckt: String,
    pub call_text: String,
    /// Live lines spliced in place of the call.
    pub expanded: Vec<String>,
}
