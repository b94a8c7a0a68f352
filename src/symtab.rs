//! String-keyed symbol tables with an explicit comparison policy.
//!
//! The comparison mode is part of the table: it is chosen at construction and
//! cannot change afterwards. Tables are backed by `im::HashMap`, so cloning one
//! (for a cache replay or a new scope) is cheap and never copies entries.

use im::HashMap;
use serde::{Deserialize, Serialize};

/// How keys compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPolicy {
    Sensitive,
    #[default]
    Insensitive,
}

impl KeyPolicy {
    /// Canonical form of `key` under this policy.
    pub fn fold(&self, key: &str) -> String {
        match self {
            KeyPolicy::Sensitive => key.to_string(),
            KeyPolicy::Insensitive => key.to_ascii_lowercase(),
        }
    }

    pub fn same(&self, a: &str, b: &str) -> bool {
        match self {
            KeyPolicy::Sensitive => a == b,
            KeyPolicy::Insensitive => a.eq_ignore_ascii_case(b),
        }
    }
}

/// Map from name to `V`, remembering the spelling each key was inserted with.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable<V: Clone> {
    policy: KeyPolicy,
    entries: HashMap<String, (String, V)>,
}

impl<V: Clone> SymbolTable<V> {
    pub fn new(policy: KeyPolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Inserts, returning the previous value under an equal key.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        self.entries
            .insert(self.policy.fold(key), (key.to_string(), value))
            .map(|(_, old)| old)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(&self.policy.fold(key)).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&self.policy.fold(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(&self.policy.fold(key)).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries as `(original spelling, value)`, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v))
    }

    /// Original spellings, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.values().map(|(k, _)| k.clone()).collect();
        names.sort();
        names
    }

    /// Right-hand table wins on key collision. Keys of `overlay` are refolded
    /// under this table's policy.
    pub fn update(&self, overlay: &SymbolTable<V>) -> SymbolTable<V> {
        let mut merged = self.clone();
        for (key, value) in overlay.iter() {
            merged.insert(key, value.clone());
        }
        merged
    }
}

impl<V: Clone> Default for SymbolTable<V> {
    fn default() -> Self {
        Self::new(KeyPolicy::default())
    }
}

/// Set of names, used for global nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NameSet {
    table: SymbolTable<()>,
}

impl NameSet {
    pub fn new(policy: KeyPolicy) -> Self {
        Self {
            table: SymbolTable::new(policy),
        }
    }

    /// Returns true when the name was not present yet.
    pub fn insert(&mut self, name: &str) -> bool {
        self.table.insert(name, ()).is_none()
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
}
