//! Named cache blocks.
//!
//! A cache block is the extracted content of a deck (subcircuit definitions,
//! parameters, `.model` statements and user functions) stored under a name so
//! later expansions can replay it without re-parsing. Blocks are immutable and
//! reference-counted; the store only ever adds, removes or clears whole blocks.
//!
//! `CacheStore::global()` is the process-wide store. Independent stores can be
//! created for isolation (tests, embedded use).

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;

use crate::config::ExpandConfig;
use crate::deck::Deck;
use crate::errors::{NetlistError, PhaseContext};
use crate::params::{ParamTable, UserFuncTable};
use crate::subckt::extract::{collect_models, collect_params, extract_definitions};
use crate::subckt::types::{ScopeFrame, SubcktTable};
use crate::symtab::{KeyPolicy, SymbolTable};

static GLOBAL_STORE: Lazy<CacheStore> = Lazy::new(CacheStore::new);

/// One stored bundle.
#[derive(Debug, Clone)]
pub struct CacheBlock {
    pub name: String,
    pub subckts: SubcktTable,
    pub params: ParamTable,
    /// Model name to its full `.model` line.
    pub models: SymbolTable<String>,
    pub user_funcs: UserFuncTable,
}

#[derive(Debug)]
pub struct CacheStore {
    blocks: RwLock<SymbolTable<Arc<CacheBlock>>>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(SymbolTable::new(KeyPolicy::Insensitive)),
        }
    }

    pub fn global() -> &'static CacheStore {
        &GLOBAL_STORE
    }

    fn read(&self) -> RwLockReadGuard<'_, SymbolTable<Arc<CacheBlock>>> {
        self.blocks.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SymbolTable<Arc<CacheBlock>>> {
        self.blocks.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Populates block `name` from `deck`.
    ///
    /// Returns `Ok(false)` without touching the store when the name is
    /// already taken. The deck itself is not modified: extraction runs on a
    /// copy, into a frame that is discarded once the block is built.
    pub fn add(
        &self,
        name: &str,
        deck: &Deck,
        params: &ParamTable,
        funcs: &UserFuncTable,
        config: &ExpandConfig,
    ) -> Result<bool, NetlistError> {
        if self.contains(name) {
            return Ok(false);
        }
        let reporter = PhaseContext::new("cache");
        let mut scratch = deck.copy_deep();
        let mut frame = ScopeFrame::new(config.case_policy);
        extract_definitions(
            &mut scratch,
            &mut frame,
            &config.directives,
            config.case_policy,
            &reporter,
        )?;

        let mut block_params = params.clone();
        let mut block_funcs = funcs.clone();
        collect_params(&mut scratch, &mut block_params, &mut block_funcs, &config.directives);
        let models = collect_models(&scratch, &config.directives, config.case_policy);

        let block = CacheBlock {
            name: name.to_string(),
            subckts: frame.subckts,
            params: block_params,
            models,
            user_funcs: block_funcs,
        };
        let mut blocks = self.write();
        // Another thread may have populated the name since the check above.
        if blocks.contains(name) {
            return Ok(false);
        }
        blocks.insert(name, Arc::new(block));
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CacheBlock>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    /// Block names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.read().names()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIB: &str = ".param vt=0.5\n.model nch nmos vto=vt\n.subckt inv in out\nm1 out in 0 0 nch\n.ends\n";

    #[test]
    fn add_is_a_no_op_for_existing_names() {
        let store = CacheStore::new();
        let config = ExpandConfig::default();
        let deck = Deck::from_source(LIB);
        let params = ParamTable::new();
        let funcs = UserFuncTable::new();
        assert!(store.add("lib", &deck, &params, &funcs, &config).unwrap());
        let first = store.get("lib").unwrap();

        let other = Deck::from_source(".subckt buf a b\nr1 a b 1\n.ends\n");
        assert!(!store.add("LIB", &other, &params, &funcs, &config).unwrap());
        let second = store.get("lib").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.subckts.contains("inv"));
        assert!(!second.subckts.contains("buf"));
    }

    #[test]
    fn block_holds_params_models_and_leaves_deck_alone() {
        let store = CacheStore::new();
        let deck = Deck::from_source(LIB);
        store
            .add("lib", &deck, &ParamTable::new(), &UserFuncTable::new(), &ExpandConfig::default())
            .unwrap();
        let block = store.get("lib").unwrap();
        assert_eq!(block.params.get("vt"), Some("0.5"));
        assert!(block.models.contains("NCH"));
        assert_eq!(deck.iter().filter(|l| l.is_live()).count(), 5);
    }

    #[test]
    fn list_remove_clear() {
        let store = CacheStore::new();
        let config = ExpandConfig::default();
        let (params, funcs) = (ParamTable::new(), UserFuncTable::new());
        for name in ["b", "a"] {
            store.add(name, &Deck::new(), &params, &funcs, &config).unwrap();
        }
        assert_eq!(store.list(), vec!["a".to_string(), "b".to_string()]);
        assert!(store.remove("A"));
        assert!(!store.remove("a"));
        store.clear();
        assert!(store.is_empty());
    }
}
