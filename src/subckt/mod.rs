//! # Subcircuit Expansion
//!
//! The subcircuit (macro) system: definition extraction, translation tables,
//! hygienic renaming and the recursive expansion driver.
//!
//! ## Module Structure
//!
//! - **`types`**: definitions, model aliases, the scope stack and trace steps
//! - **`definition`**: start-line parsing and duplicate-formal hygiene
//! - **`extract`**: lifting `.subckt` blocks out of a deck, top-level collection
//! - **`trans`**: formal-to-actual translation tables
//! - **`translate`**: catenation, device/model renaming, `poly(N)`, `finish_line`
//! - **`expander`**: the driver
//!
//! Dependencies flow one way: `types` <- `definition` <- `extract`, and
//! `trans` <- `translate` <- `expander`.

pub mod definition;
pub mod expander;
pub mod extract;
pub mod trans;
pub mod translate;
pub mod types;

pub use definition::{build_definition, dedupe_formals, parse_header, DefHeader};
pub use expander::{expand, parse_call, CallSite, Expander, Expansion};
pub use extract::extract_definitions;
pub use trans::{TransEntry, TranslationTable, GROUND};
pub use translate::{Catenation, Translator, MAX_POLY_DIM};
pub use types::{
    split_bin, ExpansionStep, ModelAliases, ScopeFrame, ScopeGuard, ScopeStack, SubcktDef,
    SubcktTable,
};
