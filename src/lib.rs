//! # netmacro
//!
//! Hierarchical SPICE netlist subcircuit expansion: `.subckt` definitions are
//! extracted, every `x` instantiation is inlined with hygienic node, device
//! and model renaming, and the result is a flat deck a simulator can read.
//!
//! ## Layers
//!
//! - **Text**: `lexer`, `deck`
//! - **Tables**: `symtab`, `params`, `device`, `config`
//! - **Expansion**: `subckt`, `cache`
//! - **Front ends**: `engine`, `output`, `cli`
//!
//! Errors for every layer live in `errors`.

pub mod cache;
pub mod cli;
pub mod config;
pub mod deck;
pub mod device;
pub mod engine;
pub mod errors;
pub mod lexer;
pub mod output;
pub mod params;
pub mod subckt;
pub mod symtab;

pub use cache::{CacheBlock, CacheStore};
pub use config::{CatMode, ConfigError, Directives, ExpandConfig, MergePolicy};
pub use deck::{Deck, Line, LineId};
pub use device::{DeviceCatalog, DeviceInfo, SpiceDevices};
pub use engine::{DefinitionSummary, ExpansionPipeline, PipelineOutput};
pub use errors::{ErrorCategory, ErrorKind, ExpansionErrors, NetlistError, Warning};
pub use output::{OutputBuffer, OutputSink, StdoutSink};
pub use params::{ParamTable, UserFuncTable};
pub use subckt::{expand, Expander, Expansion, ExpansionStep};
pub use symtab::{KeyPolicy, NameSet, SymbolTable};
