//! # Expansion Pipeline
//!
//! The single entry point that turns netlist source text into a flat deck:
//!
//! 1. split the source into a `Deck`, peeling off the title line
//! 2. populate the cache from `.cache NAME` ... `.endcache` blocks
//! 3. expand every instantiation, replaying the last named block
//! 4. hand back the expansion for rendering
//!
//! The CLI and the integration tests both go through this pipeline.

use std::path::Path;

use miette::{IntoDiagnostic, WrapErr};
use serde::Serialize;

use crate::cache::CacheStore;
use crate::config::ExpandConfig;
use crate::deck::{Deck, Line};
use crate::device::DeviceCatalog;
use crate::errors::{ErrorKind, ErrorReporting, ExpansionErrors, NetlistError, PhaseContext};
use crate::lexer::split_words;
use crate::output::OutputSink;
use crate::params::{ParamTable, UserFuncTable};
use crate::subckt::expander::{Expander, Expansion};
use crate::subckt::extract::extract_definitions;
use crate::subckt::types::ScopeFrame;

// ============================================================================
// PIPELINE
// ============================================================================

/// Source-to-deck expansion with a fixed configuration.
pub struct ExpansionPipeline<'a> {
    pub config: ExpandConfig,
    /// Base parameter layer under the deck's own `.param` lines.
    pub params: ParamTable,
    pub funcs: UserFuncTable,
    /// Treat the first source line as the title.
    pub title: bool,
    cache: &'a CacheStore,
    devices: Option<&'a dyn DeviceCatalog>,
}

impl Default for ExpansionPipeline<'_> {
    fn default() -> Self {
        Self::new(ExpandConfig::default())
    }
}

impl<'a> ExpansionPipeline<'a> {
    pub fn new(config: ExpandConfig) -> Self {
        Self {
            config,
            params: ParamTable::new(),
            funcs: UserFuncTable::new(),
            title: true,
            cache: CacheStore::global(),
            devices: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a CacheStore) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_devices(mut self, devices: &'a dyn DeviceCatalog) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn with_params(mut self, params: ParamTable, funcs: UserFuncTable) -> Self {
        self.params = params;
        self.funcs = funcs;
        self
    }

    /// Whether the first line is a title. On by default.
    pub fn title(mut self, title: bool) -> Self {
        self.title = title;
        self
    }

    // ========================================================================
    // EXECUTION
    // ========================================================================

    /// Expands netlist source text.
    pub fn run(&self, source: &str) -> Result<PipelineOutput, ExpansionErrors> {
        let mut deck = Deck::from_source(source);
        let title = if self.title { take_title(&mut deck) } else { None };

        let block = match self.load_cache_blocks(&mut deck) {
            Ok(block) => block,
            Err(err) => return Err(ExpansionErrors::single(err).with_deck(deck)),
        };

        let mut expander = Expander::new(&self.config).with_cache(self.cache);
        if let Some(devices) = self.devices {
            expander = expander.with_devices(devices);
        }
        let expansion = expander.expand(deck, &self.params, &self.funcs, block.as_deref())?;
        Ok(PipelineOutput { title, expansion })
    }

    /// Runs the pipeline and emits the rendered deck to `sink`.
    pub fn run_to(
        &self,
        source: &str,
        strip: bool,
        sink: &mut dyn OutputSink,
    ) -> Result<PipelineOutput, ExpansionErrors> {
        let output = self.run(source)?;
        output.emit(strip, sink);
        Ok(output)
    }

    /// Lists the top-level subcircuit definitions of a source, sorted by name.
    pub fn definitions(&self, source: &str) -> Result<Vec<DefinitionSummary>, NetlistError> {
        let mut deck = Deck::from_source(source);
        if self.title {
            take_title(&mut deck);
        }
        let mut frame = ScopeFrame::new(self.config.case_policy);
        extract_definitions(
            &mut deck,
            &mut frame,
            &self.config.directives,
            self.config.case_policy,
            &PhaseContext::new("extract"),
        )?;
        let mut defs: Vec<DefinitionSummary> = frame
            .subckts
            .iter()
            .map(|(_, def)| DefinitionSummary {
                name: def.name.clone(),
                formals: def.formals.clone(),
                defaults: def.defaults.entries(),
                line_no: def.line_no,
            })
            .collect();
        defs.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(defs)
    }

    /// Reads a netlist file.
    pub fn read_file(path: &Path) -> miette::Result<String> {
        std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read netlist '{}'", path.display()))
    }

    // ========================================================================
    // CACHE BLOCKS
    // ========================================================================

    // Disables every `.cache` ... `.endcache` region. A block whose name is
    // new is stored; a known name keeps its first bundle. Returns the last
    // block name seen.
    fn load_cache_blocks(&self, deck: &mut Deck) -> Result<Option<String>, NetlistError> {
        let directives = &self.config.directives;
        let reporter = PhaseContext::new("cache");
        let mut last = None;
        let mut open: Option<(String, Deck)> = None;

        for id in deck.ids() {
            let Some(line) = deck.get(id) else { continue };
            if !line.is_live() {
                continue;
            }
            let keyword = line.keyword();
            if open.is_none() && directives.is_cache_start(keyword) {
                let Some(name) = split_words(&line.text).get(1).map(|w| w.text.to_string()) else {
                    return Err(reporter.report(
                        ErrorKind::MissingName {
                            directive: keyword.to_string(),
                        },
                        line,
                    ));
                };
                open = Some((name, Deck::new()));
            } else if let Some((name, body)) = open.as_mut() {
                if directives.is_cache_end(keyword) {
                    let body = std::mem::take(body);
                    let name = std::mem::take(name);
                    self.store_block(&name, &body)?;
                    last = Some(name);
                    open = None;
                } else {
                    body.push_back(line.clone());
                }
            } else {
                continue;
            }
            deck.comment_out(id);
        }

        // An unterminated block runs to the end of the deck.
        if let Some((name, body)) = open {
            self.store_block(&name, &body)?;
            last = Some(name);
        }
        Ok(last)
    }

    fn store_block(&self, name: &str, body: &Deck) -> Result<(), NetlistError> {
        self.cache
            .add(name, body, &self.params, &self.funcs, &self.config)
            .map(|_| ())
    }
}

fn take_title(deck: &mut Deck) -> Option<String> {
    let id = deck.first()?;
    deck.remove(id).map(|line| line.to_string())
}

// ============================================================================
// RESULTS
// ============================================================================

/// Expanded deck plus the title it was read with.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub title: Option<String>,
    pub expansion: Expansion,
}

impl PipelineOutput {
    /// The netlist text. `strip` drops disabled lines.
    pub fn render(&self, strip: bool) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            out.push_str(title);
            out.push('\n');
        }
        if strip {
            out.push_str(&self.expansion.deck.enabled_text());
        } else {
            out.push_str(&self.expansion.deck.to_string());
        }
        out
    }

    /// Emits the title and each rendered line.
    pub fn emit(&self, strip: bool, sink: &mut dyn OutputSink) {
        if let Some(title) = &self.title {
            sink.emit(title, None);
        }
        for line in self.expansion.deck.iter() {
            if strip && !line.is_live() {
                continue;
            }
            sink.emit(&line.to_string(), Some(line));
        }
    }

    /// The live lines, in order.
    pub fn live_lines(&self) -> Vec<&Line> {
        self.expansion.deck.iter().filter(|l| l.is_live()).collect()
    }
}

/// One entry of a definition listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionSummary {
    pub name: String,
    pub formals: Vec<String>,
    pub defaults: Vec<(String, String)>,
    pub line_no: usize,
}
