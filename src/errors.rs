//! netmacro error handling.
//!
//! Every failure is a `NetlistError`: what went wrong (`ErrorKind`), where it
//! happened (the offending line, as a miette source), and how to help. Errors
//! are built through the `ErrorReporting` trait so the source text of the line
//! is always attached. A failed expansion returns `ExpansionErrors`, which
//! carries every error found in the deck plus the annotated deck itself.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use thiserror::Error;

use crate::deck::{Deck, Line};

// ============================================================================
// SOURCE CONTEXT
// ============================================================================

/// Source text an error points into.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Context for a single netlist line.
    pub fn from_line(line: &Line) -> Self {
        let name = if line.line_no == 0 {
            "expanded line".to_string()
        } else {
            format!("line {}", line.line_no)
        };
        Self {
            name,
            content: line.text.clone(),
        }
    }

    /// Used when no line is available, such as a cache lookup.
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: format!("* {}", context),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    // Syntax
    #[error("missing subcircuit name on '{directive}' line")]
    MissingName { directive: String },
    #[error("'{directive}' without a matching subcircuit start")]
    EndWithoutStart { directive: String },
    #[error("subcircuit '{name}' is never closed")]
    UnterminatedSubckt { name: String },
    #[error("malformed subcircuit call: {reason}")]
    MalformedCall { reason: String },
    #[error("malformed poly construct: {reason}")]
    MalformedPoly { reason: String },

    // Resolution
    #[error("unknown subcircuit '{name}'")]
    UnknownSubckt { name: String },
    #[error("unknown model '{model}' referenced by device '{device}'")]
    UnknownModel { device: String, model: String },
    #[error("ambiguous model reference '{name}', candidates: {candidates}")]
    AmbiguousModel { name: String, candidates: String },
    #[error("no model found for device '{device}'")]
    MissingModel { device: String },

    // Arity
    #[error("too many arguments in call to '{subckt}': expected {expected}, got {actual}")]
    TooManyArgs {
        subckt: String,
        expected: usize,
        actual: usize,
    },
    #[error("too few arguments in call to '{subckt}': expected {expected}, got {actual}")]
    TooFewArgs {
        subckt: String,
        expected: usize,
        actual: usize,
    },

    // Depth
    #[error("max call depth {limit} exceeded in call '{call}'")]
    MaxCallDepth { limit: usize, call: String },

    // Cache
    #[error("cache block '{name}' not found")]
    CacheBlockNotFound { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Syntax,
    Resolution,
    Arity,
    Depth,
    Cache,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "Syntax",
            ErrorCategory::Resolution => "Resolution",
            ErrorCategory::Arity => "Arity",
            ErrorCategory::Depth => "Depth",
            ErrorCategory::Cache => "Cache",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingName { .. }
            | Self::EndWithoutStart { .. }
            | Self::UnterminatedSubckt { .. }
            | Self::MalformedCall { .. }
            | Self::MalformedPoly { .. } => ErrorCategory::Syntax,

            Self::UnknownSubckt { .. }
            | Self::UnknownModel { .. }
            | Self::AmbiguousModel { .. }
            | Self::MissingModel { .. } => ErrorCategory::Resolution,

            Self::TooManyArgs { .. } | Self::TooFewArgs { .. } => ErrorCategory::Arity,

            Self::MaxCallDepth { .. } => ErrorCategory::Depth,

            Self::CacheBlockNotFound { .. } => ErrorCategory::Cache,
        }
    }

    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::MissingName { .. } => "missing_name",
            Self::EndWithoutStart { .. } => "end_without_start",
            Self::UnterminatedSubckt { .. } => "unterminated_subckt",
            Self::MalformedCall { .. } => "malformed_call",
            Self::MalformedPoly { .. } => "malformed_poly",
            Self::UnknownSubckt { .. } => "unknown_subckt",
            Self::UnknownModel { .. } => "unknown_model",
            Self::AmbiguousModel { .. } => "ambiguous_model",
            Self::MissingModel { .. } => "missing_model",
            Self::TooManyArgs { .. } => "too_many_args",
            Self::TooFewArgs { .. } => "too_few_args",
            Self::MaxCallDepth { .. } => "max_call_depth",
            Self::CacheBlockNotFound { .. } => "cache_block_not_found",
        }
    }

    /// Fatal errors abort the whole expansion; the rest are batched.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnknownSubckt { .. })
    }

    fn primary_label(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Syntax => "malformed here",
            ErrorCategory::Resolution => "unresolved reference",
            ErrorCategory::Arity => "argument count mismatch",
            ErrorCategory::Depth => "nested too deeply",
            ErrorCategory::Cache => "cache lookup failed",
        }
    }
}

/// Where it happened.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub line_no: usize,
    pub phase: String,
}

/// How to help.
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

/// The single error type of the engine.
#[derive(Debug)]
pub struct NetlistError {
    pub kind: ErrorKind,
    pub source_info: SourceInfo,
    pub diagnostic_info: DiagnosticInfo,
}

impl NetlistError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }
}

impl std::error::Error for NetlistError {}

impl fmt::Display for NetlistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.category(), self.kind)
    }
}

impl Diagnostic for NetlistError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.kind.primary_label().to_string()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

// ============================================================================
// ERROR CONSTRUCTION
// ============================================================================

/// Context-aware error creation. Implementors decide the phase name that goes
/// into the error code.
pub trait ErrorReporting {
    fn report(&self, kind: ErrorKind, line: &Line) -> NetlistError;

    /// Error not tied to any line.
    fn report_unlined(&self, kind: ErrorKind, context: &str) -> NetlistError;

    fn unknown_subckt(&self, name: &str, line: &Line) -> NetlistError {
        self.report(
            ErrorKind::UnknownSubckt {
                name: name.to_string(),
            },
            line,
        )
    }

    fn malformed_call(&self, reason: &str, line: &Line) -> NetlistError {
        self.report(
            ErrorKind::MalformedCall {
                reason: reason.to_string(),
            },
            line,
        )
    }

    fn missing_model(&self, device: &str, line: &Line) -> NetlistError {
        self.report(
            ErrorKind::MissingModel {
                device: device.to_string(),
            },
            line,
        )
    }
}

/// Error factory for one phase of processing (`extract`, `expand`, `translate`, `cache`).
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext {
    pub phase: &'static str,
}

impl PhaseContext {
    pub const fn new(phase: &'static str) -> Self {
        Self { phase }
    }

    fn build(&self, kind: ErrorKind, source: SourceContext, line_no: usize) -> NetlistError {
        let error_code = format!("netmacro::{}::{}", self.phase, kind.code_suffix());
        let len = source.content.len();
        let help = default_help(&kind);
        NetlistError {
            kind,
            source_info: SourceInfo {
                source: source.to_named_source(),
                primary_span: (0..len).into(),
                line_no,
                phase: self.phase.to_string(),
            },
            diagnostic_info: DiagnosticInfo { help, error_code },
        }
    }
}

impl ErrorReporting for PhaseContext {
    fn report(&self, kind: ErrorKind, line: &Line) -> NetlistError {
        self.build(kind, SourceContext::from_line(line), line.line_no)
    }

    fn report_unlined(&self, kind: ErrorKind, context: &str) -> NetlistError {
        self.build(kind, SourceContext::fallback(context), 0)
    }
}

fn default_help(kind: &ErrorKind) -> Option<String> {
    match kind {
        ErrorKind::EndWithoutStart { .. } => {
            Some("remove the stray end directive or add the missing subcircuit start".into())
        }
        ErrorKind::UnterminatedSubckt { .. } => Some("add a matching end directive".into()),
        ErrorKind::UnknownSubckt { .. } => {
            Some("define the subcircuit in this deck, an enclosing subcircuit or a cache block".into())
        }
        ErrorKind::UnknownModel { .. } => {
            Some("define the model in the deck or disable strict model checking".into())
        }
        ErrorKind::MaxCallDepth { .. } => {
            Some("check for a subcircuit that instantiates itself directly or through a chain".into())
        }
        _ => None,
    }
}

// ============================================================================
// ERROR SET AND WARNINGS
// ============================================================================

/// Every error found while expanding one deck.
#[derive(Debug)]
pub struct ExpansionErrors {
    pub errors: Vec<NetlistError>,
    /// The deck with offending lines annotated, when it could be recovered.
    pub deck: Option<Deck>,
}

impl ExpansionErrors {
    pub fn single(error: NetlistError) -> Self {
        Self {
            errors: vec![error],
            deck: None,
        }
    }

    pub fn with_deck(mut self, deck: Deck) -> Self {
        self.deck = Some(deck);
        self
    }

    pub fn categories(&self) -> Vec<ErrorCategory> {
        self.errors.iter().map(|e| e.category()).collect()
    }

    pub fn first(&self) -> Option<&NetlistError> {
        self.errors.first()
    }
}

impl From<NetlistError> for ExpansionErrors {
    fn from(error: NetlistError) -> Self {
        Self::single(error)
    }
}

impl std::error::Error for ExpansionErrors {}

impl fmt::Display for ExpansionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [only] => write!(f, "{}", only),
            errors => write!(f, "expansion failed with {} errors", errors.len()),
        }
    }
}

impl Diagnostic for ExpansionErrors {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("netmacro::expand::failed"))
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        Some(Box::new(
            self.errors.iter().map(|e| e as &dyn Diagnostic),
        ))
    }
}

/// Non-fatal condition recorded during expansion.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Warning {
    pub line_no: usize,
    pub text: String,
    pub message: String,
}

impl Warning {
    pub fn at(line: &Line, message: impl Into<String>) -> Self {
        Self {
            line_no: line.line_no,
            text: line.text.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line_no == 0 {
            write!(f, "warning: {} ({})", self.message, self.text)
        } else {
            write!(f, "warning: line {}: {} ({})", self.line_no, self.message, self.text)
        }
    }
}
