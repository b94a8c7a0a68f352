//! Handles all user-facing output for the CLI.
//!
//! Colorized warnings and headers, trace diffs, JSON documents and error
//! reports all go through here so every command looks the same.

use difference::{Changeset, Difference};
use miette::Report;
use serde::Serialize;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::deck::{Deck, Line};
use crate::engine::PipelineOutput;
use crate::errors::Warning;
use crate::subckt::types::ExpansionStep;

// ============================================================================
// JSON DOCUMENTS
// ============================================================================

/// JSON shape of an `expand --json` run.
#[derive(Debug, Serialize)]
pub struct ExpansionReport<'a> {
    pub title: Option<&'a str>,
    pub lines: Vec<&'a Line>,
    pub warnings: &'a [Warning],
    pub trace: &'a [ExpansionStep],
}

impl<'a> ExpansionReport<'a> {
    pub fn new(output: &'a PipelineOutput, strip: bool) -> Self {
        Self {
            title: output.title.as_deref(),
            lines: output
                .expansion
                .deck
                .iter()
                .filter(|line| !strip || line.is_live())
                .collect(),
            warnings: &output.expansion.warnings,
            trace: &output.expansion.trace,
        }
    }
}

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

fn color_choice(stream: atty::Stream) -> ColorChoice {
    if atty::is(stream) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn stdout() -> StandardStream {
    StandardStream::stdout(color_choice(atty::Stream::Stdout))
}

fn stderr() -> StandardStream {
    StandardStream::stderr(color_choice(atty::Stream::Stderr))
}

pub fn print_warnings(warnings: &[Warning]) {
    let mut err = stderr();
    for warning in warnings {
        let _ = err.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
        let _ = writeln!(err, "{}", warning);
        let _ = err.reset();
    }
}

/// Prints an expansion trace, one diff per inlined call.
pub fn print_trace(trace: &[ExpansionStep]) {
    let mut out = stdout();
    for (i, step) in trace.iter().enumerate() {
        print_header(
            &mut out,
            &format!(
                "--- Step {}: {} -> {} (depth {}) ---",
                i, step.instance, step.subckt, step.depth
            ),
        );
        let expanded = step.expanded.join("\n");
        let changeset = Changeset::new(&step.call_text, &expanded, "\n");
        print_diff(&mut out, &changeset.diffs);
        let _ = writeln!(out);
    }
}

/// Prints the definition table of a netlist.
pub fn print_definitions(defs: &[crate::engine::DefinitionSummary]) {
    let mut out = stdout();
    for def in defs {
        let _ = out.set_color(ColorSpec::new().set_bold(true));
        let _ = write!(out, "{}", def.name);
        let _ = out.reset();
        let _ = write!(out, " ({})", def.formals.join(" "));
        for (name, value) in &def.defaults {
            let _ = write!(out, " {}={}", name, value);
        }
        let _ = writeln!(out, "  [line {}]", def.line_no);
    }
}

/// Reports the result of checking one file.
pub fn print_check(path: &str, outcome: Result<usize, &Report>) {
    let mut out = stdout();
    match outcome {
        Ok(warnings) => {
            let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
            let _ = write!(out, "ok");
            let _ = out.reset();
            let _ = writeln!(out, "   {} ({} warnings)", path, warnings);
        }
        Err(report) => {
            let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
            let _ = write!(out, "FAIL");
            let _ = out.reset();
            let _ = writeln!(out, " {}", path);
            print_report(report);
        }
    }
}

/// Shows the lines of a failed deck that carry an error.
pub fn print_annotations(deck: &Deck) {
    let mut err = stderr();
    for line in deck.iter() {
        if let Some(message) = &line.error {
            let _ = err.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
            let _ = write!(err, "{:>5} | ", line.line_no);
            let _ = err.reset();
            let _ = writeln!(err, "{}    <- {}", line, message);
        }
    }
}

pub fn print_report(report: &Report) {
    eprintln!("{:?}", report);
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn print_header(out: &mut StandardStream, text: &str) {
    let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
    let _ = writeln!(out, "{}", text);
    let _ = out.reset();
}

fn print_diff(out: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(x) => {
                let _ = out.reset();
                let _ = writeln!(out, " {}", x);
            }
            Difference::Add(x) => {
                let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                let _ = writeln!(out, "+{}", x);
            }
            Difference::Rem(x) => {
                let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                let _ = writeln!(out, "-{}", x);
            }
        }
    }
    let _ = out.reset();
}
