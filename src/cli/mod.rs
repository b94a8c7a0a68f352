//! The netmacro command-line interface.
//!
//! Argument parsing lives in `args`, presentation in `output`. The handlers
//! here only build a configuration, run the `ExpansionPipeline` and pass the
//! results on.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use miette::{IntoDiagnostic, Report};
use walkdir::WalkDir;

use crate::cli::args::{Command, ConfigArgs, NetmacroArgs};
use crate::config::ExpandConfig;
use crate::engine::ExpansionPipeline;
use crate::errors::ExpansionErrors;
use crate::output::StdoutSink;

pub mod args;
pub mod output;

const NETLIST_EXTENSIONS: &[&str] = &["cir", "sp", "spi", "spice", "net", "ckt"];

/// The main entry point for the CLI.
pub fn run() {
    let args = NetmacroArgs::parse();

    let result = match args.command {
        Command::Expand {
            file,
            config,
            json,
            strip,
        } => handle_expand(&file, &config, json, strip),
        Command::Trace { file, config } => handle_trace(&file, &config),
        Command::List { file, config, json } => handle_list(&file, &config, json),
        Command::Check { path, config } => handle_check(&path, &config),
    };

    if let Err(report) = result {
        output::print_report(&report);
        process::exit(1);
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn handle_expand(path: &Path, args: &ConfigArgs, json: bool, strip: bool) -> miette::Result<()> {
    let pipeline = build_pipeline(args)?;
    let source = ExpansionPipeline::read_file(path)?;
    if json {
        let out = pipeline.run(&source).map_err(failure)?;
        let report = output::ExpansionReport::new(&out, strip);
        let text = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{}", text);
        return Ok(());
    }
    let out = pipeline
        .run_to(&source, strip, &mut StdoutSink)
        .map_err(failure)?;
    output::print_warnings(&out.expansion.warnings);
    Ok(())
}

fn handle_trace(path: &Path, args: &ConfigArgs) -> miette::Result<()> {
    let pipeline = build_pipeline(args)?;
    let source = ExpansionPipeline::read_file(path)?;
    let out = pipeline.run(&source).map_err(failure)?;
    output::print_trace(&out.expansion.trace);
    output::print_warnings(&out.expansion.warnings);
    Ok(())
}

fn handle_list(path: &Path, args: &ConfigArgs, json: bool) -> miette::Result<()> {
    let pipeline = build_pipeline(args)?;
    let source = ExpansionPipeline::read_file(path)?;
    let defs = pipeline.definitions(&source).map_err(Report::new)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&defs).into_diagnostic()?);
    } else {
        output::print_definitions(&defs);
    }
    Ok(())
}

fn handle_check(path: &Path, args: &ConfigArgs) -> miette::Result<()> {
    let pipeline = build_pipeline(args)?;
    let files = discover_netlists(path);
    if files.is_empty() {
        return Err(miette::miette!("no netlists found under '{}'", path.display()));
    }

    let mut failed = 0usize;
    for file in &files {
        let display = file.display().to_string();
        let outcome = ExpansionPipeline::read_file(file)
            .and_then(|source| pipeline.run(&source).map_err(Report::new))
            .map(|out| out.expansion.warnings.len());
        match outcome {
            Ok(warnings) => output::print_check(&display, Ok(warnings)),
            Err(report) => {
                failed += 1;
                output::print_check(&display, Err(&report));
            }
        }
    }
    if failed > 0 {
        return Err(miette::miette!("{} of {} netlists failed", failed, files.len()));
    }
    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

fn build_pipeline(args: &ConfigArgs) -> miette::Result<ExpansionPipeline<'static>> {
    let mut config = match &args.config {
        Some(path) => ExpandConfig::load(path).into_diagnostic()?,
        None => ExpandConfig::default(),
    };
    for assignment in &args.set {
        config.set_assignment(assignment).into_diagnostic()?;
    }
    Ok(ExpansionPipeline::new(config).title(!args.no_title))
}

// Shows the annotated deck before handing the errors to miette.
fn failure(errors: ExpansionErrors) -> Report {
    if let Some(deck) = &errors.deck {
        output::print_annotations(deck);
    }
    Report::new(errors)
}

fn discover_netlists(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| NETLIST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}
