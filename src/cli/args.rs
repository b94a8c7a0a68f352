//! Command-line arguments and subcommands for the netmacro CLI.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "netmacro",
    version,
    about = "Hierarchical SPICE netlist subcircuit expansion."
)]
pub struct NetmacroArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that reads a netlist.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// YAML configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// Override a configuration variable, e.g. `--set subc_catmode=spice3`.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,
    /// The first line is a statement, not a title.
    #[arg(long)]
    pub no_title: bool,
}

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the flat, fully expanded netlist.
    Expand {
        /// The netlist to expand.
        #[arg(required = true)]
        file: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
        /// Emit JSON instead of netlist text.
        #[arg(long)]
        json: bool,
        /// Drop disabled (commented-out) lines.
        #[arg(long)]
        strip: bool,
    },
    /// Show every inlined call as a diff against its call line.
    Trace {
        #[arg(required = true)]
        file: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// List the subcircuit definitions of a netlist.
    List {
        #[arg(required = true)]
        file: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        json: bool,
    },
    /// Expand a netlist, or every netlist under a directory, reporting only problems.
    Check {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
}
