//! CLI command definitions for the `waypoint` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod inspect;
pub mod run;
pub mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Run state-machine workflows defined in YAML or JSON.
#[derive(Parser)]
#[command(name = "waypoint", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed logs (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Engine config file (default: $WAYPOINT_CONFIG or <config dir>/waypoint/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow file to completion.
    Run {
        /// Path to the workflow definition (.yaml, .yml or .json).
        file: PathBuf,

        /// Trigger payload as inline JSON.
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,

        /// Read the trigger payload from a JSON file.
        #[arg(long)]
        input_file: Option<PathBuf>,
    },

    /// Validate a workflow file and report reachable states.
    Validate {
        /// Path to the workflow definition.
        file: PathBuf,
    },

    /// Show the states of a workflow as a table.
    Show {
        /// Path to the workflow definition.
        file: PathBuf,
    },

    /// Serve every workflow in a directory over HTTP.
    Serve {
        /// Directory scanned (recursively) for workflow definitions.
        #[arg(long, default_value = "workflows")]
        dir: PathBuf,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on.
        #[arg(long, short, default_value = "8420")]
        port: u16,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}
