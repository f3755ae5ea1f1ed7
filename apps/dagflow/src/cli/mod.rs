//! # dagflow CLI
//!
//! The CLI surface specified only for completeness (engine spec §6): load a
//! top-level graph declaration, any number of embedded subgraph and template
//! declarations, and an inputs file; run the evaluator; print the resolved
//! state as JSON.

mod commands;

use std::path::PathBuf;

use clap::Parser;

pub use commands::{CliError, execute};

/// `dagflow` — evaluate a dependency-graph declaration against a set of
/// inputs and print the resolved state.
#[derive(Parser, Debug)]
#[command(name = "dagflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Graph declaration files. The first is the top-level graph; any
    /// remaining files are embedded as `graph` nodes named after their
    /// filename (without extension).
    #[arg(long = "graph-definitions", num_args = 1.., required = true)]
    pub graph_definitions: Vec<PathBuf>,

    /// Template declaration files, embedded the same way as additional
    /// `--graph-definitions` entries but with `isTemplate: true`.
    #[arg(long = "templates", num_args = 0..)]
    pub templates: Vec<PathBuf>,

    /// Path to a JSON object of top-level inputs.
    #[arg(long = "inputs", required = true)]
    pub inputs: PathBuf,

    /// Include the synthesized `inputs` node's values in the printed state.
    #[arg(long = "echo-inputs")]
    pub echo_inputs: bool,

    /// Include template subgraph nodes in the printed state.
    #[arg(long = "echo-templates")]
    pub echo_templates: bool,

    /// Log unresolved paths on every non-terminal recomputation.
    #[arg(long = "log-undefined-paths")]
    pub log_undefined_paths: bool,

    /// Log whenever a string field is interpreted as a literal rather than
    /// a node reference during preprocessing.
    #[arg(long = "log-literals")]
    pub log_literals: bool,
}
