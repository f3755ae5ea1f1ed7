//! # dagflow
//!
//! CLI entry point for the `dagflow` dependency-graph evaluator.
//!
//! This binary is the external collaborator the engine's own spec calls out
//! as out of scope for the core: argument parsing, file loading, and JSON
//! ingest. It loads a top-level graph declaration (plus any embedded
//! subgraph/template declarations), an inputs file, runs the evaluator to
//! fixpoint, and prints the resolved state.
//!
//! ```bash
//! dagflow --graph-definitions pricing.json --inputs inputs.json
//! dagflow --graph-definitions root.json line_item.json --templates discount.json \
//!     --inputs inputs.json --echo-inputs
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

/// `DAGFLOW_LOG_FORMAT=json` switches to machine-parseable output, the same
/// knob the engine's own `GraphOptions::log_undefined_paths`/`log_literals`
/// emit through.
fn init_tracing() {
    let log_format = std::env::var("DAGFLOW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dagflow=info,dagflow_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
