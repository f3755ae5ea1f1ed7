//! CLI command implementation: load declarations, run the evaluator, print
//! the resolved state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dagflow_core::{DagError, Graph, GraphOptions, InputValue};
use serde_json::Value;

use super::Cli;

/// Errors this binary can fail with, distinct from [`DagError`] (which
/// covers only evaluation-time failures) so the exit path can tell a load
/// failure from a run failure while still printing one message either way.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}' as JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{path}' must contain a JSON array of node declarations")]
    NotADeclarationArray { path: PathBuf },

    #[error("'{path}' must contain a JSON object of named inputs")]
    NotAnInputsObject { path: PathBuf },

    #[error("'{path}' has no usable filename to derive a node name from")]
    NoFileStem { path: PathBuf },

    #[error(transparent)]
    Evaluation(#[from] DagError),
}

/// Load and parse a JSON file, reporting the path on failure.
fn load_json(path: &Path) -> Result<Value, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a file expected to contain a JSON array of node declarations.
fn load_declaration_array(path: &Path) -> Result<Vec<Value>, CliError> {
    match load_json(path)? {
        Value::Array(items) => Ok(items),
        _ => Err(CliError::NotADeclarationArray {
            path: path.to_path_buf(),
        }),
    }
}

/// The filename stem (no extension), used as the synthesized node's name
/// for every embedded graph/template definition file.
fn node_name_for(path: &Path) -> Result<String, CliError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| CliError::NoFileStem {
            path: path.to_path_buf(),
        })
}

/// Load every `--graph-definitions` entry after the first, and every
/// `--templates` entry, as `graph`-kind nodes named after their filename
/// (spec §6 CLI surface).
fn embedded_graph_nodes(graph_definitions: &[PathBuf], templates: &[PathBuf]) -> Result<Vec<Value>, CliError> {
    let mut nodes = Vec::with_capacity(graph_definitions.len().saturating_sub(1) + templates.len());

    for path in graph_definitions.iter().skip(1) {
        let decl = load_declaration_array(path)?;
        let name = node_name_for(path)?;
        nodes.push(serde_json::json!({
            "name": name,
            "type": "graph",
            "graphDef": decl,
        }));
    }
    for path in templates {
        let decl = load_declaration_array(path)?;
        let name = node_name_for(path)?;
        nodes.push(serde_json::json!({
            "name": name,
            "type": "graph",
            "graphDef": decl,
            "isTemplate": true,
        }));
    }

    Ok(nodes)
}

/// Load `--inputs` into the mapping `Graph::run` accepts. The CLI never
/// supplies a deferred value itself — every entry loaded from a file is
/// already resolved.
fn load_inputs(path: &Path) -> Result<HashMap<String, InputValue>, CliError> {
    let obj = match load_json(path)? {
        Value::Object(map) => map,
        _ => {
            return Err(CliError::NotAnInputsObject {
                path: path.to_path_buf(),
            });
        }
    };
    Ok(obj
        .into_iter()
        .map(|(k, v)| (k, InputValue::Value(v)))
        .collect())
}

fn graph_options(cli: &Cli) -> GraphOptions {
    GraphOptions {
        echo_inputs: cli.echo_inputs,
        echo_templates: cli.echo_templates,
        echo_intermediates: false,
        log_undefined_paths: cli.log_undefined_paths,
        log_literals: cli.log_literals,
        depth: 0,
    }
}

/// Run the CLI: load declarations and inputs, evaluate to fixpoint, print
/// the resolved state. Any load or run failure is returned as a
/// [`CliError`] and the caller exits non-zero.
pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let root_path = cli
        .graph_definitions
        .first()
        .expect("clap enforces at least one --graph-definitions entry");
    let mut root_decl = load_declaration_array(root_path)?;
    root_decl.extend(embedded_graph_nodes(&cli.graph_definitions, &cli.templates)?);

    let graph = Graph::new(root_decl, "root", graph_options(&cli))?;
    let inputs = load_inputs(&cli.inputs)?;
    let state = graph.run(inputs).await?;

    println!("{}", serde_json::to_string_pretty(&state).unwrap_or_default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_json(dir: &tempfile::TempDir, name: &str, value: &Value) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{value}").unwrap();
        path
    }

    #[test]
    fn node_name_for_strips_extension() {
        let path = PathBuf::from("/tmp/line_item.json");
        assert_eq!(node_name_for(&path).unwrap(), "line_item");
    }

    #[test]
    fn load_declaration_array_rejects_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&dir, "bad.json", &serde_json::json!({"not": "an array"}));
        assert!(matches!(
            load_declaration_array(&path),
            Err(CliError::NotADeclarationArray { .. })
        ));
    }

    #[test]
    fn load_inputs_rejects_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&dir, "inputs.json", &serde_json::json!([1, 2, 3]));
        assert!(matches!(
            load_inputs(&path),
            Err(CliError::NotAnInputsObject { .. })
        ));
    }

    #[test]
    fn embedded_graph_nodes_names_templates_and_subgraphs() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_json(&dir, "root.json", &serde_json::json!([]));
        let sub = write_json(&dir, "line_item.json", &serde_json::json!([]));
        let tmpl = write_json(&dir, "discount.json", &serde_json::json!([]));

        let nodes = embedded_graph_nodes(&[root, sub], &[tmpl]).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["name"], serde_json::json!("line_item"));
        assert_eq!(nodes[0]["isTemplate"], Value::Null);
        assert_eq!(nodes[1]["name"], serde_json::json!("discount"));
        assert_eq!(nodes[1]["isTemplate"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn execute_runs_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_json(
            &dir,
            "root.json",
            &serde_json::json!([
                {"name": "t", "type": "transform", "fn": "mult", "params": {"amt": "inputs.x", "factor": 3}},
            ]),
        );
        let inputs = write_json(&dir, "inputs.json", &serde_json::json!({"x": 4}));

        let cli = Cli {
            graph_definitions: vec![root],
            templates: vec![],
            inputs,
            echo_inputs: false,
            echo_templates: false,
            log_undefined_paths: false,
            log_literals: false,
        };
        execute(cli).await.unwrap();
    }
}
