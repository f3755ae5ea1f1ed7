//! `echo`: current value at `inputs.<inputName>` (default = this node's own
//! name). The only node kind permitted to share a name with a top-level
//! input, since it exists specifically to surface one.

use crate::error::DagError;
use crate::graph::{Graph, get_graph_value_at};
use crate::value::Maybe;

pub struct EchoNode {
    pub input_name: Option<String>,
}

impl EchoNode {
    #[must_use]
    pub fn new(input_name: Option<String>) -> Self {
        Self { input_name }
    }

    pub fn value(&self, graph: &Graph, own_name: &str) -> Result<Maybe, DagError> {
        let key = self.input_name.as_deref().unwrap_or(own_name);
        get_graph_value_at(graph, &format!("inputs.{key}"))
    }
}
