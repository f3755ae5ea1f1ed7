//! `alias`: current value at `mirror`.

use crate::error::DagError;
use crate::graph::{Graph, get_graph_value_at};
use crate::value::Maybe;

pub struct AliasNode {
    pub mirror: String,
}

impl AliasNode {
    #[must_use]
    pub fn new(mirror: String) -> Self {
        Self { mirror }
    }

    pub fn value(&self, graph: &Graph) -> Result<Maybe, DagError> {
        get_graph_value_at(graph, &self.mirror)
    }
}
