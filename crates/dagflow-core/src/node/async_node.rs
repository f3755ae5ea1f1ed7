//! `async`: value of the deferred once it completes.
//!
//! Per SPEC_FULL.md Open Question 1, `promise` is a path-bearing field of
//! the same shape as `alias.mirror`: the node reads whatever path it
//! points at (typically into `inputs`, wherever `run`'s caller supplied a
//! deferred value), and resolves the moment that path stops being absent.
//! All of the actual suspension lives in [`crate::graph::Graph::run`], not
//! in this node kind's `value()`.

use crate::error::DagError;
use crate::graph::{Graph, get_graph_value_at};
use crate::value::Maybe;

pub struct AsyncNode {
    pub promise: String,
}

impl AsyncNode {
    #[must_use]
    pub fn new(promise: String) -> Self {
        Self { promise }
    }

    pub fn value(&self, graph: &Graph) -> Result<Maybe, DagError> {
        get_graph_value_at(graph, &self.promise)
    }
}
