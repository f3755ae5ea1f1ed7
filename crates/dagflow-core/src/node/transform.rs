//! `transform`: `fn(resolvedParams)` once every param is non-absent.

use serde_json::Map;

use crate::error::DagError;
use crate::graph::{Graph, get_graph_value_at};
use crate::node::PathDef;
use crate::registry::{self, TransformFn};
use crate::value::Maybe;

pub struct TransformNode {
    f: TransformFn,
    params: PathDef,
}

impl TransformNode {
    pub fn new(fn_name: &str, params: PathDef) -> Result<Self, DagError> {
        Ok(Self {
            f: registry::lookup(fn_name)?,
            params,
        })
    }

    pub fn value(&self, graph: &Graph) -> Result<Maybe, DagError> {
        let mut resolved = Map::new();
        for (key, path) in &self.params {
            let Some(v) = get_graph_value_at(graph, path)? else {
                return Ok(None);
            };
            resolved.insert(key.clone(), v);
        }
        (self.f)(&resolved).map(Some)
    }
}
