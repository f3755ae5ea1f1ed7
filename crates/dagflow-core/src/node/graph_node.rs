//! `graph`: a node that embeds a child graph (spec §4.5).
//!
//! This struct only holds the node's configuration and its settled result;
//! the actual input-resolution / child-instantiation / execution logic
//! lives on [`crate::graph::Graph`] (`drive_subgraphs`), since driving a
//! subgraph needs an `Arc` back to the owning graph to spawn the child
//! evaluation as a task and to look up ancestors for template references.

use std::sync::Mutex;

use serde_json::Value;

use crate::node::PathDef;
use crate::value::Maybe;

#[derive(Debug, Clone)]
pub enum GraphDefSource {
    /// `graphDef` was a declaration array: use it directly.
    Literal(Vec<Value>),
    /// `graphDef` was a string: the name of a template node, resolved
    /// (ancestors allowed) once the enclosing graph is constructed.
    TemplateRef(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    Map,
}

pub struct GraphNode {
    pub def_source: GraphDefSource,
    /// Explicit `inputs` pathDef, if the declaration supplied one; `None`
    /// means "scan the child declaration for `inputs.*` references".
    pub explicit_inputs: Option<PathDef>,
    pub collection_mode: Option<CollectionMode>,
    /// Templates are never executed in place; their value is a fixed
    /// placeholder and they are hidden by default (spec §4.5).
    pub is_template: bool,
    state: Mutex<GraphNodeState>,
}

#[derive(Default)]
struct GraphNodeState {
    started: bool,
    value: Maybe,
}

const TEMPLATE_PLACEHOLDER: &str = "<template>";

impl GraphNode {
    #[must_use]
    pub fn new(
        def_source: GraphDefSource,
        explicit_inputs: Option<PathDef>,
        collection_mode: Option<CollectionMode>,
        is_template: bool,
    ) -> Self {
        Self {
            def_source,
            explicit_inputs,
            collection_mode,
            is_template,
            state: Mutex::new(GraphNodeState::default()),
        }
    }

    #[must_use]
    pub fn value(&self) -> Maybe {
        if self.is_template {
            return Some(Value::String(TEMPLATE_PLACEHOLDER.to_string()));
        }
        self.state.lock().unwrap_or_else(|e| e.into_inner()).value.clone()
    }

    /// Atomically claim the right to start this subgraph's execution.
    /// Returns `true` exactly once across the node's lifetime.
    pub(crate) fn claim_start(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.started {
            false
        } else {
            state.started = true;
            true
        }
    }

    pub(crate) fn set_value(&self, value: Value) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).value = Some(value);
    }
}
