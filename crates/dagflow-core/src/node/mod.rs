//! The closed node-kind hierarchy (spec §4.3).
//!
//! Every kind exposes `path_fields()`, a descriptor of which declaration
//! fields may reference other nodes, used by the graph's preprocessor (for
//! literal inference) and by edge derivation. By the time a node is
//! constructed, preprocessing has already rewritten every path-bearing
//! field to a plain path string pointing at a real node — so the kind
//! structs below never need to distinguish "literal" from "reference"
//! themselves, they just read paths.

mod alias;
mod async_node;
mod branch;
mod comments;
mod dereference;
mod echo;
mod graph_node;
mod inputs;
mod r#static;
mod transform;

pub use alias::AliasNode;
pub use async_node::AsyncNode;
pub use branch::BranchNode;
pub use comments::CommentsNode;
pub use dereference::DereferenceNode;
pub use echo::EchoNode;
pub use graph_node::{CollectionMode, GraphDefSource, GraphNode};
pub use inputs::InputsNode;
pub use r#static::StaticNode;
pub use transform::TransformNode;

use std::sync::{Mutex, Weak};

use serde_json::Value;

use crate::error::DagError;
use crate::graph::Graph;
use crate::value::Maybe;

/// A normalized path definition: local field name -> dotted path string, in
/// declaration order. Order matters: reduction transforms (`concat`,
/// `addN`, ...) fold their resolved params in this order, so a `Vec`
/// rather than a `BTreeMap` is used even though most entries are looked up
/// by key — this crate's `serde_json` is built with `preserve_order` for
/// the same reason. Accepts, pre-normalization, a single path string, a
/// sequence of path strings (key = path), or a mapping already in this
/// form (spec §3).
pub type PathDef = Vec<(String, String)>;

/// Normalize a `pathDef`-shaped JSON value into [`PathDef`].
pub fn normalize_path_def(value: &Value) -> Result<PathDef, DagError> {
    match value {
        Value::String(s) => Ok(vec![(s.clone(), s.clone())]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| (s.to_string(), s.to_string()))
                    .ok_or_else(|| {
                        DagError::Declaration("pathDef sequence must contain only strings".into())
                    })
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                v.as_str().map(|s| (k.clone(), s.to_string())).ok_or_else(|| {
                    DagError::Declaration(format!("pathDef entry '{k}' must be a path string"))
                })
            })
            .collect(),
        other => Err(DagError::Declaration(format!(
            "pathDef must be a string, a sequence of strings, or a mapping; got {other}"
        ))),
    }
}

/// The shape a path-bearing field's raw declaration value takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// A single path-or-literal value (e.g. `alias.mirror`).
    Single,
    /// An ordered list of path-or-literal values (e.g. `branch.nodeNames`);
    /// each element is resolved independently, keyed by its index.
    List,
    /// A `pathDef`-shaped mapping (e.g. `transform.params`); each entry is
    /// resolved independently, keyed by its pathDef key.
    PathDef,
}

/// Descriptor for one path-bearing declaration field.
#[derive(Debug, Clone, Copy)]
pub struct PathFieldSpec {
    pub field: &'static str,
    pub shape: FieldShape,
}

impl PathFieldSpec {
    /// `hasSubproperties` per spec §4.4: true for any multi-entry shape,
    /// meaning edges and literal-hoist names key off the entry itself
    /// rather than the field name.
    #[must_use]
    pub fn has_subproperties(self) -> bool {
        self.shape != FieldShape::Single
    }
}

/// The declared `type` string for each node kind, used by the preprocessor
/// and by `Graph::construct` to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Static,
    Comments,
    Alias,
    Echo,
    Dereference,
    Transform,
    Inputs,
    Async,
    Branch,
    Graph,
}

impl NodeType {
    #[must_use]
    pub fn parse(type_name: &str) -> Option<Self> {
        Some(match type_name {
            "static" => Self::Static,
            "comments" => Self::Comments,
            "alias" => Self::Alias,
            "echo" => Self::Echo,
            "dereference" => Self::Dereference,
            "transform" => Self::Transform,
            "inputs" => Self::Inputs,
            "async" => Self::Async,
            "branch" => Self::Branch,
            "graph" => Self::Graph,
            _ => return None,
        })
    }

    /// Path-bearing fields for this kind (spec §4.3's `pathFields()`).
    #[must_use]
    pub fn path_fields(self) -> &'static [PathFieldSpec] {
        const fn f(field: &'static str, shape: FieldShape) -> PathFieldSpec {
            PathFieldSpec { field, shape }
        }
        match self {
            Self::Static | Self::Comments | Self::Inputs => &[],
            Self::Alias => &[f("mirror", FieldShape::Single)],
            // `inputName` is a literal input key, never a path.
            Self::Echo => &[],
            Self::Dereference => &[
                f("objectPath", FieldShape::Single),
                f("propNamePath", FieldShape::Single),
            ],
            Self::Transform => &[f("params", FieldShape::PathDef)],
            // See SPEC_FULL.md Open Question 1: `promise` is treated as an
            // ordinary path-bearing field, same shape as `alias.mirror`.
            Self::Async => &[f("promise", FieldShape::Single)],
            Self::Branch => &[
                f("test", FieldShape::Single),
                f("nodeNames", FieldShape::List),
            ],
            Self::Graph => &[f("inputs", FieldShape::PathDef)],
        }
    }
}

/// Runtime instance of one node kind. Holds the mechanics each variant
/// needs to compute its value; never holds a direct `Arc<Graph>` (only a
/// `Weak`) so the graph and its nodes can be torn down together.
pub enum NodeKind {
    Static(StaticNode),
    Comments(CommentsNode),
    Alias(AliasNode),
    Echo(EchoNode),
    Dereference(DereferenceNode),
    Transform(TransformNode),
    Inputs(InputsNode),
    Async(AsyncNode),
    Branch(BranchNode),
    Graph(GraphNode),
}

/// A constructed node: identity, declaration, and the kind-specific
/// computation rule.
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub is_hidden: bool,
    pub declaration: Value,
    pub(crate) graph: Weak<Graph>,
    undefined_paths: Mutex<Vec<String>>,
}

impl Node {
    pub(crate) fn new(
        name: String,
        kind: NodeKind,
        is_hidden: bool,
        declaration: Value,
        graph: Weak<Graph>,
    ) -> Self {
        Self {
            name,
            kind,
            is_hidden,
            declaration,
            graph,
            undefined_paths: Mutex::new(Vec::new()),
        }
    }

    fn graph(&self) -> Option<std::sync::Arc<Graph>> {
        self.graph.upgrade()
    }

    /// Compute (or return the cached/current) value of this node.
    pub fn value(&self) -> Result<Maybe, DagError> {
        let Some(graph) = self.graph() else {
            return Ok(None);
        };
        match &self.kind {
            NodeKind::Static(n) => Ok(n.value()),
            NodeKind::Comments(n) => Ok(n.value()),
            NodeKind::Alias(n) => n.value(&graph),
            NodeKind::Echo(n) => n.value(&graph, &self.name),
            NodeKind::Dereference(n) => n.value(&graph),
            NodeKind::Transform(n) => n.value(&graph),
            NodeKind::Inputs(n) => Ok(n.value()),
            NodeKind::Async(n) => n.value(&graph),
            NodeKind::Branch(n) => n.value(&graph),
            NodeKind::Graph(n) => Ok(n.value()),
        }
    }

    /// Diagnostic list of currently-undefined dependency paths, refreshed
    /// on every `value()` call site that cares to record it.
    pub fn record_undefined(&self, paths: Vec<String>) {
        *self.undefined_paths.lock().unwrap_or_else(|e| e.into_inner()) = paths;
    }

    #[must_use]
    pub fn undefined_paths(&self) -> Vec<String> {
        self.undefined_paths
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
