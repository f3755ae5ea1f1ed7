//! # dagflow-core
//!
//! The dependency-graph evaluation engine for serializable business logic —
//! THE LOGIC.
//!
//! A graph is an ordered set of JSON node declarations (literals, aliases,
//! transforms, branches, dereferences, subgraphs) sharing a namespace. The
//! engine preprocesses the declaration (alias expansion, `inputs` node
//! synthesis, literal hoisting), constructs one typed node per declaration,
//! and drives every node's reactive `value()` accessor to a fixpoint: once
//! every visible node is non-absent, `run` resolves with the final state map.
//!
//! ## Architectural constraints
//!
//! - Single-threaded cooperative scheduling: the engine never spawns an OS
//!   thread; `tokio::task`/`tokio::sync` are used only to suspend at
//!   deferred-await points (inputs, subgraph completion, async nodes).
//! - Closed node-kind set: no external logic may be injected beyond the
//!   transform registry's pluggable function table (see [`registry`]).
//! - Deterministic: node and edge tables preserve declaration order, and
//!   `serde_json` is built with `preserve_order` so a transform's resolved
//!   parameters fold in the order they were declared.

pub mod error;
pub mod events;
pub mod graph;
pub mod node;
pub mod path;
pub mod registry;
pub mod value;

pub use error::{DagError, DagResult};
pub use events::{Event, EventBus};
pub use graph::{DeferredValue, Edge, Graph, GraphOptions, InputValue, get_graph_value_at};
pub use node::{
    AliasNode, AsyncNode, BranchNode, CollectionMode, CommentsNode, DereferenceNode, EchoNode,
    FieldShape, GraphDefSource, GraphNode, InputsNode, Node, NodeKind, NodeType, PathDef,
    PathFieldSpec, StaticNode, TransformNode, normalize_path_def,
};
pub use path::{
    Segment, collect_paths, escape_segment, expand, flatten, get_at_path, get_at_path_with_wildcard,
    parse_segments, set_at_path, split_node_path,
};
pub use registry::TransformFn;
pub use value::{Maybe, all_present, finite_number, resolved_null};
