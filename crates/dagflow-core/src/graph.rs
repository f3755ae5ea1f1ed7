//! The graph: preprocessing, node construction, edge derivation, and the
//! reactive fixpoint driver (spec §4.4).
//!
//! Per Design Notes §9, the "reactive runtime" of the reference
//! implementation is reinterpreted here as explicit dependency tracking: a
//! loop that recomputes [`Graph::get_state`] and checks for undefined
//! paths every time an observed dependency changes, rather than a borrowed
//! signals library. The contract is preserved — every node's `value()` is
//! a synchronous, memoized-per-call read of its current dependencies, and
//! the loop iterates to fixpoint.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};

use serde_json::{Map, Value};
use tokio::sync::Notify;
use tokio::task::JoinSet;

use crate::error::{DagError, DagResult};
use crate::events::{Event, EventBus};
use crate::node::{
    AliasNode, AsyncNode, BranchNode, CollectionMode, CommentsNode, DereferenceNode, EchoNode,
    GraphDefSource, GraphNode, InputsNode, Node, NodeKind, NodeType, PathDef, StaticNode,
    TransformNode, normalize_path_def,
};
use crate::path::{get_at_path_with_wildcard, split_node_path};
use crate::registry;
use crate::value::Maybe;

/// A future resolving to a single value, or failing — spec's "deferred
/// value": any user-supplied input exposing a single-shot eventual
/// completion.
pub type DeferredValue = Pin<Box<dyn Future<Output = DagResult<Value>> + Send>>;

/// One entry of the mapping `run` accepts: either an already-resolved
/// value, or a deferred one the driver awaits before writing it in.
pub enum InputValue {
    Value(Value),
    Deferred(DeferredValue),
}

impl From<Value> for InputValue {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

/// Options controlling a graph's construction and output (spec §6).
#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub echo_inputs: bool,
    pub echo_templates: bool,
    pub echo_intermediates: bool,
    pub log_undefined_paths: bool,
    pub log_literals: bool,
    pub depth: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            echo_inputs: false,
            echo_templates: false,
            echo_intermediates: false,
            log_undefined_paths: false,
            log_literals: false,
            depth: 0,
        }
    }
}

/// One derived edge, for introspection only — the driver never traverses
/// these (spec §4.4).
#[derive(Debug, Clone)]
pub struct Edge {
    pub src_node_id: String,
    pub src_prop_name: String,
    pub dst_node_id: String,
    pub dst_value_path: Option<String>,
}

const INPUTS_NODE_NAME: &str = "inputs";
const DEFAULT_CASE: &str = "_default_";

pub struct Graph {
    pub name: String,
    nodes: Vec<(String, Arc<Node>)>,
    edges: Vec<Edge>,
    parent: Option<Weak<Graph>>,
    options: GraphOptions,
    events: EventBus,
    notify: Notify,
    failure: Mutex<Option<DagError>>,
}

impl Graph {
    /// Construct a root graph (no supergraph).
    pub fn new(declaration: Vec<Value>, name: impl Into<String>, options: GraphOptions) -> DagResult<Arc<Self>> {
        Self::construct(declaration, name.into(), None, options)
    }

    /// Construct a child graph whose `supergraph` is `parent`.
    pub fn new_child(
        declaration: Vec<Value>,
        name: impl Into<String>,
        parent: Weak<Graph>,
        options: GraphOptions,
    ) -> DagResult<Arc<Self>> {
        Self::construct(declaration, name.into(), Some(parent), options)
    }

    fn construct(
        declaration: Vec<Value>,
        name: String,
        parent: Option<Weak<Graph>>,
        options: GraphOptions,
    ) -> DagResult<Arc<Self>> {
        let preprocessed = preprocess(declaration, &options)?;

        // Declarations are validated and turned into kind instances before
        // the graph itself exists, since `Arc::new_cyclic`'s closure must
        // be infallible — only wrapping the already-built kinds into
        // `Node`s (which needs a `Weak<Graph>` back-reference) happens
        // inside it.
        let built: Vec<(String, NodeKind, bool, Value)> = preprocessed
            .iter()
            .map(build_node_kind)
            .collect::<DagResult<_>>()?;
        let edges = derive_edges(&preprocessed)?;

        let graph = Arc::new_cyclic(|weak_self: &Weak<Graph>| {
            let nodes = built
                .into_iter()
                .map(|(n_name, kind, is_hidden, decl)| {
                    let node = Node::new(n_name.clone(), kind, is_hidden, decl, weak_self.clone());
                    (n_name, Arc::new(node))
                })
                .collect();
            Self {
                name,
                nodes,
                edges,
                parent,
                options,
                events: EventBus::new(),
                notify: Notify::new(),
                failure: Mutex::new(None),
            }
        });

        graph.events.emit(Event::Constructed {
            graph: graph.name.clone(),
        });
        graph.events.emit(Event::Connected {
            graph: graph.name.clone(),
        });

        Ok(graph)
    }

    /// Visible node names and their `Node` handles, in declaration order.
    #[must_use]
    pub fn get_d_nodes(&self) -> &[(String, Arc<Node>)] {
        &self.nodes
    }

    #[must_use]
    pub fn get_d_edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a node by name, optionally walking to supergraphs.
    #[must_use]
    pub fn get_d_node(&self, name: &str, search_ancestors: bool) -> Option<Arc<Node>> {
        if let Some((_, node)) = self.nodes.iter().find(|(n, _)| n == name) {
            return Some(node.clone());
        }
        if search_ancestors {
            if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
                return parent.get_d_node(name, true);
            }
        }
        None
    }

    fn root(&self) -> Option<Arc<Graph>> {
        let mut current = self.parent.as_ref()?.upgrade()?;
        loop {
            let next = current.parent.as_ref().and_then(Weak::upgrade);
            match next {
                Some(p) => current = p,
                None => return Some(current),
            }
        }
    }

    fn inputs_node(&self) -> DagResult<Arc<Node>> {
        self.get_d_node(INPUTS_NODE_NAME, false)
            .ok_or_else(|| DagError::Declaration("graph has no synthesized 'inputs' node".into()))
    }

    fn is_visible(&self, node: &Node, include_hidden: bool) -> bool {
        if include_hidden {
            return true;
        }
        if node.name.starts_with('#') {
            return self.options.echo_intermediates;
        }
        if node.name == INPUTS_NODE_NAME {
            return self.options.echo_inputs;
        }
        if let NodeKind::Graph(g) = &node.kind {
            if g.is_template {
                return self.options.echo_templates;
            }
        }
        !node.is_hidden
    }

    /// Snapshot of current visible values (spec §4.4 `getState`).
    pub fn get_state(&self, include_hidden: bool) -> DagResult<Value> {
        let mut out = Map::new();
        for (name, node) in &self.nodes {
            if !self.is_visible(node, include_hidden) {
                continue;
            }
            if let Some(v) = node.value()? {
                out.insert(name.clone(), v);
            }
        }
        Ok(Value::Object(out))
    }

    /// Visible node names whose value is currently absent.
    fn collect_undefined(&self) -> DagResult<Vec<String>> {
        let mut out = Vec::new();
        for (name, node) in &self.nodes {
            if !self.is_visible(node, false) {
                continue;
            }
            let mut node_undefined = Vec::new();
            if node.value()?.is_none() {
                out.push(name.clone());
                node_undefined.push(name.clone());
            }
            node.record_undefined(node_undefined);
        }
        Ok(out)
    }

    /// Every `inputs.<name>` the declaration references, scanned from the
    /// preprocessed path-bearing fields (spec §4.4 `run` step 1).
    fn expected_input_names(&self) -> BTreeSet<String> {
        let mut expected = BTreeSet::new();
        for (_, node) in &self.nodes {
            for path in path_strings_of(&node.declaration) {
                let (node_id, value_path) = split_node_path(&path);
                if node_id == INPUTS_NODE_NAME {
                    if let Some(rest) = value_path {
                        if let Some((first, _)) = rest.split_once('.') {
                            expected.insert(first.to_string());
                        } else {
                            expected.insert(rest);
                        }
                    }
                }
            }
        }
        expected
    }

    fn validate_inputs(&self, inputs: &std::collections::HashMap<String, InputValue>) -> DagResult<()> {
        for name in self.expected_input_names() {
            if !inputs.contains_key(&name) {
                return Err(DagError::MissingInput(name));
            }
        }
        for key in inputs.keys() {
            if let Some(node) = self.get_d_node(key, false) {
                if !matches!(node.kind, NodeKind::Echo(_)) {
                    return Err(DagError::Declaration(format!(
                        "input name '{key}' collides with a non-echo node"
                    )));
                }
            }
        }
        Ok(())
    }

    fn take_failure(&self) -> Option<DagError> {
        self.failure.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn set_failure(&self, err: DagError) {
        let mut slot = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    /// Run the evaluator to fixpoint (spec §4.4 `run`).
    pub async fn run(self: &Arc<Self>, inputs: std::collections::HashMap<String, InputValue>) -> DagResult<Value> {
        self.validate_inputs(&inputs)?;

        let inputs_node = self.inputs_node()?;
        let NodeKind::Inputs(inputs_kind) = &inputs_node.kind else {
            return Err(DagError::Declaration("'inputs' node has the wrong kind".into()));
        };

        let mut pending: JoinSet<(String, DagResult<Value>)> = JoinSet::new();
        for (key, value) in inputs {
            match value {
                InputValue::Value(v) => inputs_kind.set_value(&key, v),
                InputValue::Deferred(fut) => {
                    pending.spawn(async move { (key, fut.await) });
                }
            }
        }
        self.notify.notify_waiters();

        loop {
            // Register intent to wait *before* driving subgraphs or reading
            // state: `Notify::notified()` latches onto any `notify_waiters()`
            // call that happens after this point even though it isn't polled
            // yet, so a subgraph that settles synchronously inside
            // `drive_subgraphs` (e.g. a default-mode child that's a single
            // `static` node) and calls `notify_waiters()` before we ever
            // reach `.await` below cannot have its wakeup silently dropped.
            // Creating the future any later — e.g. right at the `.await`
            // site — leaves exactly that window open, since
            // `notify_waiters()` only wakes futures that already exist.
            let notified = self.notify.notified();

            self.drive_subgraphs(self)?;

            if let Some(err) = self.take_failure() {
                self.events.emit(Event::Error {
                    graph: self.name.clone(),
                    message: err.to_string(),
                });
                return Err(err);
            }

            let state = self.get_state(false)?;
            let undefined = self.collect_undefined()?;

            if undefined.is_empty() {
                self.events.emit(Event::Resolved {
                    graph: self.name.clone(),
                    state: state.clone(),
                });
                return Ok(state);
            }

            if self.options.log_undefined_paths {
                tracing::debug!(graph = %self.name, depth = self.options.depth, ?undefined, "undefined paths");
            }
            self.events.emit(Event::Stepped {
                graph: self.name.clone(),
                state,
                undefined_paths: undefined,
            });

            if pending.is_empty() {
                notified.await;
                continue;
            }

            tokio::select! {
                joined = pending.join_next() => {
                    match joined {
                        Some(Ok((key, Ok(v)))) => {
                            inputs_kind.set_value(&key, v);
                            self.notify.notify_waiters();
                        }
                        Some(Ok((_, Err(e)))) => return Err(e),
                        Some(Err(join_err)) => {
                            return Err(DagError::Declaration(format!(
                                "deferred input task failed: {join_err}"
                            )));
                        }
                        None => {}
                    }
                }
                () = notified => {}
            }
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Start (or advance progress on) every `graph`-kind node whose
    /// resolved inputs are ready and which hasn't started yet.
    fn drive_subgraphs(self: &Arc<Self>, root_graph: &Arc<Graph>) -> DagResult<()> {
        for (node_name, node) in &self.nodes {
            let NodeKind::Graph(gnode) = &node.kind else {
                continue;
            };
            if gnode.is_template {
                continue;
            }
            let Some(resolved) = self.resolve_subgraph_inputs(gnode)? else {
                continue;
            };
            if !gnode.claim_start() {
                continue;
            }
            self.spawn_subgraph(node_name.clone(), node.clone(), resolved, root_graph.clone());
        }
        Ok(())
    }

    fn resolve_child_declaration(&self, gnode: &GraphNode) -> DagResult<Vec<Value>> {
        match &gnode.def_source {
            GraphDefSource::Literal(decl) => Ok(decl.clone()),
            GraphDefSource::TemplateRef(name) => {
                let template = self
                    .get_d_node(name, true)
                    .ok_or_else(|| DagError::Resolution(format!("template '{name}' not found")))?;
                let NodeKind::Graph(template_gnode) = &template.kind else {
                    return Err(DagError::Resolution(format!("'{name}' is not a graph template")));
                };
                match &template_gnode.def_source {
                    GraphDefSource::Literal(decl) => Ok(decl.clone()),
                    GraphDefSource::TemplateRef(_) => Err(DagError::Resolution(format!(
                        "template '{name}' cannot itself reference another template"
                    ))),
                }
            }
        }
    }

    fn resolve_subgraph_inputs(&self, gnode: &GraphNode) -> DagResult<Option<Map<String, Value>>> {
        let mut resolved = Map::new();

        if let Some(explicit) = &gnode.explicit_inputs {
            for (key, path) in explicit {
                let Some(v) = get_graph_value_at(self, path)? else {
                    return Ok(None);
                };
                resolved.insert(key.clone(), v);
            }
            return Ok(Some(resolved));
        }

        let child_decl = self.resolve_child_declaration(gnode)?;
        let mut ids = BTreeSet::new();
        for decl in &child_decl {
            for path in path_strings_of(decl) {
                let (node_id, value_path) = split_node_path(&path);
                if node_id == INPUTS_NODE_NAME {
                    if let Some(rest) = value_path {
                        let id = rest.split_once('.').map_or(rest.as_str(), |(h, _)| h);
                        ids.insert(id.to_string());
                    }
                }
            }
        }

        for id in ids {
            let value = if let Some(node) = self.get_d_node(&id, false) {
                get_graph_value_at(self, &id)?.map(|v| (v, node.is_hidden))
            } else if let Some(v) = self.inputs_node_value(&id)? {
                Some((v, false))
            } else if let Some(root) = self.root() {
                root.inputs_node_value(&id)?.map(|v| (v, false))
            } else {
                None
            };
            match value {
                Some((v, _)) => {
                    resolved.insert(id, v);
                }
                None => return Ok(None),
            }
        }
        Ok(Some(resolved))
    }

    fn inputs_node_value(&self, key: &str) -> DagResult<Option<Value>> {
        let Some(node) = self.get_d_node(INPUTS_NODE_NAME, false) else {
            return Ok(None);
        };
        let Some(Value::Object(map)) = node.value()? else {
            return Ok(None);
        };
        Ok(map.get(key).cloned())
    }

    fn spawn_subgraph(
        self: &Arc<Self>,
        node_name: String,
        node: Arc<Node>,
        resolved: Map<String, Value>,
        root_graph: Arc<Graph>,
    ) {
        let parent = self.clone();
        tokio::spawn(async move {
            let result = run_subgraph(&parent, &node_name, resolved).await;
            match result {
                Ok(v) => {
                    if let NodeKind::Graph(gnode) = &node.kind {
                        gnode.set_value(v);
                    }
                    root_graph.notify.notify_waiters();
                }
                Err(e) => {
                    root_graph.set_failure(e);
                    root_graph.notify.notify_waiters();
                }
            }
        });
    }
}

async fn run_subgraph(parent: &Arc<Graph>, node_name: &str, resolved: Map<String, Value>) -> DagResult<Value> {
    let node = parent
        .get_d_node(node_name, false)
        .ok_or_else(|| DagError::Resolution(format!("subgraph node '{node_name}' vanished")))?;
    let NodeKind::Graph(gnode) = &node.kind else {
        return Err(DagError::Declaration(format!("'{node_name}' is not a graph node")));
    };
    let child_decl = parent.resolve_child_declaration(gnode)?;
    let child_options = GraphOptions {
        depth: parent.options.depth + 1,
        ..parent.options.clone()
    };

    if gnode.collection_mode == Some(CollectionMode::Map) {
        let collection = resolved
            .get("collection")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                DagError::Declaration(format!(
                    "'{node_name}': collectionMode 'map' requires a resolved 'collection' input that is a sequence"
                ))
            })?
            .clone();

        let other_inputs: Map<String, Value> = resolved
            .iter()
            .filter(|(k, _)| k.as_str() != "collection")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut tasks: JoinSet<(usize, DagResult<Value>)> = JoinSet::new();
        for (index, item) in collection.into_iter().enumerate() {
            let decl = child_decl.clone();
            let mut item_inputs = other_inputs.clone();
            item_inputs.insert("item".to_string(), item);
            let child_name = format!("{node_name}[{index}]");
            let options = child_options.clone();
            tasks.spawn(async move {
                let result = run_one_child(decl, child_name, options, item_inputs).await;
                (index, result)
            });
        }
        let mut results: Vec<(usize, Value)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined
                .map_err(|e| DagError::Declaration(format!("map element task failed: {e}")))?;
            results.push((index, result?));
        }
        results.sort_by_key(|(i, _)| *i);
        return Ok(Value::Array(results.into_iter().map(|(_, v)| v).collect()));
    }

    run_one_child(child_decl, node_name.to_string(), child_options, resolved).await
}

async fn run_one_child(
    decl: Vec<Value>,
    name: String,
    options: GraphOptions,
    inputs: Map<String, Value>,
) -> DagResult<Value> {
    let child = Graph::new(decl, name, options)?;
    let input_values = inputs
        .into_iter()
        .map(|(k, v)| (k, InputValue::Value(v)))
        .collect();
    child.run(input_values).await
}

/// The value-reading protocol every node kind uses (spec §4.3
/// "getGraphValueAt"): look up the node by id; if missing, log and return
/// absent; read its current value; apply the remaining value path (with
/// wildcard support) if present.
pub fn get_graph_value_at(graph: &Graph, path: &str) -> DagResult<Maybe> {
    let (node_id, value_path) = split_node_path(path);
    let Some(node) = graph.get_d_node(&node_id, false) else {
        tracing::trace!(node = %node_id, "getGraphValueAt: node not found, treating as absent");
        return Ok(None);
    };
    let Some(value) = node.value()? else {
        return Ok(None);
    };
    match value_path {
        None => Ok(Some(value)),
        Some(vp) => get_at_path_with_wildcard(&value, &vp),
    }
}

// ---------------------------------------------------------------------------
// Preprocessing (spec §4.4 "Preprocessing")
// ---------------------------------------------------------------------------

fn preprocess(declaration: Vec<Value>, options: &GraphOptions) -> DagResult<Vec<Value>> {
    let mut nodes = expand_aliases(declaration)?;
    nodes.push(serde_json::json!({"name": INPUTS_NODE_NAME, "type": "inputs"}));

    let declared_names: BTreeSet<String> = nodes
        .iter()
        .filter_map(|n| n.get("name").and_then(Value::as_str).map(str::to_string))
        .collect();

    let mut synthetic = Vec::new();
    for node in &mut nodes {
        hoist_literals(node, &declared_names, options, &mut synthetic)?;
    }
    nodes.extend(synthetic);
    Ok(nodes)
}

fn expand_aliases(declaration: Vec<Value>) -> DagResult<Vec<Value>> {
    let mut out = Vec::with_capacity(declaration.len());
    let mut extra = Vec::new();
    for node in declaration {
        let Some(obj) = node.as_object() else {
            return Err(DagError::Declaration("node declaration must be a mapping".into()));
        };
        let Some(owner_name) = obj.get("name").and_then(Value::as_str) else {
            return Err(DagError::Declaration("node declaration missing 'name'".into()));
        };
        if owner_name == INPUTS_NODE_NAME {
            return Err(DagError::Declaration(
                "declarations must not name a node 'inputs' — it is synthesized".into(),
            ));
        }
        if let Some(aliases) = obj.get("aliases") {
            for alias_name in alias_names(aliases)? {
                extra.push(serde_json::json!({
                    "name": alias_name,
                    "type": "alias",
                    "mirror": owner_name,
                }));
            }
        }
        out.push(node);
    }
    out.extend(extra);
    Ok(out)
}

fn alias_names(value: &Value) -> DagResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| DagError::Declaration("'aliases' entries must be strings".into()))
            })
            .collect(),
        other => Err(DagError::Declaration(format!(
            "'aliases' must be a string or a sequence of strings; got {other}"
        ))),
    }
}

fn hoist_literals(
    node: &mut Value,
    declared_names: &BTreeSet<String>,
    options: &GraphOptions,
    synthetic: &mut Vec<Value>,
) -> DagResult<()> {
    let Some(type_str) = node.get("type").and_then(Value::as_str) else {
        return Err(DagError::Declaration("node declaration missing 'type'".into()));
    };
    let Some(node_type) = NodeType::parse(type_str) else {
        return Err(DagError::Declaration(format!("unknown node kind '{type_str}'")));
    };
    let owner = node
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    for spec in node_type.path_fields() {
        let Some(obj) = node.as_object_mut() else {
            unreachable!("node declarations are always objects");
        };
        let Some(raw) = obj.get(spec.field).cloned() else {
            continue;
        };
        let rewritten = if spec.has_subproperties() {
            let pathdef = normalize_path_def(&raw)?;
            let mut entries: Vec<(String, String)> = Vec::with_capacity(pathdef.len());
            for (key, candidate) in pathdef {
                let resolved = resolve_or_hoist(
                    declared_names,
                    &owner,
                    &key,
                    &Value::String(candidate),
                    options,
                    synthetic,
                )?;
                entries.push((key, resolved));
            }
            path_field_value(node_type, spec.field, entries)
        } else {
            let resolved = resolve_or_hoist(declared_names, &owner, spec.field, &raw, options, synthetic)?;
            Value::String(resolved)
        };
        node.as_object_mut()
            .expect("node declarations are always objects")
            .insert(spec.field.to_string(), rewritten);
    }
    Ok(())
}

/// `nodeNames` is declared as a plain ordered list, not a pathDef mapping
/// (unlike `params`/`graph.inputs`) — rebuild the right JSON shape for the
/// field once its entries are resolved.
fn path_field_value(node_type: NodeType, field: &str, entries: Vec<(String, String)>) -> Value {
    if node_type == NodeType::Branch && field == "nodeNames" {
        Value::Array(entries.into_iter().map(|(_, v)| Value::String(v)).collect())
    } else {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        )
    }
}

fn resolve_or_hoist(
    declared_names: &BTreeSet<String>,
    owner: &str,
    field_key: &str,
    raw: &Value,
    options: &GraphOptions,
    synthetic: &mut Vec<Value>,
) -> DagResult<String> {
    if let Value::String(s) = raw {
        let (head, _) = split_node_path(s);
        if declared_names.contains(&head) {
            return Ok(s.clone());
        }
    }
    let synth_name = format!("#literal#{owner}#{field_key}");
    if options.log_literals {
        tracing::debug!(owner, field = field_key, value = %raw, "literal inference");
    }
    synthetic.push(serde_json::json!({
        "name": synth_name,
        "type": "static",
        "value": raw,
        "isHidden": true,
    }));
    Ok(synth_name)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

fn build_node_kind(decl: &Value) -> DagResult<(String, NodeKind, bool, Value)> {
    let obj = decl
        .as_object()
        .ok_or_else(|| DagError::Declaration("node declaration must be a mapping".into()))?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| DagError::Declaration("node declaration missing 'name'".into()))?
        .to_string();
    let type_str = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DagError::Declaration("node declaration missing 'type'".into()))?;
    let node_type = NodeType::parse(type_str)
        .ok_or_else(|| DagError::Declaration(format!("unknown node kind '{type_str}'")))?;

    let kind = build_kind(node_type, obj)?;
    let is_hidden = obj.get("isHidden").and_then(Value::as_bool).unwrap_or(false) || name.starts_with('#');

    Ok((name, kind, is_hidden, decl.clone()))
}

fn field_str(obj: &Map<String, Value>, field: &str) -> DagResult<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DagError::Declaration(format!("missing required field '{field}'")))
}

fn build_kind(node_type: NodeType, obj: &Map<String, Value>) -> DagResult<NodeKind> {
    Ok(match node_type {
        NodeType::Static => NodeKind::Static(StaticNode::new(
            obj.get("value")
                .cloned()
                .ok_or_else(|| DagError::Declaration("static node missing 'value'".into()))?,
        )),
        NodeType::Comments => {
            NodeKind::Comments(CommentsNode::new(obj.get("comments").cloned().unwrap_or(Value::Null)))
        }
        NodeType::Alias => NodeKind::Alias(AliasNode::new(field_str(obj, "mirror")?)),
        NodeType::Echo => NodeKind::Echo(EchoNode::new(
            obj.get("inputName").and_then(Value::as_str).map(str::to_string),
        )),
        NodeType::Dereference => NodeKind::Dereference(DereferenceNode::new(
            field_str(obj, "objectPath")?,
            field_str(obj, "propNamePath")?,
        )),
        NodeType::Transform => {
            let fn_name = field_str(obj, "fn")?;
            let params_obj = obj
                .get("params")
                .and_then(Value::as_object)
                .ok_or_else(|| DagError::Declaration("transform node missing 'params'".into()))?;
            let params: PathDef = params_obj
                .iter()
                .map(|(k, v)| {
                    v.as_str()
                        .map(|s| (k.clone(), s.to_string()))
                        .ok_or_else(|| DagError::Declaration(format!("params.{k} must be a path string")))
                })
                .collect::<DagResult<_>>()?;
            NodeKind::Transform(TransformNode::new(&fn_name, params)?)
        }
        NodeType::Inputs => NodeKind::Inputs(InputsNode::new()),
        NodeType::Async => NodeKind::Async(AsyncNode::new(field_str(obj, "promise")?)),
        NodeType::Branch => {
            let test = field_str(obj, "test")?;
            let cases = obj
                .get("cases")
                .and_then(Value::as_array)
                .ok_or_else(|| DagError::Declaration("branch node missing 'cases'".into()))?
                .clone();
            let node_names: Vec<String> = obj
                .get("nodeNames")
                .and_then(Value::as_array)
                .ok_or_else(|| DagError::Declaration("branch node missing 'nodeNames'".into()))?
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| DagError::Declaration("nodeNames entries must be strings".into()))
                })
                .collect::<DagResult<_>>()?;
            NodeKind::Branch(BranchNode::new(test, cases, node_names))
        }
        NodeType::Graph => {
            let is_template = obj.get("isTemplate").and_then(Value::as_bool).unwrap_or(false);
            let def_source = match obj.get("graphDef") {
                Some(Value::String(s)) => GraphDefSource::TemplateRef(s.clone()),
                Some(Value::Array(items)) => GraphDefSource::Literal(items.clone()),
                _ => {
                    return Err(DagError::Declaration(
                        "graph node 'graphDef' must be a string or a declaration array".into(),
                    ));
                }
            };
            let explicit_inputs = match obj.get("inputs") {
                Some(v) => Some(normalize_path_def(v)?),
                None => None,
            };
            let collection_mode = match obj.get("collectionMode").and_then(Value::as_str) {
                Some("map") => Some(CollectionMode::Map),
                Some(other) => {
                    return Err(DagError::Declaration(format!("unknown collectionMode '{other}'")));
                }
                None => None,
            };
            NodeKind::Graph(GraphNode::new(def_source, explicit_inputs, collection_mode, is_template))
        }
    })
}

// ---------------------------------------------------------------------------
// Edges (diagnostic only — spec §4.4 "Edges")
// ---------------------------------------------------------------------------

fn derive_edges(declarations: &[Value]) -> DagResult<Vec<Edge>> {
    let mut edges = Vec::new();
    for decl in declarations {
        let obj = decl.as_object().expect("validated in build_node");
        let src = obj.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let Some(type_str) = obj.get("type").and_then(Value::as_str) else {
            continue;
        };
        let Some(node_type) = NodeType::parse(type_str) else {
            continue;
        };
        for spec in node_type.path_fields() {
            let Some(raw) = obj.get(spec.field) else {
                continue;
            };
            if spec.has_subproperties() {
                match raw {
                    Value::Object(map) => {
                        for (key, v) in map {
                            if let Some(path) = v.as_str() {
                                push_edge(&mut edges, &src, key, path);
                            }
                        }
                    }
                    Value::Array(items) => {
                        for (i, v) in items.iter().enumerate() {
                            if let Some(path) = v.as_str() {
                                push_edge(&mut edges, &src, &i.to_string(), path);
                            }
                        }
                    }
                    _ => {}
                }
            } else if let Some(path) = raw.as_str() {
                push_edge(&mut edges, &src, spec.field, path);
            }
        }
    }
    Ok(edges)
}

fn push_edge(edges: &mut Vec<Edge>, src: &str, src_prop_name: &str, path: &str) {
    let (dst, dst_value_path) = split_node_path(path);
    edges.push(Edge {
        src_node_id: src.to_string(),
        src_prop_name: src_prop_name.to_string(),
        dst_node_id: dst,
        dst_value_path,
    });
}

/// Enumerate every path string found among a node declaration's
/// path-bearing fields, used for expected-input scanning (spec §4.4 `run`
/// step 1, and §4.5's implicit subgraph input discovery).
fn path_strings_of(decl: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let Some(obj) = decl.as_object() else {
        return out;
    };
    let Some(node_type) = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(NodeType::parse)
    else {
        return out;
    };
    for spec in node_type.path_fields() {
        let Some(raw) = obj.get(spec.field) else {
            continue;
        };
        match raw {
            Value::String(s) => out.push(s.clone()),
            Value::Array(items) => {
                out.extend(items.iter().filter_map(|v| v.as_str().map(str::to_string)));
            }
            Value::Object(map) => {
                out.extend(map.values().filter_map(|v| v.as_str().map(str::to_string)));
            }
            _ => {}
        }
    }
    out
}

const _: () = {
    // `DEFAULT_CASE` documents the shared convention with `BranchNode`;
    // referenced here only to keep the constant from looking dead to
    // tooling that doesn't cross module boundaries.
    let _ = DEFAULT_CASE;
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decl(nodes: Vec<Value>) -> Vec<Value> {
        nodes
    }

    #[tokio::test]
    async fn concat_and_multiply() {
        let graph = Graph::new(
            decl(vec![
                json!({"name": "staticNode", "type": "static", "value": "hello, "}),
                json!({"name": "aliasNode", "type": "alias", "mirror": "inputs.stringValue"}),
                json!({
                    "name": "concatExample",
                    "type": "transform",
                    "fn": "concat",
                    "params": {"staticNode": "staticNode", "inputs.stringValue": "inputs.stringValue"}
                }),
                json!({
                    "name": "multiplyExample",
                    "type": "transform",
                    "fn": "mult",
                    "params": {"amt": "inputs.numberValue", "factor": 3}
                }),
            ]),
            "root",
            GraphOptions::default(),
        )
        .unwrap();

        let mut inputs = std::collections::HashMap::new();
        inputs.insert("stringValue".to_string(), InputValue::Value(json!("world")));
        inputs.insert("numberValue".to_string(), InputValue::Value(json!(4)));

        let state = graph.run(inputs).await.unwrap();
        assert_eq!(state["staticNode"], json!("hello, "));
        assert_eq!(state["aliasNode"], json!("world"));
        assert_eq!(state["concatExample"], json!("hello, world"));
        assert_eq!(state["multiplyExample"], json!(12.0));
    }

    #[tokio::test]
    async fn dereference_missing_key_resolves_to_null() {
        let graph = Graph::new(
            decl(vec![
                json!({"name": "obj", "type": "static", "value": {"a": 1}}),
                json!({"name": "key", "type": "static", "value": "b"}),
                json!({"name": "lookup", "type": "dereference", "objectPath": "obj", "propNamePath": "key"}),
            ]),
            "root",
            GraphOptions::default(),
        )
        .unwrap();

        let state = graph.run(std::collections::HashMap::new()).await.unwrap();
        assert_eq!(state["lookup"], Value::Null);
    }

    #[tokio::test]
    async fn branch_with_default() {
        let graph = Graph::new(
            decl(vec![
                json!({"name": "nodeA", "type": "static", "value": "A"}),
                json!({"name": "nodeB", "type": "static", "value": "B"}),
                json!({"name": "nodeC", "type": "static", "value": "C"}),
                json!({
                    "name": "b",
                    "type": "branch",
                    "test": "inputs.mode",
                    "cases": ["a", "b", "_default_"],
                    "nodeNames": ["nodeA", "nodeB", "nodeC"],
                }),
            ]),
            "root",
            GraphOptions::default(),
        )
        .unwrap();

        let mut inputs = std::collections::HashMap::new();
        inputs.insert("mode".to_string(), InputValue::Value(json!("z")));
        let state = graph.run(inputs).await.unwrap();
        assert_eq!(state["b"], json!("C"));
    }

    #[tokio::test]
    async fn missing_input_fails() {
        let graph = Graph::new(
            decl(vec![json!({
                "name": "echoed",
                "type": "alias",
                "mirror": "inputs.x"
            })]),
            "root",
            GraphOptions::default(),
        )
        .unwrap();
        let err = graph.run(std::collections::HashMap::new()).await.unwrap_err();
        assert!(matches!(err, DagError::MissingInput(_)));
    }

    #[test]
    fn hidden_nodes_excluded_from_state() {
        let nodes = preprocess(
            vec![json!({
                "name": "t",
                "type": "transform",
                "fn": "mult",
                "params": {"amt": "inputs.x", "factor": 3}
            })],
            &GraphOptions::default(),
        )
        .unwrap();
        assert!(
            nodes
                .iter()
                .any(|n| n.get("name").and_then(Value::as_str) == Some("#literal#t#factor"))
        );
    }

    #[tokio::test]
    async fn wildcard_extraction_over_aliased_input() {
        let graph = Graph::new(
            decl(vec![
                json!({"name": "arr", "type": "alias", "mirror": "inputs.things"}),
                json!({
                    "name": "amounts",
                    "type": "transform",
                    "fn": "box",
                    "params": {"value": "arr.*.amount"}
                }),
            ]),
            "root",
            GraphOptions::default(),
        )
        .unwrap();

        let mut inputs = std::collections::HashMap::new();
        inputs.insert(
            "things".to_string(),
            InputValue::Value(json!([{"amount": 4}, {"amount": 2}])),
        );
        let state = graph.run(inputs).await.unwrap();
        assert_eq!(state["amounts"], json!([4, 2]));
    }

    #[tokio::test]
    async fn subgraph_map_instantiates_template_per_element() {
        let graph = Graph::new(
            decl(vec![
                json!({
                    "name": "mapItem",
                    "type": "graph",
                    "isTemplate": true,
                    "graphDef": [
                        {
                            "name": "foo",
                            "type": "transform",
                            "fn": "mult",
                            "params": {"amt": "inputs.item.bar", "factor": 5}
                        }
                    ]
                }),
                json!({
                    "name": "result",
                    "type": "graph",
                    "graphDef": "mapItem",
                    "collectionMode": "map",
                    "inputs": {"collection": "inputs.itemsToBeMapped"}
                }),
            ]),
            "root",
            GraphOptions::default(),
        )
        .unwrap();

        let mut inputs = std::collections::HashMap::new();
        inputs.insert(
            "itemsToBeMapped".to_string(),
            InputValue::Value(json!([{"bar": 2}, {"bar": 3}, {"bar": 5}])),
        );
        let state = graph.run(inputs).await.unwrap();
        assert_eq!(
            state["result"],
            json!([{"foo": 10.0}, {"foo": 15.0}, {"foo": 25.0}])
        );
    }
}
