//! `dereference`: `object[propName]` once both resolve.
//!
//! Unlike every other kind, a missing referenced node is a hard failure
//! here rather than silently absent (spec §4.3, §7) — `getGraphValueAt`'s
//! "missing ⇒ absent" protocol is deliberately *not* applied to the node
//! lookup itself, only to the value read once existence is confirmed.
//!
//! If both `objectPath` and `propNamePath` resolve but the property lookup
//! itself comes back absent, the node resolves to the non-absent sentinel
//! `null` — this is the one case in the engine where "not found" converts
//! to a resolved value instead of staying absent, so downstream nodes can
//! tell "still waiting" from "looked, wasn't there".

use serde_json::Value;

use crate::error::DagError;
use crate::graph::{Graph, get_graph_value_at};
use crate::path::{get_at_path, split_node_path};
use crate::value::{Maybe, resolved_null};

pub struct DereferenceNode {
    pub object_path: String,
    pub prop_name_path: String,
}

impl DereferenceNode {
    #[must_use]
    pub fn new(object_path: String, prop_name_path: String) -> Self {
        Self {
            object_path,
            prop_name_path,
        }
    }

    pub fn value(&self, graph: &Graph) -> Result<Maybe, DagError> {
        require_node_exists(graph, &self.object_path)?;
        require_node_exists(graph, &self.prop_name_path)?;

        let Some(object) = get_graph_value_at(graph, &self.object_path)? else {
            return Ok(None);
        };
        let Some(prop_name) = get_graph_value_at(graph, &self.prop_name_path)? else {
            return Ok(None);
        };
        let key = prop_name
            .as_str()
            .map(ToString::to_string)
            .unwrap_or_else(|| prop_name.to_string());

        Ok(Some(
            get_at_path(&object, &key).unwrap_or_else(resolved_null),
        ))
    }
}

fn require_node_exists(graph: &Graph, path: &str) -> Result<(), DagError> {
    let (node_id, _) = split_node_path(path);
    if graph.get_d_node(&node_id, false).is_some() {
        Ok(())
    } else {
        Err(DagError::Resolution(format!(
            "dereference: referenced node '{node_id}' does not exist"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_with_top_level_key_only() {
        // object is a bare value (no dotted suffix), key "b" is looked up directly.
        let obj = json!({"a": 1, "b": "two"});
        assert_eq!(get_at_path(&obj, "b"), Some(Value::String("two".into())));
    }

    #[test]
    fn missing_key_falls_back_to_null() {
        let obj = json!({"a": 1});
        assert_eq!(get_at_path(&obj, "missing").or(Some(Value::Null)), Some(Value::Null));
    }
}
