//! `branch`: select `nodeNames[i]` where `cases[i] == test`, else the index
//! of `'_default_'` in `cases`; read the selected node's value.
//!
//! Per spec §9b, some source variants call an array method on `cases` that
//! expects a predicate but pass it a literal; the contract implemented
//! here is the documented resolution: "index of the first element of
//! `cases` equal to `'_default_'`", never a predicate call.

use serde_json::Value;

use crate::error::DagError;
use crate::graph::{Graph, get_graph_value_at};
use crate::value::Maybe;

const DEFAULT_CASE: &str = "_default_";

pub struct BranchNode {
    pub test: String,
    pub cases: Vec<Value>,
    pub node_names: Vec<String>,
}

impl BranchNode {
    #[must_use]
    pub fn new(test: String, cases: Vec<Value>, node_names: Vec<String>) -> Self {
        Self {
            test,
            cases,
            node_names,
        }
    }

    pub fn value(&self, graph: &Graph) -> Result<Maybe, DagError> {
        let Some(test_value) = get_graph_value_at(graph, &self.test)? else {
            return Ok(None);
        };

        let selected = self
            .cases
            .iter()
            .position(|c| *c == test_value)
            .or_else(|| {
                self.cases
                    .iter()
                    .position(|c| c.as_str() == Some(DEFAULT_CASE))
            });

        let Some(index) = selected else {
            return Ok(None);
        };
        let Some(node_name) = self.node_names.get(index) else {
            return Ok(None);
        };
        get_graph_value_at(graph, node_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_first_matching_case_over_default() {
        let b = BranchNode::new(
            "t".into(),
            vec![json!("a"), json!("_default_")],
            vec!["nodeA".into(), "nodeC".into()],
        );
        let idx = b
            .cases
            .iter()
            .position(|c| *c == json!("a"))
            .unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn falls_back_to_default_index() {
        let b = BranchNode::new(
            "t".into(),
            vec![json!("a"), json!("b"), json!("_default_")],
            vec!["nodeA".into(), "nodeB".into(), "nodeC".into()],
        );
        let idx = b
            .cases
            .iter()
            .position(|c| *c == json!("z"))
            .or_else(|| b.cases.iter().position(|c| c.as_str() == Some("_default_")));
        assert_eq!(idx, Some(2));
        assert_eq!(b.node_names[idx.unwrap()], "nodeC");
    }
}
