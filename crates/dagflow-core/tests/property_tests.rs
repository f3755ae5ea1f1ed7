//! Property-based tests for path addressing and literal inference.
//!
//! These exercise the invariants spec.md §8 states directly: `flatten` and
//! `expand` are inverses modulo the dot-escape round-trip, and any
//! path-bearing field whose string does not name a declared node resolves
//! to a literal equal to the original string.

use dagflow_core::{Graph, GraphOptions, InputValue, flatten, expand};
use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::HashMap;

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9]{0,8}".prop_map(Value::String),
    ]
}

fn arb_tree() -> impl Strategy<Value = Value> {
    let leaf = arb_leaf();
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Array),
            vec(("[a-zA-Z][a-zA-Z0-9]{0,6}", inner), 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        ]
    })
}

proptest! {
    /// `expand` is the inverse of `flatten` on any tree `flatten` itself
    /// produced (spec.md §8).
    #[test]
    fn flatten_expand_roundtrip(tree in arb_tree()) {
        let flat = flatten(&tree, None);
        let rebuilt = expand(&flat, None);
        prop_assert_eq!(rebuilt, tree);
    }

    /// A literal string field (one that does not name any declared node)
    /// is hoisted into a synthetic static node carrying that exact value,
    /// and the owning node's field is rewritten to reference it —
    /// observable end-to-end as a `transform` node resolving to the
    /// literal factor used verbatim.
    #[test]
    fn literal_inference_preserves_value(factor in -1000i64..1000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(async {
            let graph = Graph::new(
                vec![json!({
                    "name": "t",
                    "type": "transform",
                    "fn": "mult",
                    "params": {"amt": "inputs.x", "factor": factor}
                })],
                "root",
                GraphOptions::default(),
            ).unwrap();

            let mut inputs = HashMap::new();
            inputs.insert("x".to_string(), InputValue::Value(json!(1)));
            graph.run(inputs).await.unwrap()
        });

        prop_assert_eq!(result["t"].as_f64().unwrap(), factor as f64);
    }
}
