//! `inputs`: the synthetic node every preprocessed graph gets exactly one
//! of. A mutable mapping; `set_value` writes a single key and the graph's
//! reactive driver re-checks completeness afterwards.

use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::value::Maybe;

pub struct InputsNode {
    values: Mutex<Map<String, Value>>,
}

impl Default for InputsNode {
    fn default() -> Self {
        Self::new()
    }
}

impl InputsNode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Mutex::new(Map::new()),
        }
    }

    pub fn set_value(&self, key: &str, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }

    #[must_use]
    pub fn value(&self) -> Maybe {
        Some(Value::Object(
            self.values.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        ))
    }
}
