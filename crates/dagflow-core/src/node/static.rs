//! `static`: the literal, forever.

use serde_json::Value;

use crate::value::Maybe;

pub struct StaticNode {
    value: Value,
}

impl StaticNode {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    #[must_use]
    pub fn value(&self) -> Maybe {
        Some(self.value.clone())
    }
}
