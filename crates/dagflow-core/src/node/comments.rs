//! `comments`: a no-op at evaluation time. Its value is just the declared
//! `comments` field, echoed back — it exists so authors can leave an
//! annotation node in a declaration without it counting as a reference.

use serde_json::Value;

use crate::value::Maybe;

pub struct CommentsNode {
    comments: Value,
}

impl CommentsNode {
    #[must_use]
    pub fn new(comments: Value) -> Self {
        Self { comments }
    }

    #[must_use]
    pub fn value(&self) -> Maybe {
        Some(self.comments.clone())
    }
}
