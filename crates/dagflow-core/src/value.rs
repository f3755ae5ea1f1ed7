//! The "absent" sentinel and small helpers shared by the node kinds.
//!
//! A node's value is either a concrete [`serde_json::Value`] or the sentinel
//! "not yet available", modelled here as `None` rather than conflated with
//! JSON `null` (which is itself a perfectly good concrete value — see the
//! `dereference` node kind, which resolves to `null` on a missing property
//! instead of staying absent).
//!
//! JSON has no native `NaN`. Rather than smuggle a sentinel float through
//! `serde_json::Value`, transforms that would produce `NaN` (e.g. `0.0 / 0.0`
//! under `div`) return absent directly — this is the one place the
//! specification's "NaN at a leaf is also absent" rule is observable in a
//! JSON-valued engine.

use serde_json::Value;

/// A node's current value: `None` means "not yet available".
pub type Maybe = Option<Value>;

/// The resolved, non-absent `null` sentinel `dereference` falls back to.
#[must_use]
pub fn resolved_null() -> Value {
    Value::Null
}

/// True if every value in `values` is present (non-absent).
#[must_use]
pub fn all_present(values: &[Maybe]) -> bool {
    values.iter().all(Option::is_some)
}

/// Build a `serde_json::Number` from an `f64`, collapsing non-finite results
/// (NaN, ±Infinity) to `None` ("absent") per the NaN-as-absent rule.
#[must_use]
pub fn finite_number(f: f64) -> Maybe {
    serde_json::Number::from_f64(f).map(Value::Number)
}
