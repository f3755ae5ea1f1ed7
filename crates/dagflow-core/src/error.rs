//! Error taxonomy for declaration, resolution and evaluation failures.
//!
//! All variants are fatal to the current `run` unless noted. `Dereference` is
//! the sole node kind that converts a "not found" lookup into the resolved
//! sentinel `null` rather than raising [`DagError::Resolution`].

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DagError {
    /// Unknown node kind, missing required field, name collision, or an
    /// input-name collision with a non-echo node.
    #[error("declaration error: {0}")]
    Declaration(String),

    /// `run` was called without a required top-level input.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// A subgraph could not find a node or pass-through input for an
    /// expected `inputs.*` reference.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Wildcard path with more than one `*`, wildcard applied to a
    /// non-sequence, or `setAtPath` traversing a missing intermediate.
    #[error("path error: {0}")]
    Path(String),

    /// A transform function failed, or `vectorOp`'s arguments mismatched.
    #[error("transform error: {0}")]
    Transform(String),

    /// No `stepped` event fired for the configured stall window while
    /// `resolved` has not been emitted.
    #[error("evaluation stalled after {0:?} with no progress")]
    Stall(Duration),

    /// Optional per-run timeout, surfaced distinctly from an indefinite
    /// stall so callers can tell "never moving" from "took too long".
    #[error("run timed out after {0:?}")]
    SyncRunTimeout(Duration),
}

pub type DagResult<T> = Result<T, DagError>;
