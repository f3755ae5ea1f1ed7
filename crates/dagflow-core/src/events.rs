//! The event surface (spec §4.6): `constructed`, `connected`, `stepped`,
//! `resolved`, `error`.
//!
//! The reference implementation exposes `on`/`once`/`off` against an
//! ad hoc emitter; the idiomatic Rust equivalent used here is a
//! `tokio::sync::broadcast` channel. `subscribe()` is `on`, a single
//! `recv()` against that receiver is `once`, and dropping the receiver is
//! `off`.

use serde_json::Value;
use tokio::sync::broadcast;

/// Lagged or closed subscribers simply miss events; 64 is generous for a
/// single evaluation run's event volume (one `stepped` per fixpoint pass).
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum Event {
    /// All nodes have been constructed.
    Constructed { graph: String },
    /// Edges have been derived and stored.
    Connected { graph: String },
    /// A non-terminal recomputation pass.
    Stepped {
        graph: String,
        state: Value,
        undefined_paths: Vec<String>,
    },
    /// The graph has reached fixpoint.
    Resolved { graph: String, state: Value },
    /// Evaluation failed; `run` will reject.
    Error { graph: String, message: String },
}

/// Per-graph event bus. Cloning shares the same underlying channel (cheap,
/// as `broadcast::Sender` is reference-counted).
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// `on`: subscribe to every future event on this bus.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Emit an event. No-op (per `broadcast` semantics) if nobody is
    /// currently subscribed.
    pub fn emit(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}
