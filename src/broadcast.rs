//! Live update fan-out
//!
//! Process-wide registry of open push connections. Delivery is fire-and-forget,
//! at-most-once per currently registered client; nothing is replayed for late
//! or briefly-disconnected clients, and the registry starts empty on every
//! process restart.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One frame on the push channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Keep-alive comment, no event name
    Comment(String),
    /// Named event with serialized payload
    Event { name: String, data: String },
}

/// Registry of live push clients
#[derive(Clone, Default)]
pub struct Broadcaster {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    clients: HashMap<i64, UnboundedSender<Frame>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client and hand back its frame receiver
    ///
    /// A keep-alive comment is queued immediately so the connection carries
    /// traffic as soon as it opens. The caller is responsible for calling
    /// `deregister` when the connection closes (the SSE layer does this with a
    /// drop guard).
    pub fn register(&self) -> (i64, UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, this cannot fail
        let _ = tx.send(Frame::Comment("connected".to_string()));

        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.clients.insert(id, tx);

        tracing::debug!(client_id = id, total = inner.clients.len(), "Push client registered");
        (id, rx)
    }

    /// Remove a client; safe to call for an already-removed id
    pub fn deregister(&self, id: i64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.clients.remove(&id).is_some() {
            tracing::debug!(client_id = id, total = inner.clients.len(), "Push client removed");
        }
    }

    /// Send the identical frame to every registered client
    ///
    /// A failed write means the receiving side is gone; that client is pruned
    /// and delivery continues to the rest. Zero clients is a no-op.
    #[allow(dead_code)] // Not yet wired into the turn flow; exercised in tests
    pub fn broadcast(&self, event: &str, payload: &Value) {
        let frame = Frame::Event {
            name: event.to_string(),
            data: payload.to_string(),
        };

        let mut inner = self.inner.lock().unwrap();
        inner
            .clients
            .retain(|_, tx| tx.send(frame.clone()).is_ok());
    }

    /// Number of currently registered clients, for observability
    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().clients.len()
    }
}
