use std::collections::HashSet;

use tokio::sync::{mpsc, Mutex};

/// A frame queued for delivery to a connection task's own socket.
pub type OutboundFrame = Vec<String>;

/// Channel a connection task listens on for frames other workers want
/// delivered to it (PUB fan-out, replay on reconnect).
pub type Outbox = mpsc::Sender<OutboundFrame>;

/// One of the two fixed topics (or any other name the broker was seeded
/// with). `subscribers` holds subscriber client names.
///
/// The subscriber set is guarded by its own `Mutex` rather than sharing the
/// online/offline locks — see `broker-core::broker` for the lock order this
/// depends on.
pub struct Topic {
    pub name: String,
    pub(crate) subscribers: Mutex<HashSet<String>>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Topic {
            name: name.into(),
            subscribers: Mutex::new(HashSet::new()),
        }
    }
}

/// A client that disconnected while holding subscriptions, captured at the
/// moment it went offline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfflineClient {
    pub disconnect_time: u64,
    pub subscriptions: HashSet<String>,
}

/// A message that had at least one offline subscriber at publish time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedMessage {
    pub time: u64,
    pub sender: String,
    pub topic: String,
    pub payload: String,
}
