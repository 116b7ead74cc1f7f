//! Broker domain state and command handlers, independent of the socket and
//! framing layer that `broker-protocol` and `services/mqttd` provide.

mod broker;
mod model;

pub use broker::{Broker, ConnOutcome, PubOutcome, SubOutcome, DEFAULT_TOPICS};
pub use model::{OfflineClient, Outbox, OutboundFrame, QueuedMessage, Topic};
