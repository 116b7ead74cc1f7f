use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use broker_protocol::frames;

use crate::model::{OfflineClient, Outbox, OutboundFrame, QueuedMessage, Topic};

/// The two topics the worked examples in the specification publish to.
/// `Broker::new` is not limited to these, but `mqttd` seeds exactly this
/// set at startup — dynamic topic creation is out of scope.
pub const DEFAULT_TOPICS: [&str; 2] = ["WEATHER", "NEWS"];

/// Result of a `CONN` attempt.
pub enum ConnOutcome {
    /// The issuing connection already owns this name; re-ack, no state change.
    AlreadyOwned,
    /// A different online connection holds this name; no reply, no change.
    Ignored,
    /// The name was (re)claimed. `recovered_subscriptions` is whatever an
    /// offline record under this name carried, and `replay` is the queued
    /// messages that must be delivered before the `CONN_ACK`.
    Accepted {
        recovered_subscriptions: HashSet<String>,
        replay: Vec<QueuedMessage>,
    },
}

pub enum SubOutcome {
    TopicNotFound,
    Ack,
}

pub enum PubOutcome {
    TopicNotFound,
    NotSubscribed,
    Delivered,
}

/// All broker-side shared state: the online/offline registries, the fixed
/// topic table, and the global queued-message list, each behind the lock
/// the specification assigns it.
///
/// Lock order, enforced by every method below: `online` before `offline`
/// before a `Topic`'s subscriber set before `queue`. No method acquires two
/// of these out of that order; `handle_conn` in particular drops its
/// `online` guard before taking `offline`, matching the close path, which
/// only ever takes `offline` alone.
pub struct Broker {
    online: RwLock<HashMap<String, Outbox>>,
    offline: RwLock<HashMap<String, OfflineClient>>,
    topics: HashMap<String, Topic>,
    queue: Mutex<VecDeque<QueuedMessage>>,
}

impl Broker {
    pub fn new(topic_names: impl IntoIterator<Item = String>) -> Self {
        let topics = topic_names
            .into_iter()
            .map(|name| (name.clone(), Topic::new(name)))
            .collect();
        Broker {
            online: RwLock::new(HashMap::new()),
            offline: RwLock::new(HashMap::new()),
            topics,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_default_topics() -> Self {
        Broker::new(DEFAULT_TOPICS.iter().map(|t| (*t).to_owned()))
    }

    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    /// `CONN(name)`. `connection_id` identifies the calling connection (its
    /// own outbox channel — `Sender::same_channel` tells two connections
    /// apart without a separate id type). `previous_identity`, when the
    /// calling connection already held a different name, carries that name
    /// and its locally-tracked subscription set so it can be migrated
    /// offline before the new name takes effect.
    pub async fn handle_conn(
        &self,
        requested_name: &str,
        connection_id: &Outbox,
        previous_identity: Option<(String, HashSet<String>)>,
        now: u64,
    ) -> ConnOutcome {
        {
            let mut online = self.online.write().await;
            match online.get(requested_name) {
                Some(existing) if existing.same_channel(connection_id) => {
                    return ConnOutcome::AlreadyOwned;
                }
                Some(_) => return ConnOutcome::Ignored,
                None => {}
            }
            if let Some((old_name, _)) = &previous_identity {
                online.remove(old_name);
            }
            online.insert(requested_name.to_owned(), connection_id.clone());
        }

        if let Some((old_name, old_subs)) = previous_identity {
            self.offline.write().await.insert(
                old_name,
                OfflineClient {
                    disconnect_time: now,
                    subscriptions: old_subs,
                },
            );
        }

        let recovered = self.offline.write().await.remove(requested_name);

        let (recovered_subscriptions, replay) = match recovered {
            Some(entry) => {
                let queue = self.queue.lock().await;
                let replay: Vec<QueuedMessage> = queue
                    .iter()
                    .filter(|m| {
                        m.time >= entry.disconnect_time && entry.subscriptions.contains(&m.topic)
                    })
                    .cloned()
                    .collect();
                (entry.subscriptions, replay)
            }
            None => (HashSet::new(), Vec::new()),
        };

        self.sweep().await;

        ConnOutcome::Accepted {
            recovered_subscriptions,
            replay,
        }
    }

    /// `SUB(name, topic)`. Idempotent per `(name, topic)`.
    pub async fn handle_sub(&self, name: &str, topic: &str) -> SubOutcome {
        let Some(topic_obj) = self.topics.get(topic) else {
            return SubOutcome::TopicNotFound;
        };
        topic_obj.subscribers.lock().await.insert(name.to_owned());
        SubOutcome::Ack
    }

    /// `PUB(name, topic, payload)`. Not idempotent: every call that
    /// resolves to `Delivered` performs one fan-out and, if any offline
    /// client currently exists, appends one queued message.
    pub async fn handle_pub(
        &self,
        name: &str,
        topic: &str,
        payload: &str,
        now: u64,
    ) -> PubOutcome {
        let Some(topic_obj) = self.topics.get(topic) else {
            return PubOutcome::TopicNotFound;
        };

        let online = self.online.read().await;
        let subs = topic_obj.subscribers.lock().await;
        if !subs.contains(name) {
            return PubOutcome::NotSubscribed;
        }

        let frame: OutboundFrame = frames::publish(name, topic, payload);
        for subscriber_name in subs.iter() {
            if let Some(outbox) = online.get(subscriber_name) {
                // Best-effort: a full or closed outbox just means that
                // subscriber's task is on its way out; PUB never fails for it.
                let _ = outbox.send(frame.clone()).await;
            }
        }
        drop(subs);
        drop(online);

        if !self.offline.read().await.is_empty() {
            self.queue.lock().await.push_back(QueuedMessage {
                time: now,
                sender: name.to_owned(),
                topic: topic.to_owned(),
                payload: payload.to_owned(),
            });
        }

        PubOutcome::Delivered
    }

    /// Migrates a connection's identity to the offline registry. Called by
    /// the connection task's cleanup path (DISC, socket error, or EOF) iff
    /// the connection had successfully CONNed.
    pub async fn migrate_offline(&self, name: &str, subscribed_topics: HashSet<String>, now: u64) {
        self.online.write().await.remove(name);
        self.offline.write().await.insert(
            name.to_owned(),
            OfflineClient {
                disconnect_time: now,
                subscriptions: subscribed_topics,
            },
        );
        debug!(name, "connection migrated offline");
    }

    /// Drops queued messages no offline client can still need: retained
    /// while `time >= oldest offline disconnect_time`, dropped otherwise.
    /// Exactly one offline client with `disc_time == m.time` still counts
    /// as needing `m` — the boundary is inclusive.
    pub async fn sweep(&self) {
        let oldest = self
            .offline
            .read()
            .await
            .values()
            .map(|c| c.disconnect_time)
            .min();
        let mut queue = self.queue.lock().await;
        match oldest {
            Some(oldest_time) => queue.retain(|m| m.time >= oldest_time),
            None => queue.clear(),
        }
    }

    #[cfg(test)]
    pub(crate) async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_online(&self, name: &str) -> bool {
        self.online.read().await.contains_key(name)
    }

    #[cfg(test)]
    pub(crate) async fn is_offline(&self, name: &str) -> bool {
        self.offline.read().await.contains_key(name)
    }
}
