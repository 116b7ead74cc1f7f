use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use broker_core::{Broker, ConnOutcome, PubOutcome, SubOutcome};
use broker_protocol::{frames, FrameCodec};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

const OUTBOX_CAPACITY: usize = 64;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_secs()
}

/// The decoded shape of an inbound frame. Dispatch reads the second field
/// for `CONN`/`SUB`/`PUB`, and the first field for `DISC`.
enum Command {
    Conn { name: String },
    Sub { name: String, topic: String },
    Pub { name: String, topic: String, payload: String },
    Disc,
    Malformed,
}

fn classify(frame: &[String]) -> Command {
    if frame.len() == 1 && frame[0] == "DISC" {
        return Command::Disc;
    }
    if frame.len() >= 2 && frame[1] == "CONN" {
        return Command::Conn {
            name: frame[0].clone(),
        };
    }
    if frame.len() >= 3 && frame[1] == "SUB" {
        return Command::Sub {
            name: frame[0].clone(),
            topic: frame[2].clone(),
        };
    }
    if frame.len() >= 4 && frame[1] == "PUB" {
        return Command::Pub {
            name: frame[0].clone(),
            topic: frame[2].clone(),
            payload: frame[3].clone(),
        };
    }
    Command::Malformed
}

/// Drive one accepted connection from `ACCEPTED` to `END`. Owns the socket
/// for its whole lifetime; everything it needs from shared state goes
/// through `broker`.
pub async fn handle_connection(stream: TcpStream, broker: Arc<Broker>) {
    let framed = Framed::new(stream, FrameCodec);
    let (mut sink, mut source) = framed.split();

    let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut name: Option<String> = None;
    let mut subscribed_topics: HashSet<String> = HashSet::new();

    while let Some(decoded) = source.next().await {
        let frame = match decoded {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "transport error, closing connection");
                break;
            }
        };

        match classify(&frame) {
            Command::Conn { name: requested } => {
                let previous_identity = name
                    .clone()
                    .map(|old_name| (old_name, subscribed_topics.clone()));
                let outcome = broker
                    .handle_conn(&requested, &tx, previous_identity, now_secs())
                    .await;
                match outcome {
                    ConnOutcome::AlreadyOwned => {
                        let _ = tx.send(frames::conn_ack()).await;
                    }
                    ConnOutcome::Ignored => {
                        debug!(name = %requested, "CONN ignored: name already owned elsewhere");
                    }
                    ConnOutcome::Accepted {
                        recovered_subscriptions,
                        replay,
                    } => {
                        name = Some(requested);
                        subscribed_topics = recovered_subscriptions;
                        for message in replay {
                            let _ = tx
                                .send(frames::publish(&message.sender, &message.topic, &message.payload))
                                .await;
                        }
                        let _ = tx.send(frames::conn_ack()).await;
                    }
                }
            }
            Command::Sub {
                name: acting_name,
                topic,
            } => match broker.handle_sub(&acting_name, &topic).await {
                SubOutcome::TopicNotFound => {
                    let _ = tx.send(frames::sub_failed_not_found()).await;
                }
                SubOutcome::Ack => {
                    if name.as_deref() == Some(acting_name.as_str()) {
                        subscribed_topics.insert(topic);
                    }
                    let _ = tx.send(frames::sub_ack()).await;
                }
            },
            Command::Pub {
                name: acting_name,
                topic,
                payload,
            } => match broker
                .handle_pub(&acting_name, &topic, &payload, now_secs())
                .await
            {
                PubOutcome::TopicNotFound => {
                    let _ = tx.send(frames::subject_not_found()).await;
                }
                PubOutcome::NotSubscribed => {
                    let _ = tx.send(frames::not_subscribed()).await;
                }
                PubOutcome::Delivered => {}
            },
            Command::Disc => {
                let _ = tx.send(frames::disc_ack()).await;
                break;
            }
            Command::Malformed => {
                debug!(?frame, "dropping malformed or unrecognized frame");
            }
        }
    }

    if let Some(name) = name {
        broker.migrate_offline(&name, subscribed_topics, now_secs()).await;
    }

    drop(tx);
    let _ = writer.await;
}
