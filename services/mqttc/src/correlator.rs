//! Client-side request/response correlator.
//!
//! `CONN` and `SUB` are synchronous from the REPL's perspective, but their
//! acks arrive on the same socket as unsolicited `PUB` frames. A waiter
//! records what reply the REPL is expecting; the receive worker dispatches
//! every decoded frame to the first matching waiter, or prints it directly
//! if nothing matches.

use std::collections::VecDeque;
use std::time::Duration;

use broker_protocol::Frame;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

const DEFAULT_WAIT: Duration = Duration::from_secs(5);

struct Waiter {
    expected_token: String,
    argument_position: usize,
    expire_at: Instant,
    reply: oneshot::Sender<Vec<String>>,
}

/// Waiters are appended in insertion order and all share the same TTL, so
/// the list is already sorted by expiry — the head is always the next to
/// expire, and the reaper can stop at the first non-expired entry.
pub struct Correlator {
    waiters: Mutex<VecDeque<Waiter>>,
}

impl Correlator {
    pub fn new() -> Self {
        Correlator {
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// Register a new waiter for `expected_token` at frame position 0, with
    /// a 5 s absolute deadline. Returns a receiver that fires with the
    /// matched frame, or an empty vector if reaped before a match arrives.
    pub async fn register(&self, expected_token: impl Into<String>) -> oneshot::Receiver<Vec<String>> {
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter {
            expected_token: expected_token.into(),
            argument_position: 0,
            expire_at: Instant::now() + DEFAULT_WAIT,
            reply: tx,
        };
        self.waiters.lock().await.push_back(waiter);
        rx
    }

    /// Dispatch one decoded frame: match it against pending waiters in
    /// insertion order, firing the first that matches and consuming the
    /// frame. If nothing matches, print it: a 4-field `PUB` shape is shown
    /// as an unsolicited publication, anything else as a server error.
    pub async fn dispatch(&self, frame: Frame) {
        let mut waiters = self.waiters.lock().await;
        let matched_index = waiters.iter().position(|w| {
            w.argument_position < frame.len() && frame[w.argument_position] == w.expected_token
        });
        if let Some(index) = matched_index {
            let waiter = waiters.remove(index).expect("index just found by position()");
            let _ = waiter.reply.send(frame);
            return;
        }
        drop(waiters);

        if frame.len() == 4 && frame[1] == "PUB" {
            println!("[{}] {}: {}", frame[0], frame[2], frame[3]);
        } else {
            eprintln!("{}", frame.join(", "));
        }
    }

    /// Remove and fire every waiter whose deadline has passed, in order,
    /// stopping at the first non-expired one.
    pub async fn reap_expired(&self) {
        let now = Instant::now();
        let mut waiters = self.waiters.lock().await;
        while let Some(front) = waiters.front() {
            if front.expire_at > now {
                break;
            }
            let waiter = waiters.pop_front().expect("front() just confirmed Some");
            let _ = waiter.reply.send(Vec::new());
        }
    }

    /// How long the receive worker should block before its next forced
    /// wake-up: the earliest waiter's remaining time, or the default TTL
    /// when the list is empty.
    pub async fn next_timeout(&self) -> Duration {
        let now = Instant::now();
        match self.waiters.lock().await.front() {
            Some(front) => front.expire_at.saturating_duration_since(now),
            None => DEFAULT_WAIT,
        }
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
