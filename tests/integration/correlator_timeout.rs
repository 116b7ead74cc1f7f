//! A waiter that never sees its matching ack fires empty once its 5 s
//! deadline elapses, and the process should treat that the same as a
//! rejected name — not hang forever.

use mqttc::correlator::Correlator;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn unmatched_waiter_times_out_after_five_seconds() {
    let correlator = Correlator::new();
    let rx = correlator.register("CONN_ACK").await;

    // Nothing ever arrives matching "CONN_ACK" — simulate the server
    // "intentionally delaying" past the waiter's deadline.
    tokio::time::advance(Duration::from_secs(6)).await;
    correlator.reap_expired().await;

    let result = rx.await.expect("reaper always fires the channel, never drops it");
    assert!(result.is_empty(), "a reaped waiter resolves with an empty frame");
}

#[tokio::test(start_paused = true)]
async fn waiter_well_within_deadline_is_not_reaped() {
    let correlator = Correlator::new();
    let rx = correlator.register("SUB_ACK").await;

    tokio::time::advance(Duration::from_secs(1)).await;
    correlator.reap_expired().await;

    assert!(rx.try_recv().is_err(), "a fresh waiter must not be reaped early");
}

/// next_timeout tracks the earliest pending waiter so a receive loop knows
/// how long it may safely block before it must wake up and reap.
#[tokio::test(start_paused = true)]
async fn next_timeout_shrinks_as_the_deadline_approaches() {
    let correlator = Correlator::new();
    let _rx = correlator.register("CONN_ACK").await;

    let initial = correlator.next_timeout().await;
    assert_eq!(initial, Duration::from_secs(5));

    tokio::time::advance(Duration::from_secs(3)).await;
    let remaining = correlator.next_timeout().await;
    assert_eq!(remaining, Duration::from_secs(2));
}
