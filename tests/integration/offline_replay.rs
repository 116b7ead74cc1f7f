#[path = "support.rs"]
mod support;

use std::time::Duration;
use support::*;

/// A disconnected subscriber receives everything published while it was
/// offline on reconnect, and a later reconnect cycle with no intervening
/// PUB does not redeliver the same message.
#[tokio::test]
async fn offline_subscriber_is_replayed_once_on_reconnect() {
    let addr = start_broker().await;

    let (mut a_sink, mut a_source) = connect(addr).await;
    send(&mut a_sink, vec![field("A"), field("CONN")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("CONN_ACK")]);
    send(&mut a_sink, vec![field("A"), field("SUB"), field("WEATHER")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("SUB_ACK")]);

    let (mut b_sink, mut b_source) = connect(addr).await;
    send(&mut b_sink, vec![field("B"), field("CONN")]).await;
    assert_eq!(recv(&mut b_source).await, vec![field("CONN_ACK")]);
    send(&mut b_sink, vec![field("B"), field("SUB"), field("WEATHER")]).await;
    assert_eq!(recv(&mut b_source).await, vec![field("SUB_ACK")]);

    // A disconnects.
    send(&mut a_sink, vec![field("DISC")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("DISC_ACK")]);
    drop(a_sink);
    drop(a_source);

    // Give the server a moment to run its offline-migration cleanup.
    tokio::time::sleep(Duration::from_millis(50)).await;

    // B publishes while A is offline: the message must be queued for A.
    send(
        &mut b_sink,
        vec![field("B"), field("PUB"), field("WEATHER"), field("storm")],
    )
    .await;
    assert_eq!(
        recv(&mut b_source).await,
        vec![field("B"), field("PUB"), field("WEATHER"), field("storm")]
    );

    // A reconnects: replay must include the queued message (order of
    // replay vs. CONN_ACK is unspecified, so accept either).
    let (mut a_sink, mut a_source) = connect(addr).await;
    send(&mut a_sink, vec![field("A"), field("CONN")]).await;

    let mut saw_replay = false;
    let mut saw_ack = false;
    for _ in 0..2 {
        let frame = recv(&mut a_source).await;
        if frame == vec![field("B"), field("PUB"), field("WEATHER"), field("storm")] {
            saw_replay = true;
        } else if frame == vec![field("CONN_ACK")] {
            saw_ack = true;
        }
    }
    assert!(saw_replay, "reconnecting client must receive the queued message");
    assert!(saw_ack, "reconnecting client must receive CONN_ACK");

    // Disconnect and reconnect again with no intervening PUB — the swept
    // message must not reappear.
    send(&mut a_sink, vec![field("DISC")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("DISC_ACK")]);
    drop(a_sink);
    drop(a_source);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (mut a_sink, mut a_source) = connect(addr).await;
    send(&mut a_sink, vec![field("A"), field("CONN")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("CONN_ACK")]);
    assert_silent(&mut a_source).await;
}

/// Messages published strictly before a subscriber went offline are never
/// queued for it, even once it does go offline.
#[tokio::test]
async fn replay_excludes_messages_from_before_the_subscriber_disconnected() {
    let addr = start_broker().await;

    let (mut a_sink, mut a_source) = connect(addr).await;
    send(&mut a_sink, vec![field("A"), field("CONN")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("CONN_ACK")]);
    send(&mut a_sink, vec![field("A"), field("SUB"), field("WEATHER")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("SUB_ACK")]);

    let (mut b_sink, mut b_source) = connect(addr).await;
    send(&mut b_sink, vec![field("B"), field("CONN")]).await;
    assert_eq!(recv(&mut b_source).await, vec![field("CONN_ACK")]);
    send(&mut b_sink, vec![field("B"), field("SUB"), field("WEATHER")]).await;
    assert_eq!(recv(&mut b_source).await, vec![field("SUB_ACK")]);

    // Published while A is still online: A gets it directly, it must never
    // be queued for later replay.
    send(
        &mut b_sink,
        vec![field("B"), field("PUB"), field("WEATHER"), field("before")],
    )
    .await;
    assert_eq!(
        recv(&mut a_source).await,
        vec![field("B"), field("PUB"), field("WEATHER"), field("before")]
    );
    assert_eq!(
        recv(&mut b_source).await,
        vec![field("B"), field("PUB"), field("WEATHER"), field("before")]
    );

    send(&mut a_sink, vec![field("DISC")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("DISC_ACK")]);
    drop(a_sink);
    drop(a_source);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (mut a_sink, mut a_source) = connect(addr).await;
    send(&mut a_sink, vec![field("A"), field("CONN")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("CONN_ACK")]);
    assert_silent(&mut a_source).await;
}
