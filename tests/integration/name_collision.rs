#[path = "support.rs"]
mod support;

use support::*;

/// A second connection CONNing under a name already held by a live
/// connection gets no reply, and the incumbent keeps the name.
#[tokio::test]
async fn conn_collision_from_a_different_connection_is_silently_ignored() {
    let addr = start_broker().await;

    let (mut a_sink, mut a_source) = connect(addr).await;
    send(&mut a_sink, vec![field("X"), field("CONN")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("CONN_ACK")]);

    let (mut b_sink, mut b_source) = connect(addr).await;
    send(&mut b_sink, vec![field("X"), field("CONN")]).await;
    assert_silent(&mut b_source).await;

    // A still owns X and can operate normally.
    send(&mut a_sink, vec![field("X"), field("SUB"), field("WEATHER")]).await;
    assert_eq!(recv(&mut a_source).await, vec![field("SUB_ACK")]);

    // B's own connection is unaffected; it can still CONN under a free name.
    send(&mut b_sink, vec![field("Y"), field("CONN")]).await;
    assert_eq!(recv(&mut b_source).await, vec![field("CONN_ACK")]);
}

/// A repeated CONN from the very connection that already owns a name is an
/// idempotent re-ack, not a collision.
#[tokio::test]
async fn conn_by_the_owning_connection_is_idempotent() {
    let addr = start_broker().await;
    let (mut sink, mut source) = connect(addr).await;

    send(&mut sink, vec![field("A"), field("CONN")]).await;
    assert_eq!(recv(&mut source).await, vec![field("CONN_ACK")]);

    send(&mut sink, vec![field("A"), field("CONN")]).await;
    assert_eq!(recv(&mut source).await, vec![field("CONN_ACK")]);
}
