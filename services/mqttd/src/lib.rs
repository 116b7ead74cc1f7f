//! Broker daemon: binds a TCP listener and spawns one worker per accepted
//! connection, dispatching decoded frames into a shared [`broker_core::Broker`].

mod connection;

use std::sync::Arc;

use broker_core::Broker;
use tokio::net::TcpListener;
use tracing::{error, info};

pub use connection::handle_connection;

pub struct ServerConfig {
    pub port: u16,
}

/// Bind the listener and run the accept loop forever. Each accepted socket
/// gets its own task; the broker itself outlives every connection.
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let local_port = listener.local_addr()?.port();
    info!(port = local_port, "mqttd listening");

    let broker = Arc::new(Broker::with_default_topics());

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                info!(%peer_addr, "connection accepted");
                let broker = Arc::clone(&broker);
                tokio::spawn(async move {
                    connection::handle_connection(stream, broker).await;
                    info!(%peer_addr, "connection closed");
                });
            }
            Err(e) => {
                error!(error = %e, "accept failed");
            }
        }
    }
}
