//! Interactive pub/sub client: negotiates a name, then runs a SUB/PUB/DISC
//! REPL over a single socket shared with an asynchronous receive worker.

pub mod correlator;
mod repl;

use std::sync::Arc;

use broker_protocol::FrameCodec;
use futures::StreamExt;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::net::{lookup_host, TcpStream};
use tokio_util::codec::Framed;
use tracing::{info, warn};

use correlator::Correlator;

pub struct ClientConfig {
    pub host: String,
    pub port: u16,
}

/// Resolve `host:port` and connect to the first address that accepts,
/// trying candidates in the order the resolver returned them.
async fn connect(host: &str, port: u16) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for addr in lookup_host((host, port)).await? {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
    }))
}

/// Connect, negotiate a name, run the command loop, and return the process
/// exit code.
pub async fn run(config: ClientConfig) -> i32 {
    let stream = match connect(&config.host, config.port).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("failed to connect to {}:{}: {e}", config.host, config.port);
            return 1;
        }
    };
    info!(host = %config.host, port = config.port, "connected");

    let framed = Framed::new(stream, FrameCodec);
    let (sink, mut source) = framed.split();

    let correlator = Arc::new(Correlator::new());

    let receiver_correlator = Arc::clone(&correlator);
    let receive_worker = tokio::spawn(async move {
        loop {
            receiver_correlator.reap_expired().await;
            let wait = receiver_correlator.next_timeout().await;
            match tokio::time::timeout(wait, source.next()).await {
                Ok(Some(Ok(frame))) => receiver_correlator.dispatch(frame).await,
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "transport error, receive worker exiting");
                    break;
                }
                Ok(None) => {
                    println!("server closed the connection");
                    break;
                }
                Err(_elapsed) => {} // woke to reap; loop back around
            }
        }
    });

    let mut stdin_lines = BufReader::new(stdin()).lines();
    let mut sink = sink;
    let name = match repl::negotiate_name(&mut sink, &correlator, &mut stdin_lines).await {
        Ok(name) => name,
        Err(e) => {
            eprintln!("could not establish a session: {e}");
            receive_worker.abort();
            return 1;
        }
    };

    let exit_code = repl::run_command_loop(sink, Arc::clone(&correlator), stdin_lines, &name).await;

    receive_worker.abort();
    exit_code
}
