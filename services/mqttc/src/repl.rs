use std::sync::Arc;
use std::time::Duration;

use broker_protocol::{frames, Frame, FrameCodec};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::correlator::Correlator;

type Sink = SplitSink<Framed<TcpStream, FrameCodec>, Frame>;

const WAITER_TIMEOUT: Duration = Duration::from_secs(5);

/// Prompt for a name and CONN under it, retrying whenever the server
/// rejects or ignores the attempt, until one succeeds.
pub async fn negotiate_name(
    sink: &mut Sink,
    correlator: &Arc<Correlator>,
    stdin: &mut tokio::io::Lines<BufReader<Stdin>>,
) -> std::io::Result<String> {
    loop {
        print!("Enter your name: ");
        use std::io::Write;
        std::io::stdout().flush().ok();

        let Some(line) = stdin.next_line().await? else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stdin closed before a name was accepted",
            ));
        };
        let name = line.trim().to_owned();
        if name.is_empty() {
            continue;
        }
        if name.contains(',') {
            eprintln!("Name cannot contain ','.");
            continue;
        }

        let rx = correlator.register("CONN_ACK").await;
        if sink.send(frames::conn(&name)).await.is_err() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to send CONN",
            ));
        }

        match tokio::time::timeout(WAITER_TIMEOUT + Duration::from_millis(100), rx).await {
            Ok(Ok(reply)) if !reply.is_empty() => return Ok(name),
            _ => {
                println!("This name cannot be used. Pick another.");
            }
        }
    }
}

/// Run the SUB/PUB/DISC command loop until DISC, EOF, or a fatal send
/// error. Returns the process exit code.
pub async fn run_command_loop(
    mut sink: Sink,
    correlator: Arc<Correlator>,
    mut stdin: tokio::io::Lines<BufReader<Stdin>>,
    name: &str,
) -> i32 {
    loop {
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush().ok();

        let line = match stdin.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return 0, // EOF
            Err(e) => {
                eprintln!("stdin error: {e}");
                return 1;
            }
        };

        if line.contains(',') {
            eprintln!("Input cannot contain ',' — it would break framing.");
            continue;
        }

        let mut words = line.split_whitespace();
        match words.next() {
            Some("SUB") => {
                let Some(topic) = words.next() else {
                    eprintln!("usage: SUB <topic>");
                    continue;
                };
                let rx = correlator.register("SUB_ACK").await;
                if sink.send(frames::sub(name, topic)).await.is_err() {
                    eprintln!("connection lost");
                    return 1;
                }
                match tokio::time::timeout(WAITER_TIMEOUT + Duration::from_millis(100), rx).await {
                    Ok(Ok(reply)) if !reply.is_empty() => println!("subscribed to {topic}"),
                    _ => println!("subscribe failed or timed out"),
                }
            }
            Some("PUB") => {
                let Some(topic) = words.next() else {
                    eprintln!("usage: PUB <topic> <message words...>");
                    continue;
                };
                let payload: String = words.collect::<Vec<_>>().join(" ");
                if payload.is_empty() {
                    eprintln!("usage: PUB <topic> <message words...>");
                    continue;
                }
                if sink.send(frames::publish(name, topic, &payload)).await.is_err() {
                    eprintln!("connection lost");
                    return 1;
                }
            }
            Some("DISC") => {
                let rx = correlator.register("DISC_ACK").await;
                let _ = sink.send(frames::disc()).await;
                let _ = tokio::time::timeout(WAITER_TIMEOUT + Duration::from_millis(100), rx).await;
                return 0;
            }
            Some(other) => {
                eprintln!("unknown command: {other}");
            }
            None => {}
        }
    }
}
