use clap::{Arg, Command};
use mqttd::ServerConfig;
use tracing::error;

const MIN_PORT: u16 = 1024;

fn validate_port_value(value: &str) -> Result<u16, String> {
    let port: u16 = value.parse().map_err(|_| "invalid port number".to_owned())?;
    if port < MIN_PORT {
        return Err(format!("port must be in [{MIN_PORT}, 65535]"));
    }
    Ok(port)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("mqttd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Pub/sub message broker")
        .arg(
            Arg::new("port")
                .help("Port to listen for client connections on")
                .index(1)
                .value_parser(validate_port_value)
                .default_value("1883"),
        )
        .get_matches();

    let port = *matches.get_one::<u16>("port").expect("port has a default");

    if let Err(e) = mqttd::run(ServerConfig { port }).await {
        error!(error = %e, "mqttd exited with an error");
        std::process::exit(1);
    }
}
