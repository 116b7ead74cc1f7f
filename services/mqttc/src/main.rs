use clap::{Arg, Command};
use mqttc::ClientConfig;

fn validate_port_value(value: &str) -> Result<u16, String> {
    value.parse::<u16>().map_err(|_| "invalid port number".to_owned())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("mqttc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Interactive pub/sub client")
        .arg(
            Arg::new("host")
                .help("Broker host to connect to")
                .index(1)
                .default_value("localhost"),
        )
        .arg(
            Arg::new("port")
                .help("Broker port to connect to")
                .index(2)
                .value_parser(validate_port_value)
                .default_value("1883"),
        )
        .get_matches();

    let host = matches.get_one::<String>("host").expect("host has a default").clone();
    let port = *matches.get_one::<u16>("port").expect("port has a default");

    let exit_code = mqttc::run(ClientConfig { host, port }).await;
    std::process::exit(exit_code);
}
