use clap::Parser;
use clap::builder::BoolishValueParser;
use std::path::PathBuf;
use std::time::Duration;
use topiclens::config::parse_timeout;
use topiclens::{SettingsBuilder, TopicLens, info, telemetry};
use topiclens_http::start_server;

#[derive(Parser, Debug)]
#[command(
    name = "topiclens-server",
    version,
    author,
    about = "HTTP management API for a Kafka cluster"
)]
struct Args {
    /// Comma separated bootstrap broker addresses
    #[arg(long, env = "KAFKA_BROKERS")]
    brokers: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Base timeout for broker round trips (e.g. 500ms, 5s)
    #[arg(long, env = "KAFKA_TIMEOUT", value_parser = timeout_arg)]
    kafka_timeout: Option<Duration>,

    /// Read timeout for HTTP requests, also bounding TLS handshakes
    #[arg(long, env = "READ_TIMEOUT", value_parser = timeout_arg)]
    read_timeout: Option<Duration>,

    /// Write timeout for HTTP requests
    #[arg(long, env = "WRITE_TIMEOUT", value_parser = timeout_arg)]
    write_timeout: Option<Duration>,

    /// Serve HTTPS using --cert-file and --key-file
    #[arg(long, env = "ENABLE_TLS", value_parser = BoolishValueParser::new())]
    enable_tls: Option<bool>,

    /// PEM certificate chain
    #[arg(long, env = "CERT_FILE")]
    cert_file: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Deployment environment reported by /health
    #[arg(long, env = "ENVIRONMENT")]
    environment: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn timeout_arg(raw: &str) -> Result<Duration, String> {
    parse_timeout(raw).ok_or_else(|| format!("'{raw}' is not a non-zero duration such as 500ms or 5s"))
}

impl From<Args> for SettingsBuilder {
    fn from(args: Args) -> Self {
        SettingsBuilder {
            brokers: args.brokers,
            port: args.port,
            kafka_timeout: args.kafka_timeout,
            read_timeout: args.read_timeout,
            write_timeout: args.write_timeout,
            enable_tls: args.enable_tls.unwrap_or(false),
            cert_file: args.cert_file,
            key_file: args.key_file,
            environment: args.environment,
            log_level: args.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = SettingsBuilder::from(Args::parse()).build()?;

    telemetry::init(&settings.log_level);
    info!(
        "Connecting to brokers {} ({})",
        settings.brokers.join(","),
        settings.environment
    );

    let lens = TopicLens::connect(&settings)?;
    start_server(&settings, lens).await
}
