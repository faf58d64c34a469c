use clap::Parser;
use reqwest::Url;
use std::num::ParseIntError;
use std::time::Duration;

use crate::types::Serial;

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Serial identifying this device to the remote
    #[arg(env = "PARASOL_SERIAL", long = "serial", value_name = "serial")]
    pub serial: Serial,

    /// Pre-shared key for the challenge handshake
    #[arg(
        env = "PARASOL_SHARED_SECRET",
        long = "shared-secret",
        value_name = "key"
    )]
    pub shared_secret: String,

    /// Remote API endpoint URI
    #[arg(env = "PARASOL_API_ENDPOINT", long = "api-endpoint", value_name = "uri")]
    pub api_endpoint: Url,

    /// Long-poll wait bound in milliseconds
    #[arg(
        env = "PARASOL_POLL_TIMEOUT_MS",
        long = "poll-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "5000"
    )]
    pub poll_timeout: Duration,

    /// Delay between poll cycles in milliseconds
    #[arg(
        env = "PARASOL_PACING_DELAY_MS",
        long = "pacing-delay-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "1000"
    )]
    pub pacing_delay: Duration,

    /// Timeout for non-poll API requests in milliseconds
    #[arg(
        env = "PARASOL_REQUEST_TIMEOUT_MS",
        long = "request-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "10000"
    )]
    pub request_timeout: Duration,
}

pub fn parse() -> Cli {
    Parser::parse()
}
