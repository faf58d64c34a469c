use reqwest::Url;
use std::time::Duration;

use crate::cli::Cli;
use crate::types::{Serial, SharedSecret};

/// Identity this device presents to the remote. Fixed for the process
/// lifetime.
#[derive(Clone, Debug)]
pub struct DeviceIdentity {
    pub serial: Serial,
    pub shared_secret: SharedSecret,
}

/// Remote API configuration
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub api_endpoint: Url,
    /// Bound on the handshake and channel binding requests.
    pub request_timeout: Duration,
    /// How long a single poll is held open waiting for a message.
    pub poll_timeout: Duration,
    /// Breather between poll cycles so a misbehaving server can't make us
    /// spin.
    pub pacing_delay: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub identity: DeviceIdentity,
    pub remote: RemoteConfig,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            identity: DeviceIdentity {
                serial: cli.serial,
                shared_secret: SharedSecret::from(cli.shared_secret),
            },
            remote: RemoteConfig {
                api_endpoint: cli.api_endpoint,
                request_timeout: cli.request_timeout,
                poll_timeout: cli.poll_timeout,
                pacing_delay: cli.pacing_delay,
            },
        }
    }
}
