mod actuator;
mod cli;
mod config;
mod remote;
mod supervisor;
mod types;
mod util;

use std::process::ExitCode;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::actuator::LogActuator;
use crate::config::Config;

fn initialize_tracing() {
    // Initialize tracing subscriber for human-readable logs. Defaults can
    // be overridden using RUST_LOG.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or(
                EnvFilter::default()
                    .add_directive("info".parse().unwrap())
                    .add_directive("hyper=error".parse().unwrap())
                    .add_directive("reqwest=warn".parse().unwrap()),
            ),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    initialize_tracing();

    let config = Config::from(cli::parse());
    info!("configuration loaded");
    debug!("{config:#?}");

    // Forward ctrl-c to the supervisor so it winds down between suspension
    // points instead of being killed mid-request.
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(());
            }
            Err(err) => {
                // Keep the sender alive; dropping it reads as a shutdown.
                warn!("failed to listen for interrupt: {err}");
                std::future::pending::<()>().await
            }
        }
    });

    let mut actuator = LogActuator;
    match supervisor::run(&config, &mut actuator, shutdown_rx).await {
        Ok(()) => {
            info!("shutting down");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("fatal: {err}");
            ExitCode::FAILURE
        }
    }
}
