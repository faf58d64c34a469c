/*
The supervisor owns the session lifecycle: authenticate, bind the
notification channel, then poll it until told to stop. It is the only place
that decides between re-authenticating and terminating, and the only owner
of the Session value.
*/

use reqwest::Client;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info, instrument, warn};

use crate::actuator::{self, Actuator};
use crate::config::Config;
use crate::remote::{self, ApiError};
use crate::types::{ChannelId, SessionToken};

/// Fatal session failures, reported once before the process exits.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("authentication failed: {0}")]
    Authentication(ApiError),

    #[error("channel binding failed: {0}")]
    Binding(ApiError),

    #[error("poll failed: {0}")]
    Poll(ApiError),
}

/// Credentials for one polling session.
///
/// Either both fields are valid or there is no session; re-authentication
/// builds a fresh value rather than patching this one in place.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: SessionToken,
    pub channel_id: ChannelId,
}

/// Authenticate and bind the notification channel.
#[instrument(skip_all, err)]
async fn handshake(client: &Client, config: &Config) -> Result<Session, FatalError> {
    let token = remote::authenticate(client, &config.remote, &config.identity)
        .await
        .map_err(FatalError::Authentication)?;
    let channel_id = remote::bind(client, &config.remote, &token)
        .await
        .map_err(FatalError::Binding)?;
    info!("authentication successful");

    Ok(Session { token, channel_id })
}

/// Run the session until a fatal failure or a shutdown signal.
///
/// A rejected token while polling triggers exactly one fresh handshake; a
/// handshake failure, first-time or not, is fatal. Shutdown is cooperative:
/// the signal is raced against every suspension point, so a pending long
/// poll never delays termination.
pub async fn run(
    config: &Config,
    actuator: &mut impl Actuator,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), FatalError> {
    let client = Client::new();

    'session: loop {
        let session = tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            res = handshake(&client, config) => res?,
        };
        debug!(
            token = %session.token,
            channel = %session.channel_id,
            "session established"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                res = remote::poll_once(
                    &client,
                    &config.remote,
                    &session.token,
                    &session.channel_id,
                ) => match res {
                    Ok(Some(command)) => actuator::dispatch(&command, actuator),
                    Ok(None) => {}
                    Err(err @ ApiError::Unauthorized(..)) => {
                        warn!("session rejected, re-authenticating: {err}");
                        continue 'session;
                    }
                    Err(err) => return Err(FatalError::Poll(err)),
                },
            }

            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                _ = time::sleep(config.remote.pacing_delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceIdentity, RemoteConfig};
    use crate::types::{Serial, SharedSecret};
    use crate::util::crypto::hmac_sha256_hex;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::json;
    use std::time::Duration;

    fn test_config(endpoint: &str) -> Config {
        Config {
            identity: DeviceIdentity {
                serial: Serial::from("sunshade-01"),
                shared_secret: SharedSecret::from("secretkey".to_string()),
            },
            remote: RemoteConfig {
                api_endpoint: endpoint.parse().unwrap(),
                request_timeout: Duration::from_secs(5),
                poll_timeout: Duration::from_secs(5),
                pacing_delay: Duration::from_millis(10),
            },
        }
    }

    /// Mock the full challenge handshake, serving `hits` passes through it.
    async fn mock_handshake(server: &mut ServerGuard, hits: usize) -> (Mock, Mock, Mock) {
        let challenge = server
            .mock("POST", "/api/deviceauth/challenge")
            .match_body(Matcher::Json(json!({"Serial": "sunshade-01"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"challenge": "abc123"}"#)
            .expect(hits)
            .create_async()
            .await;

        let signature = hmac_sha256_hex("secretkey", "abc123");
        let respond = server
            .mock("POST", "/api/deviceauth/respond")
            .match_body(Matcher::Json(json!({
                "Serial": "sunshade-01",
                "challengeResponse": signature,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "T1"}"#)
            .expect(hits)
            .create_async()
            .await;

        let connect = server
            .mock("POST", "/api/channel/listener/connect")
            .match_header("authorization", "Bearer T1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"channelId": "CH1"}"#)
            .expect(hits)
            .create_async()
            .await;

        (challenge, respond, connect)
    }

    #[derive(Default)]
    struct Recorder {
        angles: Vec<u8>,
    }

    impl Actuator for Recorder {
        fn set_angle(&mut self, angle: u8) {
            self.angles.push(angle);
        }
    }

    fn shutdown_after(delay: Duration) -> broadcast::Receiver<()> {
        let (tx, rx) = broadcast::channel(1);
        tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = tx.send(());
        });
        rx
    }

    #[tokio::test]
    async fn handshake_builds_complete_session() {
        let mut server = Server::new_async().await;
        let (challenge, respond, connect) = mock_handshake(&mut server, 1).await;

        let client = Client::new();
        let session = handshake(&client, &test_config(&server.url()))
            .await
            .unwrap();

        assert_eq!(*session.token, "T1");
        assert_eq!(*session.channel_id, "CH1");

        challenge.assert_async().await;
        respond.assert_async().await;
        connect.assert_async().await;
    }

    #[tokio::test]
    async fn binding_failure_is_fatal() {
        let mut server = Server::new_async().await;

        let _challenge = server
            .mock("POST", "/api/deviceauth/challenge")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"challenge": "abc123"}"#)
            .create_async()
            .await;
        let _respond = server
            .mock("POST", "/api/deviceauth/respond")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "T1"}"#)
            .create_async()
            .await;
        let connect = server
            .mock("POST", "/api/channel/listener/connect")
            .with_status(401)
            .with_body("nope")
            .create_async()
            .await;

        let client = Client::new();
        let err = handshake(&client, &test_config(&server.url()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FatalError::Binding(ApiError::Unauthorized(..))
        ));

        connect.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_poll_triggers_reauthentication() {
        let mut server = Server::new_async().await;
        let (challenge, respond, connect) = mock_handshake(&mut server, 2).await;

        // First poll is rejected with an auth-class status, everything
        // after the second handshake idles.
        let rejected = server
            .mock("POST", "/api/channel/listener/poll")
            .with_status(401)
            .with_body("token expired")
            .create_async()
            .await;
        let idle = server
            .mock("POST", "/api/channel/listener/poll")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .expect_at_least(1)
            .create_async()
            .await;

        let mut recorder = Recorder::default();
        let shutdown_rx = shutdown_after(Duration::from_millis(300));
        run(&test_config(&server.url()), &mut recorder, shutdown_rx)
            .await
            .unwrap();

        challenge.assert_async().await;
        respond.assert_async().await;
        connect.assert_async().await;
        rejected.assert_async().await;
        idle.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_while_polling_is_fatal() {
        let mut server = Server::new_async().await;
        let _handshake = mock_handshake(&mut server, 1).await;

        let poll = server
            .mock("POST", "/api/channel/listener/poll")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let mut recorder = Recorder::default();
        let (_tx, shutdown_rx) = broadcast::channel(1);
        let err = run(&test_config(&server.url()), &mut recorder, shutdown_rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FatalError::Poll(ApiError::Status(status, _)) if status.as_u16() == 500
        ));

        poll.assert_async().await;
    }

    #[tokio::test]
    async fn pending_command_is_dispatched_once() {
        let mut server = Server::new_async().await;
        let _handshake = mock_handshake(&mut server, 1).await;

        let command = server
            .mock("POST", "/api/channel/listener/poll")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "open"}"#)
            .create_async()
            .await;
        let _idle = server
            .mock("POST", "/api/channel/listener/poll")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .expect_at_least(1)
            .create_async()
            .await;

        let mut recorder = Recorder::default();
        let shutdown_rx = shutdown_after(Duration::from_millis(200));
        run(&test_config(&server.url()), &mut recorder, shutdown_rx)
            .await
            .unwrap();

        assert_eq!(recorder.angles, vec![crate::actuator::OPEN_ANGLE]);

        command.assert_async().await;
    }

    #[tokio::test]
    async fn shutdown_while_polling_is_clean() {
        let mut server = Server::new_async().await;
        let _handshake = mock_handshake(&mut server, 1).await;

        let _idle = server
            .mock("POST", "/api/channel/listener/poll")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .expect_at_least(1)
            .create_async()
            .await;

        let mut recorder = Recorder::default();
        let shutdown_rx = shutdown_after(Duration::from_millis(100));
        let result = run(&test_config(&server.url()), &mut recorder, shutdown_rx).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn shutdown_preempts_an_unreachable_remote() {
        // Nothing listens here; the shutdown signal must still win.
        let config = test_config("http://127.0.0.1:9");

        let (tx, shutdown_rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let mut recorder = Recorder::default();
        let result = run(&config, &mut recorder, shutdown_rx).await;

        assert!(result.is_ok());
    }
}
