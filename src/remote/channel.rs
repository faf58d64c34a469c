use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::RemoteConfig;
use crate::types::{ChannelId, SessionToken};

use super::error::ApiError;

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    #[serde(rename = "channelId")]
    channel_id: ChannelId,
}

#[derive(Debug, Serialize)]
struct PollRequest<'a> {
    #[serde(rename = "channelId")]
    channel_id: &'a ChannelId,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    message: Option<String>,
}

/// Exchange a session token for the channel to long-poll.
#[instrument(skip_all, err)]
pub async fn bind(
    client: &Client,
    remote: &RemoteConfig,
    token: &SessionToken,
) -> Result<ChannelId, ApiError> {
    let response = client
        .post(super::endpoint(remote, "/api/channel/listener/connect"))
        .bearer_auth(token)
        .timeout(remote.request_timeout)
        .send()
        .await
        .map_err(ApiError::Network)?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::for_session(status, body));
    }

    let body: ConnectResponse = response.json().await.map_err(ApiError::Malformed)?;
    Ok(body.channel_id)
}

/// Issue one poll, held open by the server up to the configured wait bound.
///
/// Running out the wait bound is the expected idle outcome and maps to
/// `Ok(None)`, as does a reply without a pending message. Whatever message
/// the server hands back is returned verbatim; deciding whether it names a
/// known command happens at dispatch.
#[instrument(level = "debug", skip_all)]
pub async fn poll_once(
    client: &Client,
    remote: &RemoteConfig,
    token: &SessionToken,
    channel_id: &ChannelId,
) -> Result<Option<String>, ApiError> {
    let response = match client
        .post(super::endpoint(remote, "/api/channel/listener/poll"))
        .bearer_auth(token)
        .timeout(remote.poll_timeout)
        .json(&PollRequest { channel_id })
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) if err.is_timeout() => {
            debug!("poll timed out with no pending message");
            return Ok(None);
        }
        Err(err) => return Err(ApiError::Network(err)),
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::for_session(status, body));
    }

    let body: PollResponse = response.json().await.map_err(ApiError::Malformed)?;
    Ok(body.message)
}
