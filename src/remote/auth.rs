use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{DeviceIdentity, RemoteConfig};
use crate::types::{Serial, SessionToken};
use crate::util::crypto::hmac_sha256_hex;

use super::error::ApiError;

#[derive(Debug, Serialize)]
struct ChallengeRequest<'a> {
    #[serde(rename = "Serial")]
    serial: &'a Serial,
}

#[derive(Debug, Deserialize)]
struct ChallengeResponse {
    challenge: String,
}

#[derive(Debug, Serialize)]
struct RespondRequest<'a> {
    #[serde(rename = "Serial")]
    serial: &'a Serial,
    #[serde(rename = "challengeResponse")]
    challenge_response: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: SessionToken,
}

/// Perform the challenge handshake and obtain a session token.
///
/// Requests a one-time challenge for our serial, signs it with the shared
/// secret and submits the signature. No retries happen here; that policy
/// belongs to the caller.
#[instrument(skip_all, err)]
pub async fn authenticate(
    client: &Client,
    remote: &RemoteConfig,
    identity: &DeviceIdentity,
) -> Result<SessionToken, ApiError> {
    let challenge = get_challenge(client, remote, identity).await?;
    debug!("received challenge");

    let signature = hmac_sha256_hex(identity.shared_secret.as_bytes(), &challenge);
    let token = submit_response(client, remote, identity, signature).await?;
    debug!("challenge accepted");

    Ok(token)
}

async fn get_challenge(
    client: &Client,
    remote: &RemoteConfig,
    identity: &DeviceIdentity,
) -> Result<String, ApiError> {
    let response = client
        .post(super::endpoint(remote, "/api/deviceauth/challenge"))
        .timeout(remote.request_timeout)
        .json(&ChallengeRequest {
            serial: &identity.serial,
        })
        .send()
        .await
        .map_err(ApiError::Network)?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status(status, body));
    }

    let body: ChallengeResponse = response.json().await.map_err(ApiError::Malformed)?;
    Ok(body.challenge)
}

async fn submit_response(
    client: &Client,
    remote: &RemoteConfig,
    identity: &DeviceIdentity,
    challenge_response: String,
) -> Result<SessionToken, ApiError> {
    let response = client
        .post(super::endpoint(remote, "/api/deviceauth/respond"))
        .timeout(remote.request_timeout)
        .json(&RespondRequest {
            serial: &identity.serial,
            challenge_response,
        })
        .send()
        .await
        .map_err(ApiError::Network)?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status(status, body));
    }

    let body: TokenResponse = response.json().await.map_err(ApiError::Malformed)?;
    Ok(body.token)
}
