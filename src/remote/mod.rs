/*
This module is home to everything related to the control server that
commands the device we're running on.

It provides tools to perform the challenge handshake, bind the notification
channel and long-poll it for pending commands, surfacing failures as typed
errors so the supervisor can decide between re-authenticating and
terminating.
*/

mod auth;
mod channel;
mod error;

pub use auth::authenticate;
pub use channel::{bind, poll_once};
pub use error::ApiError;

use reqwest::Url;

use crate::config::RemoteConfig;

fn endpoint(remote: &RemoteConfig, path: &str) -> Url {
    let mut url = remote.api_endpoint.clone();
    url.set_path(path);
    url
}
