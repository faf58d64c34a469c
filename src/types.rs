use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

/// Serial number identifying this device to the remote.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Serial(String);

impl Deref for Serial {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Serial {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl From<String> for Serial {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Serial {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Key shared with the remote, used to sign challenges. The raw bytes are
/// deliberately kept out of `Debug` output.
#[derive(Clone)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

impl From<String> for SharedSecret {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<Vec<u8>> for SharedSecret {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// Bearer credential issued by the remote after a successful handshake.
///
/// The remote decides when it expires; we treat it as valid until a request
/// using it is rejected with an auth-class status.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl Deref for SessionToken {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Notification channel the remote assigns to a session token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChannelId(String);

impl Deref for ChannelId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ChannelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
