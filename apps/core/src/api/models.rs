//! Typed views of Discord resources.
//!
//! Messages stay raw `serde_json::Value`s; only users, guilds and channels
//! get types because the selection menus need their names.

use serde::{Deserialize, Serialize};

/// The authenticated user (`users/@me`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "id")]
    pub uid: String,
    #[serde(rename = "username")]
    pub name: String,
}

/// A server the user is a member of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    #[serde(rename = "id")]
    pub uid: String,
    pub name: String,
}

/// Channel type codes used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Text channel in a guild (type 0)
    GuildText,
    /// 1:1 direct message (type 1)
    Dm,
    /// Anything else (voice, category, group DM, threads...)
    Other(u64),
}

impl From<u64> for ChannelKind {
    fn from(code: u64) -> Self {
        match code {
            0 => Self::GuildText,
            1 => Self::Dm,
            other => Self::Other(other),
        }
    }
}

/// A channel with a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub uid: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Recipient {
    username: String,
}

/// Channel record as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChannel {
    id: String,
    #[serde(rename = "type", default)]
    kind: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    recipients: Vec<Recipient>,
}

impl RawChannel {
    pub fn kind(&self) -> ChannelKind {
        ChannelKind::from(self.kind)
    }
}

impl From<RawChannel> for Channel {
    /// DM and group DM channels have no name, so they are named after
    /// their recipients.
    fn from(raw: RawChannel) -> Self {
        let name = match raw.name {
            Some(name) => name,
            None => raw
                .recipients
                .iter()
                .map(|r| r.username.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        };
        Self { uid: raw.id, name }
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawChannel::deserialize(deserializer).map(Channel::from)
    }
}
