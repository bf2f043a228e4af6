//! Discord REST API access.
//!
//! - `client`: authenticated GET with retries and rate-limit cooldowns
//! - `models`: users, guilds and channels
//! - `Discord`: listings built on top of the client, with `after`-cursor
//!   pagination for guilds and messages
//!
//! Calls are strictly sequential: one request in flight, pages fetched one
//! after another.

pub mod client;
#[doc(hidden)]
pub mod mock;
pub mod models;
pub mod transport;

pub use client::{ApiClient, ApiError};
pub use models::{Channel, ChannelKind, Guild, RawChannel, User};
pub use transport::{HttpResponse, HttpTransport, Sleeper, ThreadSleeper, Transport, TransportError};

use crate::config::Config;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Cursor sent with the first page.
pub const FIRST_CURSOR: &str = "0";

/// Which item of a page becomes the next `after` cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPosition {
    /// Ascending endpoints (guilds)
    Last,
    /// Endpoints returning each page newest-first (messages)
    First,
}

impl CursorPosition {
    fn pick(self, page: &[Value]) -> Option<&str> {
        let item = match self {
            Self::Last => page.last(),
            Self::First => page.first(),
        };
        item.and_then(|v| v.get("id")).and_then(Value::as_str)
    }
}

/// High-level Discord API used by the exporter.
pub struct Discord<T = HttpTransport, S = ThreadSleeper> {
    client: ApiClient<T, S>,
    page_limit: usize,
}

impl Discord {
    pub fn new(token: &str, config: &Config) -> Result<Self, TransportError> {
        Ok(Self::with_client(ApiClient::new(token, config)?, config))
    }
}

impl<T: Transport, S: Sleeper> Discord<T, S> {
    pub fn with_client(client: ApiClient<T, S>, config: &Config) -> Self {
        Self {
            client,
            page_limit: config.page_limit(),
        }
    }

    pub fn client(&self) -> &ApiClient<T, S> {
        &self.client
    }

    /// The authenticated user.
    pub fn me(&self) -> Option<User> {
        let value = self.client.get("users/@me", &[])?;
        decode_item(value, "users/@me")
    }

    /// Direct-message channels of the user.
    pub fn channels(&self) -> Vec<Channel> {
        self.list_channels("users/@me/channels", ChannelKind::Dm)
    }

    /// Text channels of a guild.
    pub fn guild_channels(&self, guild_id: &str) -> Vec<Channel> {
        self.list_channels(&format!("guilds/{}/channels", guild_id), ChannelKind::GuildText)
    }

    /// All guilds of the user, in server order.
    pub fn guilds(&self) -> Vec<Guild> {
        let endpoint = "users/@me/guilds";
        self.paginate(endpoint, CursorPosition::Last, |_| {})
            .into_iter()
            .filter_map(|value| decode_item(value, endpoint))
            .collect()
    }

    /// Full message history of a channel, as raw records.
    pub fn messages(&self, channel_id: &str) -> Vec<Value> {
        self.messages_with_progress(channel_id, |_| {})
    }

    /// Like [`Discord::messages`], reporting the running count after each page.
    pub fn messages_with_progress<F>(&self, channel_id: &str, on_page: F) -> Vec<Value>
    where
        F: FnMut(usize),
    {
        let endpoint = format!("channels/{}/messages", channel_id);
        self.paginate(&endpoint, CursorPosition::First, on_page)
    }

    /// These endpoints return the whole collection at once; only the
    /// wanted channel type is kept.
    fn list_channels(&self, endpoint: &str, kind: ChannelKind) -> Vec<Channel> {
        let Some(items) = self.client.get(endpoint, &[]).and_then(|v| into_page(v, endpoint)) else {
            return Vec::new();
        };

        items
            .into_iter()
            .filter_map(|value| decode_item::<RawChannel>(value, endpoint))
            .filter(|raw| raw.kind() == kind)
            .map(Channel::from)
            .collect()
    }

    /// Follow `after` cursors until the collection is exhausted.
    ///
    /// Stops on an empty page, a failed call, a short page or an item
    /// without an id. A page shorter than the limit is taken as the last
    /// one and no empty page is requested after it.
    fn paginate<F>(&self, endpoint: &str, cursor: CursorPosition, mut on_page: F) -> Vec<Value>
    where
        F: FnMut(usize),
    {
        let limit = self.page_limit.to_string();
        let mut after = FIRST_CURSOR.to_string();
        let mut items = Vec::new();

        loop {
            let params = [("limit", limit.as_str()), ("after", after.as_str())];
            let Some(page) = self
                .client
                .get(endpoint, &params)
                .and_then(|v| into_page(v, endpoint))
            else {
                break;
            };
            if page.is_empty() {
                break;
            }

            let full_page = page.len() >= self.page_limit;
            let next = cursor.pick(&page).map(str::to_string);
            items.extend(page);
            on_page(items.len());
            debug!("{}: {} items so far", endpoint, items.len());

            if !full_page {
                break;
            }
            match next {
                Some(id) => after = id,
                None => {
                    warn!("{}: page item without id, stopping", endpoint);
                    break;
                }
            }
        }

        items
    }
}

fn into_page(value: Value, endpoint: &str) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        other => {
            warn!("{}: expected a list, got {}", endpoint, other);
            None
        }
    }
}

fn decode_item<D: DeserializeOwned>(value: Value, endpoint: &str) -> Option<D> {
    match serde_json::from_value(value) {
        Ok(item) => Some(item),
        Err(e) => {
            warn!("{}: skipping malformed item: {}", endpoint, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{RecordingSleeper, ScriptedTransport};
    use serde_json::json;

    fn discord(transport: ScriptedTransport) -> Discord<ScriptedTransport, RecordingSleeper> {
        let config = Config::default();
        let client = ApiClient::with_transport("t", &config, transport, RecordingSleeper::new());
        Discord::with_client(client, &config)
    }

    fn ids(prefix: &str, range: std::ops::Range<usize>) -> Vec<Value> {
        range
            .map(|i| json!({"id": format!("{}{}", prefix, i), "name": format!("item {}", i)}))
            .collect()
    }

    #[test]
    fn test_me() {
        let api = discord(ScriptedTransport::new().respond_json(&json!({"id": "5", "username": "me"})));
        assert_eq!(
            api.me(),
            Some(User {
                uid: "5".to_string(),
                name: "me".to_string()
            })
        );
    }

    #[test]
    fn test_me_failure() {
        let api = discord(ScriptedTransport::new());
        assert_eq!(api.me(), None);
    }

    #[test]
    fn test_two_full_pages_then_empty() {
        let api = discord(
            ScriptedTransport::new()
                .respond_json(&Value::Array(ids("a", 0..100)))
                .respond_json(&Value::Array(ids("b", 0..100)))
                .respond_json(&json!([]))
                .respond_json(&Value::Array(ids("c", 0..1))),
        );

        let guilds = api.guilds();
        assert_eq!(guilds.len(), 200);
        assert_eq!(guilds[0].uid, "a0");
        assert_eq!(guilds[199].uid, "b99");
        assert_eq!(api.client().transport().call_count(), 3);
    }

    #[test]
    fn test_guild_cursor_uses_last_item() {
        let api = discord(
            ScriptedTransport::new()
                .respond_json(&Value::Array(ids("g", 0..100)))
                .respond_json(&json!([])),
        );
        api.guilds();

        let calls = api.client().transport().calls();
        assert_eq!(calls[0].param("after"), Some("0"));
        assert_eq!(calls[0].param("limit"), Some("100"));
        assert_eq!(calls[1].param("after"), Some("g99"));
    }

    #[test]
    fn test_message_cursor_uses_first_item() {
        let first_page: Vec<Value> = (0..100).rev().map(|i| json!({"id": format!("m{}", i)})).collect();
        let api = discord(
            ScriptedTransport::new()
                .respond_json(&Value::Array(first_page))
                .respond_json(&json!([{"id": "m100", "content": "latest"}])),
        );

        let messages = api.messages("123");
        assert_eq!(messages.len(), 101);
        assert_eq!(messages[0]["id"], "m99");
        assert_eq!(messages[100]["content"], "latest");

        let calls = api.client().transport().calls();
        assert!(calls[0].url.ends_with("channels/123/messages"));
        assert_eq!(calls[1].param("after"), Some("m99"));
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn test_short_page_ends_pagination() {
        let api = discord(
            ScriptedTransport::new()
                .respond_json(&Value::Array(ids("g", 0..2)))
                .respond_json(&Value::Array(ids("h", 0..1)))
                .respond_json(&json!([])),
        );

        let guilds = api.guilds();
        assert_eq!(guilds.len(), 2);
        assert_eq!(api.client().transport().call_count(), 1);
    }

    #[test]
    fn test_failed_page_ends_pagination() {
        let api = discord(ScriptedTransport::new().respond_json(&Value::Array(ids("g", 0..100))));
        // Second page fails four times in a row
        let guilds = api.guilds();
        assert_eq!(guilds.len(), 100);
        assert_eq!(api.client().transport().call_count(), 5);
    }

    #[test]
    fn test_progress_reports_running_total() {
        let api = discord(
            ScriptedTransport::new()
                .respond_json(&Value::Array(ids("m", 0..100)))
                .respond_json(&Value::Array(ids("n", 0..20))),
        );
        let mut counts = Vec::new();
        api.messages_with_progress("1", |n| counts.push(n));
        assert_eq!(counts, vec![100, 120]);
    }

    #[test]
    fn test_dm_channels_filtered() {
        let api = discord(ScriptedTransport::new().respond_json(&json!([
            {"id": "1", "type": 1, "recipients": [{"username": "alice"}]},
            {"id": "2", "type": 3, "name": null, "recipients": [{"username": "a"}, {"username": "b"}]},
            {"id": "3", "type": 1, "recipients": [{"username": "bob"}]}
        ])));

        let channels = api.channels();
        let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(api.client().transport().call_count(), 1);
    }

    #[test]
    fn test_guild_channels_keep_text_only() {
        let api = discord(ScriptedTransport::new().respond_json(&json!([
            {"id": "10", "type": 4, "name": "Category"},
            {"id": "11", "type": 0, "name": "general"},
            {"id": "12", "type": 2, "name": "Voice"},
            {"id": "13", "type": 0, "name": "random"}
        ])));

        let channels = api.guild_channels("99");
        assert_eq!(
            channels,
            vec![
                Channel {
                    uid: "11".to_string(),
                    name: "general".to_string()
                },
                Channel {
                    uid: "13".to_string(),
                    name: "random".to_string()
                },
            ]
        );
        assert!(api.client().transport().calls()[0]
            .url
            .ends_with("guilds/99/channels"));
    }

    #[test]
    fn test_channels_failure_is_empty() {
        let api = discord(ScriptedTransport::new());
        assert!(api.channels().is_empty());
        assert_eq!(api.client().transport().call_count(), 4);
    }

    #[test]
    fn test_non_list_response_is_empty() {
        let api = discord(ScriptedTransport::new().respond_json(&json!({"message": "401: Unauthorized"})));
        assert!(api.guilds().is_empty());
    }
}
