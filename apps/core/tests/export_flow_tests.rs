//! Integration tests for the API side: pagination, rate limits and the
//! full token -> guild -> channel -> messages -> file flow.

use std::time::Duration;

use anyhow::Result;
use discord_export_core::api::mock::{RecordingSleeper, ScriptedTransport};
use discord_export_core::{export, ApiClient, Config, Discord};
use serde_json::{json, Value};
use tempfile::TempDir;

fn discord(transport: ScriptedTransport) -> Discord<ScriptedTransport, RecordingSleeper> {
    let config = Config::default();
    let client = ApiClient::with_transport("user-token", &config, transport, RecordingSleeper::new());
    Discord::with_client(client, &config)
}

fn guild_page(range: std::ops::Range<usize>) -> Value {
    Value::Array(
        range
            .map(|i| json!({"id": format!("{}", 1000 + i), "name": format!("Guild {}", i)}))
            .collect(),
    )
}

#[test]
fn test_150_guilds_in_two_calls() {
    let api = discord(
        ScriptedTransport::new()
            .respond_json(&guild_page(0..100))
            .respond_json(&guild_page(100..150)),
    );

    let guilds = api.guilds();
    assert_eq!(guilds.len(), 150);
    for (i, guild) in guilds.iter().enumerate() {
        assert_eq!(guild.name, format!("Guild {}", i));
    }

    let calls = api.client().transport().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].param("after"), Some("1099"));
}

#[test]
fn test_rate_limited_page_is_retried_after_cooldown() {
    let api = discord(
        ScriptedTransport::new()
            .respond(429, r#"{"message": "You are being rate limited.", "retry_after": 2, "global": false}"#)
            .respond_json(&guild_page(0..3)),
    );

    assert_eq!(api.guilds().len(), 3);

    let sleeps = api.client().sleeper().sleeps();
    assert_eq!(sleeps.len(), 1);
    assert!(sleeps[0] >= Duration::from_secs(3));

    let calls = api.client().transport().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

#[test]
fn test_unreachable_api_degrades_to_empty() {
    let api = discord(ScriptedTransport::new());
    assert!(api.guilds().is_empty());
    assert_eq!(api.client().transport().call_count(), 4);
}

#[test]
fn test_guild_channel_export() -> Result<()> {
    let newest_first: Vec<Value> = (0..100)
        .rev()
        .map(|i| json!({"id": format!("{}", 5000 + i), "content": format!("msg {}", i)}))
        .collect();

    let api = discord(
        ScriptedTransport::new()
            .respond_json(&json!({"id": "1", "username": "exporter"}))
            .respond_json(&guild_page(0..2))
            .respond_json(&json!([
                {"id": "70", "type": 0, "name": "general"},
                {"id": "71", "type": 2, "name": "Lounge"}
            ]))
            .respond_json(&Value::Array(newest_first))
            .respond_json(&json!([{"id": "5100", "content": "msg 100"}])),
    );

    let me = api.me().expect("user");
    assert_eq!(me.name, "exporter");

    let guilds = api.guilds();
    assert_eq!(guilds.len(), 2);

    let channels = api.guild_channels(&guilds[0].uid);
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name, "general");

    let messages = api.messages(&channels[0].uid);
    assert_eq!(messages.len(), 101);

    let calls = api.client().transport().calls();
    assert!(calls[2].url.ends_with("guilds/1000/channels"));
    assert!(calls[3].url.ends_with("channels/70/messages"));
    assert_eq!(calls[4].param("after"), Some("5099"));
    assert!(calls.iter().all(|c| c.token == "user-token"));

    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("70.json");
    export::write_messages(&path, &messages)?;
    let written: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(written, messages);
    Ok(())
}
