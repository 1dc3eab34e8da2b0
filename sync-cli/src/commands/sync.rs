//! Follow the event stream and print events as they arrive.

use anyhow::{Context, Result};
use mxsync_client::{ClientConfig, DefaultSyncer, SyncClient};
use mxsync_types::{Event, RoomId};
use std::sync::Arc;

/// Options for the sync command.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Only print events of these types (all if empty).
    pub event_types: Vec<String>,
    /// Print one JSON object per line instead of a summary.
    pub json: bool,
    /// Do not print the initial snapshot.
    pub skip_initial: bool,
}

/// Run the sync command until Ctrl-C or a fatal error.
pub async fn run(mut config: ClientConfig, options: SyncOptions) -> Result<()> {
    let user_id = config.user_id.clone().context("Configuration has no user_id")?;
    config.sync.skip_initial_sync |= options.skip_initial;

    let syncer = Arc::new(DefaultSyncer::from_config(user_id.clone(), &config.sync));
    let json = options.json;
    if options.event_types.is_empty() {
        syncer.listeners().on_any_event(move |room, event| {
            println!("{}", render(room, event, json));
            Ok(())
        });
    } else {
        for event_type in options.event_types {
            syncer.listeners().on_event_type(event_type, move |room, event| {
                println!("{}", render(room, event, json));
                Ok(())
            });
        }
    }

    let client = Arc::new(SyncClient::from_config(config)?.with_syncer(syncer));
    println!("Syncing as {} (Ctrl-C to stop)...", user_id);

    let runner = Arc::clone(&client);
    let mut task = tokio::spawn(async move { runner.sync().await });

    tokio::select! {
        result = &mut task => {
            result.context("Sync task panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping after the current poll");
            client.stop_sync();
            task.await.context("Sync task panicked")??;
        }
    }

    Ok(())
}

/// Format one event for output.
fn render(room: Option<&RoomId>, event: &Event, json: bool) -> String {
    if json {
        return serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e));
    }

    let scope = room.map(RoomId::as_str).unwrap_or("*");
    let detail = event
        .content_str("body")
        .or_else(|| event.membership())
        .or_else(|| event.state_key.as_deref().filter(|key| !key.is_empty()))
        .unwrap_or("");
    format!("[{}] {} {} {}", scope, event.sender, event.event_type, detail)
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn content(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn render_message() {
        let event =
            Event::new("m.room.message", content(json!({"body": "hello"}))).with_sender("@u:hs");
        let room = RoomId::from("!r:hs");
        assert_eq!(
            render(Some(&room), &event, false),
            "[!r:hs] @u:hs m.room.message hello"
        );
    }

    #[test]
    fn render_membership_and_global() {
        let event = Event::new_state(
            "m.room.member",
            "@u:hs",
            content(json!({"membership": "join"})),
        )
        .with_sender("@u:hs");
        assert_eq!(render(None, &event, false), "[*] @u:hs m.room.member join");

        let presence = Event::new("m.presence", Map::new());
        assert_eq!(render(None, &presence, false), "[*]  m.presence");
    }

    #[test]
    fn render_json_line() {
        let event = Event::new("m.typing", Map::new());
        let line = render(None, &event, true);
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["type"], "m.typing");
    }
}
