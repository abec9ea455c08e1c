//! Discord gateway client: websocket session with identify/heartbeat
//! handshake, dispatching inbound events onto the shared mpsc channel.
//! Reconnects forever with doubling backoff until asked to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use gavel_core::config::DiscordConfig;
use gavel_core::error::GavelError;
use gavel_core::message::{Attachment, ClubEvent, GuildMember, IncomingMessage};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::types::{
    heartbeat_frame, identify_frame, GatewayFrame, Hello, MemberAddPayload, MessagePayload,
    OP_DISPATCH, OP_HEARTBEAT, OP_HEARTBEAT_ACK, OP_HELLO, OP_INVALID_SESSION, OP_RECONNECT,
};

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const RECONNECT_MAX_SECS: u64 = 60;

/// Run gateway sessions until the running flag clears. Each dropped
/// session emits [`ClubEvent::Disconnected`] and reconnects after a
/// backoff that doubles up to [`RECONNECT_MAX_SECS`].
pub(crate) async fn run_gateway(
    cfg: DiscordConfig,
    tx: mpsc::Sender<ClubEvent>,
    running: std::sync::Arc<AtomicBool>,
) {
    let mut backoff = 1u64;

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        match connect_and_read(&cfg, &tx, &running).await {
            Ok(()) => break,
            Err(e) => warn!("discord gateway session ended: {e}"),
        }
        if started.elapsed() > Duration::from_secs(RECONNECT_MAX_SECS) {
            backoff = 1;
        }

        if !running.load(Ordering::SeqCst) {
            break;
        }
        let _ = tx.send(ClubEvent::Disconnected).await;
        info!("discord gateway reconnecting in {backoff}s");
        tokio::time::sleep(Duration::from_secs(backoff)).await;
        backoff = (backoff * 2).min(RECONNECT_MAX_SECS);
    }

    info!("discord gateway stopped");
}

/// One gateway session: connect, wait for HELLO, identify, then pump
/// heartbeats and dispatches. Returns Ok only on a requested stop.
async fn connect_and_read(
    cfg: &DiscordConfig,
    tx: &mpsc::Sender<ClubEvent>,
    running: &AtomicBool,
) -> Result<(), GavelError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(GATEWAY_URL)
        .await
        .map_err(|e| GavelError::Channel(format!("discord gateway connect failed: {e}")))?;
    let (mut write, mut read) = ws_stream.split();
    debug!("discord gateway socket open");

    let mut seq: Option<u64> = None;
    let mut identified = false;
    // Placeholder cadence; replaced by the interval HELLO announces.
    let mut heartbeat = tokio::time::interval(Duration::from_secs(41));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if !running.load(Ordering::SeqCst) {
            let _ = write.send(WsMessage::Close(None)).await;
            return Ok(());
        }

        tokio::select! {
            _ = heartbeat.tick() => {
                if identified {
                    write
                        .send(WsMessage::Text(heartbeat_frame(seq).to_string()))
                        .await
                        .map_err(|e| {
                            GavelError::Channel(format!("discord heartbeat send failed: {e}"))
                        })?;
                }
            }
            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        return Err(GavelError::Channel(format!(
                            "discord gateway read error: {e}"
                        )));
                    }
                    None => {
                        return Err(GavelError::Channel(
                            "discord gateway stream ended".to_string(),
                        ));
                    }
                };

                match msg {
                    WsMessage::Text(text) => {
                        let frame: GatewayFrame = match serde_json::from_str(&text) {
                            Ok(f) => f,
                            Err(e) => {
                                debug!("unparsable gateway frame: {e}");
                                continue;
                            }
                        };
                        if let Some(s) = frame.s {
                            seq = Some(s);
                        }

                        match frame.op {
                            OP_HELLO => {
                                let hello: Hello = serde_json::from_value(frame.d)?;
                                heartbeat = tokio::time::interval(Duration::from_millis(
                                    hello.heartbeat_interval,
                                ));
                                heartbeat.set_missed_tick_behavior(
                                    tokio::time::MissedTickBehavior::Delay,
                                );
                                write
                                    .send(WsMessage::Text(
                                        identify_frame(&cfg.bot_token).to_string(),
                                    ))
                                    .await
                                    .map_err(|e| {
                                        GavelError::Channel(format!(
                                            "discord identify send failed: {e}"
                                        ))
                                    })?;
                                identified = true;
                            }
                            OP_HEARTBEAT => {
                                write
                                    .send(WsMessage::Text(heartbeat_frame(seq).to_string()))
                                    .await
                                    .map_err(|e| {
                                        GavelError::Channel(format!(
                                            "discord heartbeat send failed: {e}"
                                        ))
                                    })?;
                            }
                            OP_HEARTBEAT_ACK => {}
                            OP_RECONNECT => {
                                return Err(GavelError::Channel(
                                    "discord gateway requested reconnect".to_string(),
                                ));
                            }
                            OP_INVALID_SESSION => {
                                return Err(GavelError::Channel(
                                    "discord session invalidated".to_string(),
                                ));
                            }
                            OP_DISPATCH => handle_dispatch(frame, tx).await,
                            other => debug!("ignoring gateway opcode {other}"),
                        }
                    }
                    WsMessage::Ping(payload) => {
                        write
                            .send(WsMessage::Pong(payload))
                            .await
                            .map_err(|e| {
                                GavelError::Channel(format!("discord pong send failed: {e}"))
                            })?;
                    }
                    WsMessage::Close(_) => {
                        return Err(GavelError::Channel(
                            "discord gateway closed by server".to_string(),
                        ));
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Forward a DISPATCH frame as a [`ClubEvent`], ignoring event types
/// the bot does not react to.
async fn handle_dispatch(frame: GatewayFrame, tx: &mpsc::Sender<ClubEvent>) {
    match frame.t.as_deref() {
        Some("READY") => {
            info!("discord gateway ready");
            let _ = tx.send(ClubEvent::Connected).await;
        }
        Some("MESSAGE_CREATE") => match serde_json::from_value::<MessagePayload>(frame.d) {
            Ok(payload) => {
                let _ = tx.send(ClubEvent::MessageReceived(to_incoming(payload))).await;
            }
            Err(e) => debug!("bad MESSAGE_CREATE payload: {e}"),
        },
        Some("GUILD_MEMBER_ADD") => match serde_json::from_value::<MemberAddPayload>(frame.d) {
            Ok(payload) => {
                let member = GuildMember {
                    user_id: payload.user.id,
                    username: payload.user.username,
                    nick: payload.nick,
                    is_bot: payload.user.bot,
                };
                let _ = tx.send(ClubEvent::MemberJoined(member)).await;
            }
            Err(e) => debug!("bad GUILD_MEMBER_ADD payload: {e}"),
        },
        _ => {}
    }
}

/// Map a MESSAGE_CREATE payload to the platform-neutral message type.
/// A missing `guild_id` marks a direct message.
pub(crate) fn to_incoming(payload: MessagePayload) -> IncomingMessage {
    let timestamp = payload
        .timestamp
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    IncomingMessage {
        id: payload.id,
        channel_id: payload.channel_id,
        author_id: payload.author.id,
        author_name: payload.author.username,
        author_is_bot: payload.author.bot,
        is_direct: payload.guild_id.is_none(),
        text: payload.content,
        timestamp,
        attachments: payload
            .attachments
            .into_iter()
            .map(|a| Attachment {
                filename: a.filename,
                url: a.url,
                size: a.size,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> MessagePayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_to_incoming_marks_dm_without_guild() {
        let msg = to_incoming(payload(
            r#"{
                "id": "1", "channel_id": "2", "content": "hello",
                "author": {"id": "3", "username": "alice"},
                "timestamp": "2026-03-01T18:00:00+00:00"
            }"#,
        ));
        assert!(msg.is_direct);
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.author_name, "alice");
        assert_eq!(msg.timestamp.to_rfc3339(), "2026-03-01T18:00:00+00:00");
    }

    #[test]
    fn test_to_incoming_guild_message_not_direct() {
        let msg = to_incoming(payload(
            r#"{
                "id": "1", "channel_id": "2", "guild_id": "9", "content": "hi",
                "author": {"id": "3", "username": "bob", "bot": true}
            }"#,
        ));
        assert!(!msg.is_direct);
        assert!(msg.author_is_bot);
    }

    #[test]
    fn test_to_incoming_falls_back_to_now_on_bad_timestamp() {
        let before = Utc::now();
        let msg = to_incoming(payload(
            r#"{
                "id": "1", "channel_id": "2", "content": "x",
                "author": {"id": "3", "username": "carol"},
                "timestamp": "not-a-time"
            }"#,
        ));
        assert!(msg.timestamp >= before);
    }

    #[test]
    fn test_to_incoming_carries_attachments() {
        let msg = to_incoming(payload(
            r#"{
                "id": "1", "channel_id": "2", "content": "",
                "author": {"id": "3", "username": "dave"},
                "attachments": [
                    {"id": "10", "filename": "a.png", "url": "https://cdn/a.png", "size": 5},
                    {"id": "11", "filename": "b.png", "url": "https://cdn/b.png"}
                ]
            }"#,
        ));
        assert_eq!(msg.attachments.len(), 2);
        assert_eq!(msg.attachments[0].filename, "a.png");
        assert_eq!(msg.attachments[1].size, None);
    }
}
