//! Discord wire types: gateway frames and the REST payloads we touch.

use serde::Deserialize;
use serde_json::json;

// Gateway opcodes.
pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_RECONNECT: u8 = 7;
pub const OP_INVALID_SESSION: u8 = 9;
pub const OP_HELLO: u8 = 10;
pub const OP_HEARTBEAT_ACK: u8 = 11;

/// Intent bits: guilds, guild members, guild messages, direct messages,
/// message content.
pub const GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 1) | (1 << 9) | (1 << 12) | (1 << 15);

/// One frame received over the gateway socket.
#[derive(Debug, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: serde_json::Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

/// HELLO payload.
#[derive(Debug, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

/// IDENTIFY frame for our bot token.
pub fn identify_frame(token: &str) -> serde_json::Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": GATEWAY_INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "gavel",
                "device": "gavel"
            }
        }
    })
}

/// HEARTBEAT frame carrying the last seen sequence number.
pub fn heartbeat_frame(seq: Option<u64>) -> serde_json::Value {
    json!({ "op": OP_HEARTBEAT, "d": seq })
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPayload {
    pub id: String,
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// MESSAGE_CREATE dispatch payload. DMs carry no `guild_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub content: String,
    pub author: UserPayload,
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// GUILD_MEMBER_ADD dispatch payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberAddPayload {
    pub guild_id: String,
    pub user: UserPayload,
    #[serde(default)]
    pub nick: Option<String>,
}

/// An entry from `GET /guilds/{id}/members`.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildMemberPayload {
    pub user: Option<UserPayload>,
    #[serde(default)]
    pub nick: Option<String>,
}

/// An entry from `GET /guilds/{id}/channels`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelPayload {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Response to `POST /users/@me/channels`.
#[derive(Debug, Deserialize)]
pub struct DmChannelPayload {
    pub id: String,
}
