use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound message from the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Platform message id.
    pub id: String,
    /// Channel the message arrived on.
    pub channel_id: String,
    /// Platform user id of the author.
    pub author_id: String,
    /// Author's username.
    pub author_name: String,
    /// Whether the author is a bot account.
    pub author_is_bot: bool,
    /// True when the message arrived on a private (DM) channel.
    pub is_direct: bool,
    /// Raw text content.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
}

/// A file attached to an inbound message. Content is fetched on demand
/// through [`crate::traits::Channel::fetch_attachment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Where an outbound message goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendTarget {
    /// Direct message to a user (the channel resolves the DM channel).
    User(String),
    /// A specific channel id.
    Channel(String),
}

/// A simple rich embed (title + description is all we need).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
}

/// A file to attach to an outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingFile {
    /// Name shown to the recipient.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// An outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingReply {
    pub target: SendTarget,
    pub text: String,
    #[serde(default)]
    pub files: Vec<OutgoingFile>,
    #[serde(default)]
    pub embed: Option<Embed>,
}

impl OutgoingReply {
    pub fn to_user(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: SendTarget::User(user_id.into()),
            text: text.into(),
            files: Vec::new(),
            embed: None,
        }
    }

    pub fn to_channel(channel_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: SendTarget::Channel(channel_id.into()),
            text: text.into(),
            files: Vec::new(),
            embed: None,
        }
    }

    pub fn with_files(mut self, files: Vec<OutgoingFile>) -> Self {
        self.files = files;
        self
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }
}

/// A guild member, as listed by the platform or carried on a join event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildMember {
    pub user_id: String,
    pub username: String,
    /// Server nickname, when set.
    pub nick: Option<String>,
    pub is_bot: bool,
}

impl GuildMember {
    /// Nickname when set, username otherwise.
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.username)
    }
}

/// Events surfaced by a [`crate::traits::Channel`].
#[derive(Debug, Clone)]
pub enum ClubEvent {
    /// The platform connection is up and authenticated.
    Connected,
    /// The platform connection dropped; the channel reconnects on its own.
    Disconnected,
    MessageReceived(IncomingMessage),
    MemberJoined(GuildMember),
}
