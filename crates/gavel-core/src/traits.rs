use crate::{
    error::GavelError,
    message::{ClubEvent, GuildMember, OutgoingReply},
};
use async_trait::async_trait;

/// Messaging platform trait.
///
/// The Discord client implements this; tests substitute a mock. All
/// dispatch, conversation, and broadcast code talks to the platform
/// exclusively through this trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for platform events.
    /// Returns a receiver that yields events until the channel stops.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<ClubEvent>, GavelError>;

    /// Send one message. Errors are transport failures the caller must
    /// treat as reportable, never fatal.
    async fn send(&self, reply: &OutgoingReply) -> Result<(), GavelError>;

    /// Fetch the raw bytes of an inbound attachment.
    async fn fetch_attachment(&self, _url: &str) -> Result<Vec<u8>, GavelError> {
        Err(GavelError::Channel(
            "attachment fetch not supported".to_string(),
        ))
    }

    /// List the guild's members (broadcast audience).
    async fn list_members(&self) -> Result<Vec<GuildMember>, GavelError> {
        Err(GavelError::Channel(
            "member listing not supported".to_string(),
        ))
    }

    /// Resolve a guild channel name to its id.
    async fn resolve_channel(&self, _name: &str) -> Result<Option<String>, GavelError> {
        Ok(None)
    }

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), GavelError>;
}
