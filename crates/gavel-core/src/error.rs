use thiserror::Error;

/// Top-level error type for Gavel.
#[derive(Debug, Error)]
pub enum GavelError {
    /// Error from the messaging platform (REST or gateway socket).
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Record store error.
    #[error("store error: {0}")]
    Store(String),

    /// Verb not found in the caller's command set. Recovered by the router
    /// with an "unrecognized command" reply plus usage.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A handler indexed past the provided arguments. Recovered by the
    /// router with an "insufficient arguments" reply plus usage.
    #[error("insufficient arguments")]
    InsufficientArguments,

    /// No reply arrived within a conversation's deadline.
    #[error("conversation timed out")]
    ConversationTimeout,

    /// The user typed the cancel token during a conversation.
    #[error("conversation cancelled")]
    ConversationCancelled,

    /// Shell execution error.
    #[error("shell error: {0}")]
    Shell(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
