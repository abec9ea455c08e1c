use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::GavelError;

/// Top-level Gavel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gavel: GavelConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub club: ClubConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub shell: ShellConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GavelConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GavelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Discord connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
    /// The club's guild (server) id.
    #[serde(default)]
    pub guild_id: String,
}

/// Club roles, channels, and conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubConfig {
    #[serde(default = "default_club_name")]
    pub name: String,
    /// User ids with admin commands.
    #[serde(default)]
    pub admins: Vec<String>,
    /// User ids with server-admin commands. The maintainer is always
    /// included.
    #[serde(default)]
    pub server_admins: Vec<String>,
    /// User id that receives error reports.
    #[serde(default)]
    pub maintainer: String,
    /// Channel receiving anonymous feedback.
    #[serde(default = "default_feedback_channel")]
    pub feedback_channel: String,
    /// Channel announcements are posted to.
    #[serde(default = "default_announcements_channel")]
    pub announcements_channel: String,
    /// Channel greeting new members. Missing channel is tolerated.
    #[serde(default = "default_welcome_channel")]
    pub welcome_channel: String,
    /// How long a conversation waits for a reply before timing out.
    #[serde(default = "default_conversation_timeout")]
    pub conversation_timeout_secs: u64,
    /// DM sent to members when they join the guild.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
}

impl Default for ClubConfig {
    fn default() -> Self {
        Self {
            name: default_club_name(),
            admins: Vec::new(),
            server_admins: Vec::new(),
            maintainer: String::new(),
            feedback_channel: default_feedback_channel(),
            announcements_channel: default_announcements_channel(),
            welcome_channel: default_welcome_channel(),
            conversation_timeout_secs: default_conversation_timeout(),
            welcome_message: default_welcome_message(),
        }
    }
}

/// Store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Shell runner config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Watchdog deadline in seconds.
    #[serde(default = "default_shell_timeout")]
    pub timeout_secs: u64,
    /// Deadline for commands known to run long (downloads, clones).
    #[serde(default = "default_shell_extended_timeout")]
    pub extended_timeout_secs: u64,
    #[serde(default = "default_extended_commands")]
    pub extended_commands: Vec<String>,
    /// Working directory for shell commands. Empty = inherit.
    #[serde(default)]
    pub workdir: String,
    /// Command run by `restart`.
    #[serde(default = "default_restart_command")]
    pub restart_command: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shell_timeout(),
            extended_timeout_secs: default_shell_extended_timeout(),
            extended_commands: default_extended_commands(),
            workdir: String::new(),
            restart_command: default_restart_command(),
        }
    }
}

// --- Default value functions ---

fn default_name() -> String {
    "Gavel".to_string()
}
fn default_data_dir() -> String {
    "~/.gavel".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_club_name() -> String {
    "the club".to_string()
}
fn default_feedback_channel() -> String {
    "feedback".to_string()
}
fn default_announcements_channel() -> String {
    "announcements".to_string()
}
fn default_welcome_channel() -> String {
    "new-members-welcome".to_string()
}
fn default_conversation_timeout() -> u64 {
    1800
}
fn default_welcome_message() -> String {
    "Welcome to the club! Please adhere to the rules pinned in the \
     `#announcements` channel.\nUse `#general` for general discussions \
     about programming as well as the club, `#help` when you are stuck on \
     a project or homework, and `#lounge` for everything else.\nSend me \
     any message and I will show you what I can do. So good luck, have \
     fun coding!"
        .to_string()
}
fn default_db_path() -> String {
    "~/.gavel/club.db".to_string()
}
fn default_shell_timeout() -> u64 {
    15
}
fn default_shell_extended_timeout() -> u64 {
    120
}
fn default_extended_commands() -> Vec<String> {
    vec![
        "aria2c".into(),
        "curl".into(),
        "wget".into(),
        "git".into(),
        "http".into(),
    ]
}
fn default_restart_command() -> String {
    "systemctl restart gavel".to_string()
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, GavelError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        return Ok(Config {
            gavel: GavelConfig::default(),
            discord: DiscordConfig::default(),
            club: ClubConfig::default(),
            store: StoreConfig::default(),
            shell: ShellConfig::default(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| GavelError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| GavelError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
