//! Shared helpers for the binary's test modules: a throwaway store, a
//! canned config, and a channel mock that records outbound traffic.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use gavel_core::config::{ClubConfig, Config, StoreConfig};
use gavel_core::error::GavelError;
use gavel_core::message::{
    ClubEvent, GuildMember, IncomingMessage, OutgoingReply, SendTarget,
};
use gavel_core::traits::Channel;
use gavel_store::Store;
use tokio::sync::mpsc;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create a temporary on-disk store for testing (unique per call).
pub async fn test_store() -> Store {
    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir =
        std::env::temp_dir().join(format!("__gavel_test_{}_{}__", std::process::id(), id));
    let _ = std::fs::create_dir_all(&dir);
    let db_path = dir.join("test.db").to_string_lossy().to_string();
    let _ = std::fs::remove_file(&db_path);
    let config = StoreConfig { db_path };
    Store::new(&config).await.unwrap()
}

/// A config with short timeouts and fixed role lists.
pub fn test_config() -> Config {
    let mut config = Config {
        gavel: Default::default(),
        discord: Default::default(),
        club: ClubConfig {
            name: "CPU".to_string(),
            admins: vec!["admin-1".to_string()],
            server_admins: vec!["server-admin-1".to_string()],
            maintainer: "maintainer-1".to_string(),
            conversation_timeout_secs: 2,
            ..Default::default()
        },
        store: Default::default(),
        shell: Default::default(),
    };
    config.gavel.data_dir = std::env::temp_dir()
        .join(format!("__gavel_data_{}__", std::process::id()))
        .to_string_lossy()
        .to_string();
    config
}

/// Build an inbound DM.
pub fn incoming(channel_id: &str, author_id: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        id: "1".to_string(),
        channel_id: channel_id.to_string(),
        author_id: author_id.to_string(),
        author_name: format!("{author_id}-name"),
        author_is_bot: false,
        is_direct: true,
        text: text.to_string(),
        timestamp: Utc::now(),
        attachments: Vec::new(),
    }
}

pub fn member(user_id: &str, username: &str) -> GuildMember {
    GuildMember {
        user_id: user_id.to_string(),
        username: username.to_string(),
        nick: None,
        is_bot: false,
    }
}

/// Channel double: records every outbound reply, optionally failing
/// sends to selected targets, and lets tests inject inbound events.
#[derive(Default)]
pub struct MockChannel {
    pub sent: Mutex<Vec<OutgoingReply>>,
    fail_targets: Mutex<HashSet<String>>,
    members: Mutex<Vec<GuildMember>>,
    channels: Mutex<HashMap<String, String>>,
    attachments: Mutex<HashMap<String, Vec<u8>>>,
    event_tx: Mutex<Option<mpsc::Sender<ClubEvent>>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send addressed to this user or channel id fail.
    pub fn fail_target(&self, id: &str) {
        self.fail_targets.lock().unwrap().insert(id.to_string());
    }

    pub fn set_members(&self, members: Vec<GuildMember>) {
        *self.members.lock().unwrap() = members;
    }

    pub fn add_channel(&self, name: &str, id: &str) {
        self.channels.lock().unwrap().insert(name.to_string(), id.to_string());
    }

    pub fn add_attachment(&self, url: &str, bytes: Vec<u8>) {
        self.attachments.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|r| r.text.clone()).collect()
    }

    /// Replies whose target matches the given id (user or channel).
    pub fn sent_to(&self, id: &str) -> Vec<OutgoingReply> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|r| match &r.target {
                SendTarget::User(u) => u == id,
                SendTarget::Channel(c) => c == id,
            })
            .cloned()
            .collect()
    }

    /// Inject an inbound event, as the platform would.
    pub async fn inject(&self, event: ClubEvent) {
        let tx = self.event_tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(&self) -> Result<mpsc::Receiver<ClubEvent>, GavelError> {
        let (tx, rx) = mpsc::channel(64);
        *self.event_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn send(&self, reply: &OutgoingReply) -> Result<(), GavelError> {
        let target_id = match &reply.target {
            SendTarget::User(u) => u.clone(),
            SendTarget::Channel(c) => c.clone(),
        };
        if self.fail_targets.lock().unwrap().contains(&target_id) {
            return Err(GavelError::Channel(format!(
                "simulated send failure to {target_id}"
            )));
        }
        self.sent.lock().unwrap().push(reply.clone());
        Ok(())
    }

    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>, GavelError> {
        self.attachments
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| GavelError::Channel(format!("no such attachment: {url}")))
    }

    async fn list_members(&self) -> Result<Vec<GuildMember>, GavelError> {
        Ok(self.members.lock().unwrap().clone())
    }

    async fn resolve_channel(&self, name: &str) -> Result<Option<String>, GavelError> {
        Ok(self.channels.lock().unwrap().get(name).cloned())
    }

    async fn stop(&self) -> Result<(), GavelError> {
        *self.event_tx.lock().unwrap() = None;
        Ok(())
    }
}
