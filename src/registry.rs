//! Per-channel interface instances and the registry that memoizes them.
//!
//! Every DM channel gets exactly one [`Interface`] carrying the pieces
//! of dispatch state that must survive across independent inbound
//! messages: the conversation lock and, while a conversation is
//! running, the inbox it reads from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use gavel_core::message::IncomingMessage;
use tokio::sync::mpsc;
use tracing::debug;

use crate::state::Role;

/// Dispatch state for one DM channel.
pub struct Interface {
    channel_id: String,
    user_id: String,
    role: Role,
    locked: AtomicBool,
    /// Where inbound messages go while a conversation owns the turn.
    inbox: Mutex<Option<mpsc::Sender<IncomingMessage>>>,
}

impl Interface {
    fn new(channel_id: &str, user_id: &str, role: Role) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            role,
            locked: AtomicBool::new(false),
            inbox: Mutex::new(None),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn set_inbox(&self, tx: mpsc::Sender<IncomingMessage>) {
        *self.inbox.lock().unwrap() = Some(tx);
    }

    pub fn clear_inbox(&self) {
        *self.inbox.lock().unwrap() = None;
    }

    /// Deliver an inbound message to the active conversation, if any.
    /// Returns false when no conversation is listening (the message is
    /// dropped, matching the locked-dispatch contract).
    pub async fn forward(&self, msg: IncomingMessage) -> bool {
        let tx = self.inbox.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(msg).await.is_ok(),
            None => {
                debug!("no conversation inbox on channel {}, message dropped", self.channel_id);
                false
            }
        }
    }
}

/// Memoizing registry: one [`Interface`] per channel id. Creation is
/// atomic per key; later calls return the existing instance and ignore
/// the constructor arguments.
#[derive(Default)]
pub struct InterfaceRegistry {
    interfaces: Mutex<HashMap<String, Arc<Interface>>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, channel_id: &str, user_id: &str, role: Role) -> Arc<Interface> {
        let mut map = self.interfaces.lock().unwrap();
        map.entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(Interface::new(channel_id, user_id, role)))
            .clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.interfaces.lock().unwrap().len()
    }
}
