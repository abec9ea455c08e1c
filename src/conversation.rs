//! Conversation sessions: a scoped dispatch lock plus prompt/reply
//! plumbing for multi-step command flows.
//!
//! While a session is alive its interface is locked, so top-level
//! command routing on that channel returns nothing. Inbound messages
//! are delivered to the session instead, but only while a `recv` is
//! actually pending; anything sent in between is dropped, exactly as
//! top-level commands are while locked.

use std::time::Duration;

use gavel_core::chunk::{chunk_fenced, chunk_plain};
use gavel_core::error::GavelError;
use gavel_core::message::{IncomingMessage, OutgoingFile, OutgoingReply};
use gavel_core::traits::Channel;
use tokio::sync::mpsc;

use crate::registry::Interface;

/// Typing this as a whole message cancels the current prompt.
pub const CANCEL_TOKEN: &str = "cancel";

pub struct Conversation<'a> {
    interface: &'a Interface,
    channel: &'a dyn Channel,
    timeout: Duration,
}

impl<'a> Conversation<'a> {
    /// Lock the interface and open a session. The lock is released when
    /// the session is dropped, on every exit path.
    pub fn begin(interface: &'a Interface, channel: &'a dyn Channel, timeout: Duration) -> Self {
        interface.lock();
        Self {
            interface,
            channel,
            timeout,
        }
    }

    /// Send text to the session's channel, chunked to the platform limit.
    pub async fn send(&self, text: &str) -> Result<(), GavelError> {
        self.send_with_files(text, Vec::new()).await
    }

    /// Send text wrapped in code fences.
    pub async fn send_fenced(&self, text: &str) -> Result<(), GavelError> {
        for piece in chunk_fenced(text) {
            self.deliver(OutgoingReply::to_channel(self.interface.channel_id(), piece))
                .await?;
        }
        Ok(())
    }

    /// Send text with file attachments; the files ride on the first chunk.
    pub async fn send_with_files(
        &self,
        text: &str,
        files: Vec<OutgoingFile>,
    ) -> Result<(), GavelError> {
        let mut files = Some(files);
        for piece in chunk_plain(text) {
            let mut reply = OutgoingReply::to_channel(self.interface.channel_id(), piece);
            if let Some(f) = files.take() {
                if !f.is_empty() {
                    reply = reply.with_files(f);
                }
            }
            self.deliver(reply).await?;
        }
        Ok(())
    }

    async fn deliver(&self, reply: OutgoingReply) -> Result<(), GavelError> {
        self.channel.send(&reply).await
    }

    /// Wait for the next inbound message on this channel. The inbox is
    /// registered only for the duration of the wait.
    pub async fn recv(&self) -> Result<IncomingMessage, GavelError> {
        let (tx, mut rx) = mpsc::channel(1);
        self.interface.set_inbox(tx);
        let result = tokio::time::timeout(self.timeout, rx.recv()).await;
        self.interface.clear_inbox();

        match result {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(GavelError::Channel("conversation inbox closed".to_string())),
            Err(_) => Err(GavelError::ConversationTimeout),
        }
    }

    /// Like [`recv`], but the cancel token becomes a distinct error.
    pub async fn recv_text(&self) -> Result<IncomingMessage, GavelError> {
        let msg = self.recv().await?;
        if msg.text == CANCEL_TOKEN {
            return Err(GavelError::ConversationCancelled);
        }
        Ok(msg)
    }
}

impl Drop for Conversation<'_> {
    fn drop(&mut self) {
        self.interface.clear_inbox();
        self.interface.unlock();
    }
}
