//! Discord implementation of [`Channel`]: gateway websocket for inbound
//! events, REST for everything outbound.

mod gateway;
mod rest;
mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use gavel_core::config::DiscordConfig;
use gavel_core::error::GavelError;
use gavel_core::message::{ClubEvent, GuildMember, OutgoingReply, SendTarget};
use gavel_core::traits::Channel;
use tokio::sync::mpsc;
use tracing::info;

use rest::DiscordRest;

/// Buffer for the event channel between the gateway task and the bot loop.
const EVENT_BUFFER: usize = 128;

pub struct DiscordChannel {
    cfg: DiscordConfig,
    rest: Arc<DiscordRest>,
    running: Arc<AtomicBool>,
}

impl DiscordChannel {
    pub fn new(cfg: DiscordConfig) -> Self {
        let rest = Arc::new(DiscordRest::new(cfg.bot_token.clone()));
        Self {
            cfg,
            rest,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> Result<mpsc::Receiver<ClubEvent>, GavelError> {
        if self.cfg.bot_token.is_empty() {
            return Err(GavelError::Config(
                "discord bot_token is not set".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        self.running.store(true, Ordering::SeqCst);

        let cfg = self.cfg.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            gateway::run_gateway(cfg, tx, running).await;
        });

        info!("discord channel started");
        Ok(rx)
    }

    async fn send(&self, reply: &OutgoingReply) -> Result<(), GavelError> {
        let channel_id = match &reply.target {
            SendTarget::Channel(id) => id.clone(),
            SendTarget::User(user_id) => self.rest.ensure_dm(user_id).await?,
        };
        self.rest
            .create_message(&channel_id, &reply.text, &reply.files, reply.embed.as_ref())
            .await
    }

    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>, GavelError> {
        self.rest.download(url).await
    }

    async fn list_members(&self) -> Result<Vec<GuildMember>, GavelError> {
        let members = self.rest.guild_members(&self.cfg.guild_id).await?;
        Ok(members
            .into_iter()
            .filter_map(|m| {
                let nick = m.nick;
                m.user.map(|user| GuildMember {
                    user_id: user.id,
                    username: user.username,
                    nick,
                    is_bot: user.bot,
                })
            })
            .collect())
    }

    async fn resolve_channel(&self, name: &str) -> Result<Option<String>, GavelError> {
        self.rest.find_channel_id(&self.cfg.guild_id, name).await
    }

    async fn stop(&self) -> Result<(), GavelError> {
        self.running.store(false, Ordering::SeqCst);
        info!("discord channel stopped");
        Ok(())
    }
}
