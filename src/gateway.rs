//! The gateway: the main event loop connecting the platform channel to
//! command dispatch, member onboarding, and the club state.
//!
//! Every event is handled on its own task, so a slow conversation never
//! blocks the loop, and a handler error never takes the process down.

use std::sync::Arc;

use gavel_core::config::Config;
use gavel_core::message::{ClubEvent, GuildMember, IncomingMessage, OutgoingReply};
use gavel_core::traits::Channel;
use gavel_store::Store;
use tracing::{debug, info, warn};

use crate::commands::{self, CommandContext};
use crate::registry::InterfaceRegistry;
use crate::state::ClubState;

pub struct Gateway {
    channel: Arc<dyn Channel>,
    store: Store,
    state: Arc<ClubState>,
    registry: InterfaceRegistry,
    config: Config,
}

impl Gateway {
    pub fn new(channel: Arc<dyn Channel>, store: Store, config: Config) -> Self {
        let state = Arc::new(ClubState::new(config.club.clone()));
        Self {
            channel,
            store,
            state,
            registry: InterfaceRegistry::new(),
            config,
        }
    }

    /// Run the event loop until ctrl-c or the channel closes.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let mut rx = self.channel.start().await.map_err(|e| {
            anyhow::anyhow!("failed to start channel {}: {e}", self.channel.name())
        })?;
        info!(
            "gavel running | channel: {} | club: {}",
            self.channel.name(),
            self.config.club.name
        );

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        warn!("channel event stream closed");
                        break;
                    };
                    let gateway = self.clone();
                    tokio::spawn(async move {
                        gateway.handle_event(event).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal");
                    break;
                }
            }
        }

        self.channel.stop().await?;
        Ok(())
    }

    async fn handle_event(&self, event: ClubEvent) {
        match event {
            ClubEvent::Connected => {
                info!("channel connected, refreshing member cache");
                self.state.refresh_profiles(&self.store).await;
            }
            ClubEvent::Disconnected => {
                debug!("channel disconnected, reconnect in progress");
            }
            ClubEvent::MessageReceived(msg) => self.handle_message(msg).await,
            ClubEvent::MemberJoined(member) => self.handle_member_join(member).await,
        }
    }

    /// Only direct messages from humans are commands; everything else is
    /// ignored. A locked interface means a conversation owns the channel
    /// and gets the message instead of the router.
    async fn handle_message(&self, msg: IncomingMessage) {
        if msg.author_is_bot || !msg.is_direct {
            return;
        }

        let role = self.state.role_of(&msg.author_id);
        let interface = self
            .registry
            .get_or_create(&msg.channel_id, &msg.author_id, role);

        if interface.is_locked() {
            if !interface.forward(msg).await {
                debug!("conversation not receiving, message dropped");
            }
            return;
        }

        let ctx = CommandContext {
            state: &self.state,
            store: &self.store,
            channel: &self.channel,
            config: &self.config,
            interface: &interface,
        };
        commands::dispatch(&ctx, &msg).await;
    }

    /// Register the newcomer so preferences work immediately, then greet
    /// them by DM and in the welcome channel.
    async fn handle_member_join(&self, member: GuildMember) {
        if member.is_bot {
            return;
        }
        info!("member joined: {} ({})", member.username, member.user_id);

        if let Err(e) = self
            .store
            .upsert_member(&member.user_id, &member.username)
            .await
        {
            warn!("failed to register joining member {}: {e}", member.user_id);
        }

        if let Err(e) = self
            .channel
            .send(&OutgoingReply::to_user(
                &member.user_id,
                &self.config.club.welcome_message,
            ))
            .await
        {
            warn!("welcome DM to {} failed: {e}", member.user_id);
        }

        match self
            .channel
            .resolve_channel(&self.config.club.welcome_channel)
            .await
        {
            Ok(Some(channel_id)) => {
                let text = format!("{} has joined the party. Welcome!", member.display_name());
                if let Err(e) = self
                    .channel
                    .send(&OutgoingReply::to_channel(channel_id, text))
                    .await
                {
                    warn!("welcome post failed: {e}");
                }
            }
            Ok(None) => debug!(
                "welcome channel `{}` not found, skipping greeting",
                self.config.club.welcome_channel
            ),
            Err(e) => warn!("welcome channel lookup failed: {e}"),
        }
    }
}
