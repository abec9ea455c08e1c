//! Discord REST client. Covers the handful of endpoints the bot needs:
//! sending messages (with attachments), opening DM channels, listing
//! guild members and channels, and downloading attachment content.

use std::collections::HashMap;
use std::sync::Mutex;

use gavel_core::error::GavelError;
use gavel_core::message::{Embed, OutgoingFile};
use serde_json::json;

use super::types::{ChannelPayload, DmChannelPayload, GuildMemberPayload};

const API_BASE: &str = "https://discord.com/api/v10";

/// Page size for member listing; the API maximum.
const MEMBERS_PAGE_LIMIT: usize = 1000;

pub(crate) struct DiscordRest {
    token: String,
    client: reqwest::Client,
    /// user id -> DM channel id, so repeat sends skip the channel-open call.
    dm_cache: Mutex<HashMap<String, String>>,
}

impl DiscordRest {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: reqwest::Client::new(),
            dm_cache: Mutex::new(HashMap::new()),
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Post a message to a channel. Files go as multipart attachments,
    /// plain text and embeds as a JSON body.
    pub(crate) async fn create_message(
        &self,
        channel_id: &str,
        text: &str,
        files: &[OutgoingFile],
        embed: Option<&Embed>,
    ) -> Result<(), GavelError> {
        let url = format!("{API_BASE}/channels/{channel_id}/messages");

        let mut payload = json!({ "content": text });
        if let Some(embed) = embed {
            payload["embeds"] = json!([{
                "title": embed.title,
                "description": embed.description,
            }]);
        }

        let request = self.client.post(&url).header("Authorization", self.auth());
        let response = if files.is_empty() {
            request.json(&payload)
        } else {
            payload["attachments"] = files
                .iter()
                .enumerate()
                .map(|(i, f)| json!({ "id": i, "filename": f.filename }))
                .collect();

            let mut form =
                reqwest::multipart::Form::new().text("payload_json", payload.to_string());
            for (i, file) in files.iter().enumerate() {
                let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                    .file_name(file.filename.clone());
                form = form.part(format!("files[{i}]"), part);
            }
            request.multipart(form)
        }
        .send()
        .await
        .map_err(|e| GavelError::Channel(format!("discord create message failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GavelError::Channel(format!(
                "discord create message error {status}: {body}"
            )));
        }

        Ok(())
    }

    /// Open (or look up) the DM channel for a user and return its id.
    pub(crate) async fn ensure_dm(&self, user_id: &str) -> Result<String, GavelError> {
        {
            let cache = self.dm_cache.lock().unwrap();
            if let Some(id) = cache.get(user_id) {
                return Ok(id.clone());
            }
        }

        let url = format!("{API_BASE}/users/@me/channels");
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth())
            .json(&json!({ "recipient_id": user_id }))
            .send()
            .await
            .map_err(|e| GavelError::Channel(format!("discord open DM failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GavelError::Channel(format!(
                "discord open DM error {status}: {body}"
            )));
        }

        let dm: DmChannelPayload = response
            .json()
            .await
            .map_err(|e| GavelError::Channel(format!("discord DM response parse failed: {e}")))?;

        let mut cache = self.dm_cache.lock().unwrap();
        cache.insert(user_id.to_string(), dm.id.clone());
        Ok(dm.id)
    }

    /// List every member of a guild, following pagination.
    pub(crate) async fn guild_members(
        &self,
        guild_id: &str,
    ) -> Result<Vec<GuildMemberPayload>, GavelError> {
        let mut members = Vec::new();
        let mut after = String::from("0");

        loop {
            let url = format!(
                "{API_BASE}/guilds/{guild_id}/members?limit={MEMBERS_PAGE_LIMIT}&after={after}"
            );
            let response = self
                .client
                .get(&url)
                .header("Authorization", self.auth())
                .send()
                .await
                .map_err(|e| GavelError::Channel(format!("discord list members failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(GavelError::Channel(format!(
                    "discord list members error {status}: {body}"
                )));
            }

            let page: Vec<GuildMemberPayload> = response.json().await.map_err(|e| {
                GavelError::Channel(format!("discord members parse failed: {e}"))
            })?;

            let full_page = page.len() == MEMBERS_PAGE_LIMIT;
            if let Some(last_id) = page.iter().rev().find_map(|m| m.user.as_ref()) {
                after = last_id.id.clone();
            }
            members.extend(page);

            if !full_page {
                return Ok(members);
            }
        }
    }

    /// List the channels of a guild.
    pub(crate) async fn guild_channels(
        &self,
        guild_id: &str,
    ) -> Result<Vec<ChannelPayload>, GavelError> {
        let url = format!("{API_BASE}/guilds/{guild_id}/channels");
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| GavelError::Channel(format!("discord list channels failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GavelError::Channel(format!(
                "discord list channels error {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GavelError::Channel(format!("discord channels parse failed: {e}")))
    }

    /// Find a guild channel id by name.
    pub(crate) async fn find_channel_id(
        &self,
        guild_id: &str,
        name: &str,
    ) -> Result<Option<String>, GavelError> {
        let channels = self.guild_channels(guild_id).await?;
        Ok(channels
            .into_iter()
            .find(|c| c.name.as_deref() == Some(name))
            .map(|c| c.id))
    }

    /// Fetch raw bytes from a CDN url (attachment content; pre-signed,
    /// no auth header).
    pub(crate) async fn download(&self, url: &str) -> Result<Vec<u8>, GavelError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GavelError::Channel(format!("discord download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GavelError::Channel(format!(
                "discord download error {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GavelError::Channel(format!("discord download read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
