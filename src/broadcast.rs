//! Fan-out delivery of announcements to the membership.
//!
//! A broadcast job sends one direct message per recipient concurrently,
//! posts a copy to the public announcements channel, then reports the
//! outcome back to the channel the announcement was composed in.

use std::sync::Arc;
use std::time::Instant;

use gavel_core::chunk::chunk_plain;
use gavel_core::error::GavelError;
use gavel_core::message::{Embed, GuildMember, OutgoingFile, OutgoingReply};
use gavel_core::traits::Channel;
use gavel_store::Store;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::ClubState;

pub struct BroadcastJob {
    pub channel: Arc<dyn Channel>,
    pub state: Arc<ClubState>,
    pub store: Store,
    pub club_name: String,
    pub sender_name: String,
    /// Channel the announcement was composed in; the report goes here.
    pub report_channel_id: String,
    pub body: String,
    pub files: Vec<OutgoingFile>,
    /// Public announcements channel, when one could be resolved.
    pub audience_channel_id: Option<String>,
    pub recipients: Vec<GuildMember>,
    pub server_admins: Vec<String>,
}

pub struct BroadcastOutcome {
    pub total: usize,
    /// Display name and error text for each recipient that failed.
    pub failed: Vec<(String, String)>,
    pub elapsed_secs: f64,
}

impl BroadcastJob {
    /// Deliver to every recipient, log the outcome, and report it back.
    /// Runs detached from the announcement conversation, so every error
    /// ends here rather than propagating.
    pub async fn execute(self) {
        let job_id = Uuid::new_v4();
        info!(
            "broadcast {job_id}: delivering to {} members",
            self.recipients.len()
        );
        let outcome = self.run().await;
        info!(
            "broadcast {job_id}: {}/{} delivered in {:.2}s",
            outcome.total - outcome.failed.len(),
            outcome.total,
            outcome.elapsed_secs
        );
        if let Err(e) = self.report(&outcome).await {
            warn!("broadcast {job_id}: report delivery failed: {e}");
        }
    }

    pub async fn run(&self) -> BroadcastOutcome {
        let start = Instant::now();
        let mut set: JoinSet<(Option<GuildMember>, Result<(), GavelError>)> = JoinSet::new();

        for member in &self.recipients {
            let channel = Arc::clone(&self.channel);
            let text = self.member_text(member).await;
            let files = self.files.clone();
            let member = member.clone();
            set.spawn(async move {
                let mut reply = OutgoingReply::to_user(&member.user_id, text);
                if !files.is_empty() {
                    reply = reply.with_files(files);
                }
                let result = channel.send(&reply).await;
                (Some(member), result)
            });
        }

        if let Some(audience_id) = &self.audience_channel_id {
            let channel = Arc::clone(&self.channel);
            let text = format!("Hi everyone,\n{}", self.body);
            let files = self.files.clone();
            let audience_id = audience_id.clone();
            set.spawn(async move {
                let mut reply = OutgoingReply::to_channel(audience_id, text);
                if !files.is_empty() {
                    reply = reply.with_files(files);
                }
                (None, channel.send(&reply).await)
            });
        }

        let mut failed = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((Some(member), Err(e))) => {
                    failed.push((member.display_name().to_string(), e.to_string()));
                }
                Ok((None, Err(e))) => warn!("announcements channel delivery failed: {e}"),
                Ok((_, Ok(()))) => {}
                Err(e) => warn!("broadcast task panicked: {e}"),
            }
        }

        BroadcastOutcome {
            total: self.recipients.len(),
            failed,
            elapsed_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// Greeting plus body. Server admins additionally see who sent it.
    async fn member_text(&self, member: &GuildMember) -> String {
        let first = self
            .state
            .profile_or_refresh(&self.store, &member.user_id)
            .await
            .filter(|p| !p.first_name.is_empty())
            .map(|p| p.first_name)
            .unwrap_or_else(|| member.username.clone());

        if self.server_admins.contains(&member.user_id) {
            format!(
                "Hi {first}, here is an announcement from {} by {}:\n\n{}",
                self.club_name, self.sender_name, self.body
            )
        } else {
            format!("Hi {first},\n{}", self.body)
        }
    }

    pub async fn report(&self, outcome: &BroadcastOutcome) -> Result<(), GavelError> {
        let delivered = outcome.total - outcome.failed.len();
        let title = if outcome.failed.is_empty() {
            format!(
                "Your announcement has been successfully sent to all {} members in {:.2} seconds",
                outcome.total, outcome.elapsed_secs
            )
        } else {
            format!(
                "Your announcement has been successfully sent to {}/{} members in {:.2} seconds",
                delivered, outcome.total, outcome.elapsed_secs
            )
        };
        let embed = Embed {
            title,
            description: format!("Hi $name,\n{}", self.body),
        };
        self.channel
            .send(&OutgoingReply::to_channel(&self.report_channel_id, "").with_embed(embed))
            .await?;

        if !outcome.failed.is_empty() {
            let names = outcome
                .failed
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            for piece in chunk_plain(&format!("Failed for:\n{names}")) {
                self.channel
                    .send(&OutgoingReply::to_channel(&self.report_channel_id, piece))
                    .await?;
            }
            let errors = outcome
                .failed
                .iter()
                .map(|(_, e)| format!("```\n{e}\n```"))
                .collect::<Vec<_>>()
                .join("\n");
            for piece in chunk_plain(&format!("Errors:\n{errors}")) {
                self.channel
                    .send(&OutgoingReply::to_channel(&self.report_channel_id, piece))
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{member, test_config, test_store, MockChannel};

    async fn job(channel: Arc<MockChannel>, store: Store) -> BroadcastJob {
        let config = test_config();
        BroadcastJob {
            channel,
            state: Arc::new(ClubState::new(config.club.clone())),
            store,
            club_name: config.club.name.clone(),
            sender_name: "president".to_string(),
            report_channel_id: "dm-admin".to_string(),
            body: "Meeting moved to Friday.".to_string(),
            files: Vec::new(),
            audience_channel_id: None,
            recipients: Vec::new(),
            server_admins: config.club.server_admins.clone(),
        }
    }

    #[tokio::test]
    async fn test_member_greeting_prefers_profile_first_name() {
        let store = test_store().await;
        store.upsert_member("u1", "ada_l").await.unwrap();
        store
            .update_profile("u1", "Ada", "Lovelace", None)
            .await
            .unwrap();

        let job = job(Arc::new(MockChannel::new()), store).await;
        let text = job.member_text(&member("u1", "ada_l")).await;
        assert_eq!(text, "Hi Ada,\nMeeting moved to Friday.");
    }

    #[tokio::test]
    async fn test_member_greeting_falls_back_to_username() {
        let store = test_store().await;
        let job = job(Arc::new(MockChannel::new()), store).await;
        let text = job.member_text(&member("u9", "grace")).await;
        assert_eq!(text, "Hi grace,\nMeeting moved to Friday.");
    }

    #[tokio::test]
    async fn test_server_admins_see_the_sender() {
        let store = test_store().await;
        let job = job(Arc::new(MockChannel::new()), store).await;
        let text = job.member_text(&member("server-admin-1", "sa")).await;
        assert_eq!(
            text,
            "Hi sa, here is an announcement from CPU by president:\n\nMeeting moved to Friday."
        );
    }

    #[tokio::test]
    async fn test_run_counts_partial_failures() {
        let mock = Arc::new(MockChannel::new());
        mock.fail_target("u2");
        let store = test_store().await;
        let mut job = job(Arc::clone(&mock), store).await;
        job.recipients = vec![
            member("u1", "alice"),
            member("u2", "bob"),
            member("u3", "carol"),
        ];

        let outcome = job.run().await;
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "bob");
        assert!(outcome.failed[0].1.contains("simulated send failure"));
        assert_eq!(mock.sent_to("u1").len(), 1);
        assert_eq!(mock.sent_to("u3").len(), 1);
    }

    #[tokio::test]
    async fn test_audience_channel_gets_a_copy() {
        let mock = Arc::new(MockChannel::new());
        let store = test_store().await;
        let mut job = job(Arc::clone(&mock), store).await;
        job.recipients = vec![member("u1", "alice")];
        job.audience_channel_id = Some("ann-chan".to_string());

        job.run().await;
        let posted = mock.sent_to("ann-chan");
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].text, "Hi everyone,\nMeeting moved to Friday.");
    }

    #[tokio::test]
    async fn test_audience_failure_is_not_a_member_failure() {
        let mock = Arc::new(MockChannel::new());
        mock.fail_target("ann-chan");
        let store = test_store().await;
        let mut job = job(Arc::clone(&mock), store).await;
        job.recipients = vec![member("u1", "alice")];
        job.audience_channel_id = Some("ann-chan".to_string());

        let outcome = job.run().await;
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.total, 1);
    }

    #[tokio::test]
    async fn test_report_success_embed() {
        let mock = Arc::new(MockChannel::new());
        let store = test_store().await;
        let mut job = job(Arc::clone(&mock), store).await;
        job.recipients = vec![member("u1", "alice"), member("u2", "bob")];

        let outcome = job.run().await;
        job.report(&outcome).await.unwrap();

        let reports = mock.sent_to("dm-admin");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].text, "");
        let embed = reports[0].embed.as_ref().unwrap();
        assert!(embed
            .title
            .starts_with("Your announcement has been successfully sent to all 2 members in"));
        assert_eq!(embed.description, "Hi $name,\nMeeting moved to Friday.");
    }

    #[tokio::test]
    async fn test_report_lists_failures_with_errors() {
        let mock = Arc::new(MockChannel::new());
        mock.fail_target("u2");
        let store = test_store().await;
        let mut job = job(Arc::clone(&mock), store).await;
        job.recipients = vec![member("u1", "alice"), member("u2", "bob")];

        let outcome = job.run().await;
        job.report(&outcome).await.unwrap();

        let reports = mock.sent_to("dm-admin");
        let title = &reports[0].embed.as_ref().unwrap().title;
        assert!(title.starts_with("Your announcement has been successfully sent to 1/2 members in"));
        assert!(reports.iter().any(|r| r.text.starts_with("Failed for:\nbob")));
        assert!(reports
            .iter()
            .any(|r| r.text.starts_with("Errors:\n```") && r.text.contains("simulated send failure")));
    }

    #[tokio::test]
    async fn test_files_ride_on_every_delivery() {
        let mock = Arc::new(MockChannel::new());
        let store = test_store().await;
        let mut job = job(Arc::clone(&mock), store).await;
        job.recipients = vec![member("u1", "alice")];
        job.audience_channel_id = Some("ann-chan".to_string());
        job.files = vec![OutgoingFile {
            filename: "poster.png".to_string(),
            bytes: vec![1, 2, 3],
        }];

        job.run().await;
        assert_eq!(mock.sent_to("u1")[0].files.len(), 1);
        assert_eq!(mock.sent_to("ann-chan")[0].files.len(), 1);
    }
}
