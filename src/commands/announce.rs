//! Announcement authoring: a guided conversation that collects a body
//! and optional images, previews the result, and hands off to the
//! broadcast engine after confirmation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gavel_core::error::GavelError;
use gavel_core::message::{GuildMember, IncomingMessage, OutgoingFile};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::CommandContext;
use crate::broadcast::BroadcastJob;
use crate::conversation::{Conversation, CANCEL_TOKEN};

pub(super) async fn announcement(
    ctx: &CommandContext<'_>,
    msg: &IncomingMessage,
) -> Result<Vec<String>, GavelError> {
    let con = Conversation::begin(
        ctx.interface,
        ctx.channel.as_ref(),
        Duration::from_secs(ctx.config.club.conversation_timeout_secs),
    );

    con.send("Commencing announcement mode.").await?;
    con.send("Please send me the announcement you are about to make. Type `cancel` to cancel.")
        .await?;
    let body = con.recv_text().await?.text;

    let files = collect_images(ctx, &con).await?;
    let Some(files) = files else {
        // Claimed an upload but sent none.
        con.send("You did not upload an image. Abort.").await?;
        return Ok(Vec::new());
    };

    con.send("You are about to make this announcement").await?;
    con.send(&"-".repeat(40)).await?;
    con.send_with_files(&format!("Hi $name\n{body}"), files.clone())
        .await?;
    con.send(&"-".repeat(40)).await?;

    let recipients = announcement_recipients(ctx).await?;
    con.send(&format!("It will be sent to {} people.", recipients.len()))
        .await?;
    con.send("Confirm? yes/no").await?;
    if con.recv().await?.text.to_lowercase() != "yes" {
        con.send("Operation cancelled").await?;
        return Ok(Vec::new());
    }

    let sender_name = ctx
        .state
        .profile_or_refresh(ctx.store, &msg.author_id)
        .await
        .filter(|p| !p.first_name.is_empty())
        .map(|p| p.first_name)
        .unwrap_or_else(|| msg.author_name.clone());

    let audience_channel_id = match ctx
        .channel
        .resolve_channel(&ctx.config.club.announcements_channel)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!("announcements channel lookup failed: {e}");
            None
        }
    };

    info!(
        "announcement by {} confirmed, {} recipients",
        msg.author_id,
        recipients.len()
    );
    let job = BroadcastJob {
        channel: Arc::clone(ctx.channel),
        state: Arc::clone(ctx.state),
        store: ctx.store.clone(),
        club_name: ctx.config.club.name.clone(),
        sender_name,
        report_channel_id: msg.channel_id.clone(),
        body,
        files,
        audience_channel_id,
        recipients,
        server_admins: ctx.config.club.server_admins.clone(),
    };
    tokio::spawn(job.execute());
    Ok(Vec::new())
}

/// The image attachment loop. `None` means the user claimed an upload
/// but attached nothing, which aborts the announcement.
async fn collect_images(
    ctx: &CommandContext<'_>,
    con: &Conversation<'_>,
) -> Result<Option<Vec<OutgoingFile>>, GavelError> {
    let mut files = Vec::new();
    loop {
        let which = if files.is_empty() { "an" } else { "another" };
        con.send(&format!("Do you wish to attach {which} image? yes/no"))
            .await?;
        if con.recv().await?.text.to_lowercase() != "yes" {
            break;
        }

        con.send("Please send me the image. Type `cancel` to cancel the image upload.")
            .await?;
        let upload = con.recv().await?;
        if upload.text == CANCEL_TOKEN {
            break;
        }
        if upload.attachments.is_empty() {
            return Ok(None);
        }
        for attachment in &upload.attachments {
            let bytes = ctx.channel.fetch_attachment(&attachment.url).await?;
            store_image(&ctx.config.gavel.data_dir, &attachment.filename, &bytes)?;
            files.push(OutgoingFile {
                filename: attachment.filename.clone(),
                bytes,
            });
        }
    }
    Ok(Some(files))
}

/// Everyone the announcement goes to: guild members, minus bots, minus
/// anyone opted out of direct messages.
async fn announcement_recipients(
    ctx: &CommandContext<'_>,
) -> Result<Vec<GuildMember>, GavelError> {
    let members = ctx.channel.list_members().await?;
    let mut recipients = Vec::new();
    for member in members {
        if member.is_bot {
            continue;
        }
        let opted_out = ctx
            .state
            .profile_or_refresh(ctx.store, &member.user_id)
            .await
            .map(|p| p.opt_out_dm)
            .unwrap_or(false);
        if !opted_out {
            recipients.push(member);
        }
    }
    Ok(recipients)
}

/// Persist an uploaded image under a content-addressed name so repeat
/// uploads of the same file share one copy on disk.
fn store_image(data_dir: &str, filename: &str, bytes: &[u8]) -> Result<(), GavelError> {
    let digest = Sha256::digest(bytes);
    let hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let ext = filename.rsplit('.').next().unwrap_or("bin");

    let dir = Path::new(data_dir).join("images");
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join(format!("{hash}.{ext}")), bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_image_is_content_addressed() {
        let dir = std::env::temp_dir().join(format!("__gavel_img_{}__", std::process::id()));
        let dir_str = dir.to_str().unwrap();

        store_image(dir_str, "poster.png", b"pixels").unwrap();
        store_image(dir_str, "copy-of-poster.png", b"pixels").unwrap();
        store_image(dir_str, "other.jpg", b"different pixels").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.join("images"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        // Identical bytes collapse to one file regardless of name.
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|n| n.ends_with(".png") || n.ends_with(".jpg")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_store_image_extension_fallback() {
        let dir = std::env::temp_dir().join(format!("__gavel_img_ext_{}__", std::process::id()));
        store_image(dir.to_str().unwrap(), "noext", b"data").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.join("images"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with(".noext"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
