//! Member-tier handlers: feedback, opt, attendance.

use std::time::Duration;

use gavel_core::chunk::chunk_plain;
use gavel_core::error::GavelError;
use gavel_core::message::{IncomingMessage, OutgoingReply};
use gavel_store::OptChannel;

use super::{unrecognized_command, CommandContext};
use crate::conversation::{Conversation, CANCEL_TOKEN};
use crate::fault;
use crate::state::fmt_effective;

/// Anonymous feedback: one prompt, one reply, forwarded verbatim to the
/// feedback channel without the author's name.
pub(super) async fn feedback(ctx: &CommandContext<'_>) -> Result<Vec<String>, GavelError> {
    let timeout_secs = ctx.config.club.conversation_timeout_secs;
    let con = Conversation::begin(
        ctx.interface,
        ctx.channel.as_ref(),
        Duration::from_secs(timeout_secs),
    );

    con.send("Your next message to me will be forwarded to the admin team anonymously. Type `cancel` to cancel.")
        .await?;
    let reply = match con.recv().await {
        Ok(reply) => reply,
        Err(GavelError::ConversationTimeout) => {
            return Ok(vec![format!(
                "You have not responded in {} minutes. I will no longer forward your next message to the admin team.",
                timeout_secs / 60
            )]);
        }
        Err(e) => return Err(e),
    };
    if reply.text == CANCEL_TOKEN {
        return Ok(vec!["Operation canceled.".to_string()]);
    }

    match forward_feedback(ctx, &reply.text).await {
        Ok(()) => Ok(vec![
            "Your feedback has been forwarded to the admin team. Thank you.".to_string(),
        ]),
        Err(e) => {
            fault::report_fault(
                ctx.channel.as_ref(),
                &ctx.config.club.maintainer,
                "feedback",
                &e.to_string(),
            )
            .await;
            Ok(vec!["Sorry an error has occurred.".to_string()])
        }
    }
}

async fn forward_feedback(ctx: &CommandContext<'_>, text: &str) -> Result<(), GavelError> {
    let channel_id = ctx
        .channel
        .resolve_channel(&ctx.config.club.feedback_channel)
        .await?
        .ok_or_else(|| {
            GavelError::Channel(format!(
                "no channel named {} in the guild",
                ctx.config.club.feedback_channel
            ))
        })?;
    ctx.channel
        .send(&OutgoingReply::to_channel(channel_id, text))
        .await
}

pub(super) async fn opt(
    ctx: &CommandContext<'_>,
    msg: &IncomingMessage,
    args: &[&str],
) -> Result<Vec<String>, GavelError> {
    let direction = *args.first().ok_or(GavelError::InsufficientArguments)?;
    let opted_out = match direction {
        "out" => true,
        "in" => false,
        other => return Ok(vec![unrecognized_command(other, ctx.interface.role())]),
    };
    let method = *args.get(1).ok_or(GavelError::InsufficientArguments)?;
    let channel = match method {
        "email" => OptChannel::Email,
        "dm" => OptChannel::Dm,
        other => return Ok(vec![unrecognized_command(other, ctx.interface.role())]),
    };

    ctx.store
        .set_opt_out(&msg.author_id, channel, opted_out)
        .await?;
    ctx.state.refresh_profiles(ctx.store).await;

    let text = match (opted_out, channel) {
        (true, OptChannel::Email) => "You have successfully opted out of our email",
        (true, OptChannel::Dm) => "You have successfully opted out of our private message",
        (false, OptChannel::Email) => "You have successfully opted in our email",
        (false, OptChannel::Dm) => "You have successfully opted in our direct message",
    };
    Ok(vec![text.to_string()])
}

pub(super) async fn attendance(
    ctx: &CommandContext<'_>,
    msg: &IncomingMessage,
    args: &[&str],
) -> Result<Vec<String>, GavelError> {
    match *args.first().ok_or(GavelError::InsufficientArguments)? {
        "status" => {
            let (count, effective) = ctx.store.attendance_totals(&msg.author_id).await?;
            if count == 0 {
                return Ok(vec!["You have not attended any meeting this year.".to_string()]);
            }
            let plural = if count > 1 { "s" } else { "" };
            if effective == count as f64 {
                Ok(vec![format!(
                    "You have attended {count} meeting{plural} this year."
                )])
            } else {
                Ok(vec![format!(
                    "You have attended {count} meeting{plural} this year, which counts as {} meetings with bonuses.",
                    fmt_effective(effective)
                )])
            }
        }
        "list" => {
            let rows = ctx.store.attendance_dates(&msg.author_id).await?;
            let mut reply = String::from("You have attended the following meetings:\n");
            for (time, effective) in rows {
                let date = time.split(' ').next().unwrap_or(&time);
                reply.push_str(date);
                if effective != 1.0 {
                    reply.push_str(&format!(
                        " (counts as {} meetings)",
                        fmt_effective(effective)
                    ));
                }
                reply.push('\n');
            }
            Ok(chunk_plain(&reply))
        }
        other => Ok(vec![unrecognized_command(other, ctx.interface.role())]),
    }
}
