//! Role-tiered club commands and the dispatch entry point.
//!
//! Commands live in three tiers: member, admin, and server admin. A
//! higher tier inherits everything below it, and a verb defined in two
//! tiers resolves to the highest one, so admins asking for `attendance
//! today` get the overview while plain members get their own record.

mod admin;
mod announce;
mod member;
mod server;


use std::sync::Arc;

use gavel_core::chunk::chunk_plain;
use gavel_core::config::Config;
use gavel_core::error::GavelError;
use gavel_core::message::{IncomingMessage, OutgoingReply};
use gavel_core::traits::Channel;
use gavel_store::Store;
use tracing::{debug, error, info};

use crate::fault;
use crate::registry::Interface;
use crate::state::{ClubState, Role};

/// Everything a handler may need, borrowed for one dispatch call.
pub struct CommandContext<'a> {
    pub state: &'a Arc<ClubState>,
    pub store: &'a Store,
    pub channel: &'a Arc<dyn Channel>,
    pub config: &'a Config,
    pub interface: &'a Arc<Interface>,
}

/// Known command verbs across all tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Feedback,
    Opt,
    Attendance,
    Email,
    Meeting,
    AttendanceReport,
    Announcement,
    Sql,
    Shell,
    Restart,
}

/// One entry in a tier's command table: the verb, what it maps to, and
/// the usage line shown in help output.
struct CommandSpec {
    name: &'static str,
    command: Command,
    usage: &'static str,
    description: &'static str,
}

const MEMBER_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "feedback",
        command: Command::Feedback,
        usage: "feedback",
        description: "Send a feedback to the admin team anonymously.",
    },
    CommandSpec {
        name: "opt",
        command: Command::Opt,
        usage: "opt {in|out} {email|dm}",
        description: "Change your preference of whether you want to receive notification by a specific method for announcements.",
    },
    CommandSpec {
        name: "attendance",
        command: Command::Attendance,
        usage: "attendance {status|list}",
        description: "Show the number of meetings you have attended",
    },
];

const ADMIN_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "email",
        command: Command::Email,
        usage: "email list",
        description: "List all unique emails in the database (admin privilege)",
    },
    CommandSpec {
        name: "meeting",
        command: Command::Meeting,
        usage: "meeting {begin|end} [effective_meeting=1]",
        description: "Starts or ends a club meeting (admin privilege)",
    },
    CommandSpec {
        name: "attendance",
        command: Command::AttendanceReport,
        usage: "attendance {today|summary}",
        description: "Show attendance status (admin privilege)",
    },
    CommandSpec {
        name: "announcement",
        command: Command::Announcement,
        usage: "announcement",
        description: "Make announcement (admin privilege)",
    },
];

const SERVER_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "sql",
        command: Command::Sql,
        usage: "sql $sql_select_query",
        description: "Query the database. Currently existing tables are `members` and `attendance` (server admin privilege)",
    },
    CommandSpec {
        name: "shell",
        command: Command::Shell,
        usage: "shell $*",
        description: "Run shell command `$*` on the host server (server admin privilege)",
    },
    CommandSpec {
        name: "restart",
        command: Command::Restart,
        usage: "restart",
        description: "Restart the bot (server admin privilege)",
    },
];

/// Command tables visible to a role, most privileged first. Lookup
/// order doubles as shadowing order for verbs defined in two tiers.
fn tiers_for(role: Role) -> &'static [&'static [CommandSpec]] {
    match role {
        Role::ServerAdmin => &[SERVER_COMMANDS, ADMIN_COMMANDS, MEMBER_COMMANDS],
        Role::Admin => &[ADMIN_COMMANDS, MEMBER_COMMANDS],
        Role::Member => &[MEMBER_COMMANDS],
    }
}

fn resolve(role: Role, verb: &str) -> Option<Command> {
    tiers_for(role)
        .iter()
        .flat_map(|tier| tier.iter())
        .find(|spec| spec.name == verb)
        .map(|spec| spec.command)
}

/// The full usage listing for a role, one entry per visible command.
pub fn usage_text(role: Role) -> String {
    let mut text = String::from("Usage:\n");
    for spec in tiers_for(role).iter().flat_map(|tier| tier.iter()) {
        text.push_str("```");
        text.push_str(spec.usage);
        text.push_str("```");
        text.push_str(spec.description);
        text.push_str("\n\n");
    }
    text
}

pub fn unrecognized_command(verb: &str, role: Role) -> String {
    format!("Unrecognized command `{verb}`.{}", usage_text(role))
}

/// Route one inbound line and send the resulting replies. Returns the
/// reply texts actually delivered, in order. Never propagates handler
/// errors; they become user-facing replies here.
pub async fn dispatch(ctx: &CommandContext<'_>, msg: &IncomingMessage) -> Vec<String> {
    if ctx.interface.is_locked() {
        debug!("dispatch locked on channel {}, message dropped", msg.channel_id);
        return Vec::new();
    }

    let role = ctx.interface.role();
    let replies = match route(ctx, msg, role).await {
        Ok(replies) => replies,
        Err(GavelError::ConversationTimeout) => vec!["Operation timed out".to_string()],
        Err(GavelError::ConversationCancelled) => vec!["Operation cancelled".to_string()],
        Err(GavelError::InsufficientArguments) => {
            chunk_plain(&format!("Insufficient arguments.\n{}", usage_text(role)))
        }
        Err(err) => {
            let verb = msg.text.split_whitespace().next().unwrap_or("");
            error!("command `{verb}` from {} failed: {err}", msg.author_id);
            fault::report_fault(
                ctx.channel.as_ref(),
                &ctx.config.club.maintainer,
                verb,
                &err.to_string(),
            )
            .await;
            vec!["An error has occurred. My creator has been notified (well, hopefully).".to_string()]
        }
    };
    send_replies(ctx, &msg.channel_id, replies).await
}

async fn route(
    ctx: &CommandContext<'_>,
    msg: &IncomingMessage,
    role: Role,
) -> Result<Vec<String>, GavelError> {
    // The attendance key outranks verb parsing and ignores tiers.
    if let Some(effective) = ctx.state.match_attendance_key(&msg.text) {
        ctx.store.record_attendance(&msg.author_id, effective).await?;
        info!("attendance recorded for {}", msg.author_id);
        return Ok(vec!["Thank you. Your attendance has been recorded.".to_string()]);
    }

    let mut parts = msg.text.split_whitespace();
    let verb = parts.next().ok_or(GavelError::InsufficientArguments)?;
    let args: Vec<&str> = parts.collect();

    let Some(command) = resolve(role, verb) else {
        return Ok(chunk_plain(&unrecognized_command(verb, role)));
    };
    debug!("dispatching `{verb}` for {} as {role:?}", msg.author_id);

    match command {
        Command::Feedback => member::feedback(ctx).await,
        Command::Opt => member::opt(ctx, msg, &args).await,
        Command::Attendance => member::attendance(ctx, msg, &args).await,
        Command::Email => admin::email(ctx, &args).await,
        Command::Meeting => admin::meeting(ctx, &args).await,
        Command::AttendanceReport => admin::attendance(ctx, msg, &args).await,
        Command::Announcement => announce::announcement(ctx, msg).await,
        Command::Sql => server::sql(ctx, &args).await,
        Command::Shell => server::shell(ctx, msg, &args).await,
        Command::Restart => server::restart(ctx, msg).await,
    }
}

/// Deliver handler output one message per element, skipping empties
/// (the platform rejects zero-length content). Elements are already
/// sized by their producers.
async fn send_replies(
    ctx: &CommandContext<'_>,
    channel_id: &str,
    replies: Vec<String>,
) -> Vec<String> {
    let mut sent = Vec::new();
    for reply in replies {
        if reply.is_empty() {
            continue;
        }
        match ctx
            .channel
            .send(&OutgoingReply::to_channel(channel_id, reply.clone()))
            .await
        {
            Ok(()) => sent.push(reply),
            Err(e) => error!("reply delivery on {channel_id} failed: {e}"),
        }
    }
    sent
}
