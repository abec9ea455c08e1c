//! Admin-tier handlers: email, meeting, attendance reports.

use gavel_core::chunk::{chunk_fenced, chunk_plain};
use gavel_core::error::GavelError;
use gavel_core::message::IncomingMessage;

use super::{member, unrecognized_command, CommandContext};
use crate::state::fmt_effective;

pub(super) async fn email(
    ctx: &CommandContext<'_>,
    args: &[&str],
) -> Result<Vec<String>, GavelError> {
    match *args.first().ok_or(GavelError::InsufficientArguments)? {
        "list" => {
            let emails = ctx.store.distinct_emails().await?;
            let mut reply = String::new();
            for email in emails {
                reply.push_str(&email);
                reply.push('\n');
            }
            Ok(chunk_plain(&reply))
        }
        other => Ok(chunk_plain(&unrecognized_command(
            other,
            ctx.interface.role(),
        ))),
    }
}

pub(super) async fn meeting(
    ctx: &CommandContext<'_>,
    args: &[&str],
) -> Result<Vec<String>, GavelError> {
    match *args.first().ok_or(GavelError::InsufficientArguments)? {
        "begin" => {
            // A missing or unparsable weight keeps the current one.
            let effective = args.get(1).and_then(|s| s.parse::<f64>().ok());
            let key = ctx.state.begin_meeting(effective);
            Ok(vec![format!(
                "Attendance key: `{key}`. The meeting today counts as {} meeting(s)",
                fmt_effective(ctx.state.current_effective())
            )])
        }
        "end" => {
            ctx.state.end_meeting();
            Ok(vec!["Meeting is over. Attendance key revoked.".to_string()])
        }
        other => Ok(vec![unrecognized_command(other, ctx.interface.role())]),
    }
}

/// Attendance overview for admins. Anything that is not `today` or
/// `summary` falls through to the member-tier handler, so admins keep
/// `status` and `list` for their own record.
pub(super) async fn attendance(
    ctx: &CommandContext<'_>,
    msg: &IncomingMessage,
    args: &[&str],
) -> Result<Vec<String>, GavelError> {
    match *args.first().ok_or(GavelError::InsufficientArguments)? {
        "today" => {
            let names = ctx.store.attended_today().await?;
            if names.is_empty() {
                return Ok(vec!["Nobody has attended today's meeting".to_string()]);
            }
            let mut reply = String::new();
            for name in names {
                reply.push_str(&name);
                reply.push('\n');
            }
            Ok(chunk_plain(&reply))
        }
        "summary" => {
            let rows = ctx.store.attendance_summary().await?;
            let mut reply = String::new();
            for (name, total, effective) in rows {
                reply.push_str(&format!(
                    "{:<20} {:>4} (actual {:>2})\n",
                    name,
                    fmt_effective(effective),
                    total
                ));
            }
            Ok(chunk_fenced(&reply))
        }
        _ => member::attendance(ctx, msg, args).await,
    }
}
