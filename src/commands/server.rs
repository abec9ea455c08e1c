//! Server-admin handlers: raw SQL, shell execution, restart.

use gavel_core::chunk::chunk_fenced;
use gavel_core::error::GavelError;
use gavel_core::message::IncomingMessage;

use super::CommandContext;
use crate::shell::run_shell;

const FORBIDDEN_SQL: &[&str] = &[
    "update", "insert", "drop", "alter", "table", "into", "create", "value",
];

/// Read-only database access. Tokens are checked case-insensitively;
/// the query runs with its original casing.
pub(super) async fn sql(
    ctx: &CommandContext<'_>,
    args: &[&str],
) -> Result<Vec<String>, GavelError> {
    let lowered: Vec<String> = args.iter().map(|s| s.to_lowercase()).collect();
    let blocked = !lowered.iter().any(|t| t.as_str() == "select")
        || lowered
            .iter()
            .any(|t| FORBIDDEN_SQL.contains(&t.as_str()));

    let reply = if blocked {
        "Only SELECT statement is allowed.".to_string()
    } else {
        match ctx.store.raw_select(&args.join(" ")).await {
            Ok((columns, rows)) => {
                let mut text = columns.join(" ");
                text.push('\n');
                text.push_str(
                    &rows
                        .iter()
                        .map(|row| row.join(" "))
                        .collect::<Vec<_>>()
                        .join("\n"),
                );
                text
            }
            Err(e) => e.to_string(),
        }
    };
    Ok(chunk_fenced(&reply))
}

pub(super) async fn shell(
    ctx: &CommandContext<'_>,
    msg: &IncomingMessage,
    args: &[&str],
) -> Result<Vec<String>, GavelError> {
    if args.is_empty() {
        return Err(GavelError::InsufficientArguments);
    }
    run_shell(
        ctx.channel.as_ref(),
        &msg.channel_id,
        &args.join(" "),
        &ctx.config.shell,
    )
    .await?;
    Ok(Vec::new())
}

pub(super) async fn restart(
    ctx: &CommandContext<'_>,
    msg: &IncomingMessage,
) -> Result<Vec<String>, GavelError> {
    run_shell(
        ctx.channel.as_ref(),
        &msg.channel_id,
        &ctx.config.shell.restart_command,
        &ctx.config.shell,
    )
    .await?;
    Ok(Vec::new())
}
