//! Shell command execution with live output streaming.
//!
//! Commands run under `sh -c` with a per-command timeout. Combined
//! stdout/stderr is streamed back to the requesting channel in fenced
//! chunks, flushed once a second or when the buffer grows past a
//! threshold, so long-running commands show progress instead of a
//! single dump at the end.

use std::process::Stdio;
use std::time::Duration;

use gavel_core::chunk::{chunk_fenced, chunk_plain};
use gavel_core::config::ShellConfig;
use gavel_core::error::GavelError;
use gavel_core::message::OutgoingReply;
use gavel_core::traits::Channel;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::Command;
use tracing::{info, warn};

const FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const FLUSH_THRESHOLD: usize = 1500;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Commands whose first token is on the extended list get the longer
/// timeout; everything else gets the default.
pub fn timeout_for(command: &str, cfg: &ShellConfig) -> Duration {
    let head = command.split_whitespace().next().unwrap_or("");
    let secs = if cfg.extended_commands.iter().any(|c| c == head) {
        cfg.extended_timeout_secs
    } else {
        cfg.timeout_secs
    };
    Duration::from_secs(secs)
}

/// Run `command` and stream its output to `channel_id` until it exits
/// or the timeout kills it.
pub async fn run_shell(
    channel: &dyn Channel,
    channel_id: &str,
    command: &str,
    cfg: &ShellConfig,
) -> Result<(), GavelError> {
    let timeout = timeout_for(command, cfg);
    info!("running shell command `{command}` with a {}s timeout", timeout.as_secs());
    send_plain(channel, channel_id, &format!("Executing shell command `{command}`")).await?;

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !cfg.workdir.is_empty() {
        cmd.current_dir(&cfg.workdir);
    }
    let mut child = cmd
        .spawn()
        .map_err(|e| GavelError::Shell(format!("failed to spawn `{command}`: {e}")))?;

    let mut out_lines = BufReader::new(
        child
            .stdout
            .take()
            .ok_or_else(|| GavelError::Shell("child stdout not captured".to_string()))?,
    )
    .lines();
    let mut err_lines = BufReader::new(
        child
            .stderr
            .take()
            .ok_or_else(|| GavelError::Shell("child stderr not captured".to_string()))?,
    )
    .lines();

    let deadline = tokio::time::Instant::now() + timeout;
    let mut flush = tokio::time::interval(FLUSH_INTERVAL);
    flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut buffer = String::new();
    let mut out_done = false;
    let mut err_done = false;
    let mut killed = false;

    while !(out_done && err_done) {
        tokio::select! {
            line = out_lines.next_line(), if !out_done => {
                collect_line(line, &mut buffer, &mut out_done);
            }
            line = err_lines.next_line(), if !err_done => {
                collect_line(line, &mut buffer, &mut err_done);
            }
            _ = flush.tick() => {
                flush_buffer(channel, channel_id, &mut buffer).await?;
            }
            _ = tokio::time::sleep_until(deadline) => {
                if let Err(e) = child.start_kill() {
                    warn!("failed to kill shell command `{command}`: {e}");
                }
                killed = true;
                break;
            }
        }
        if buffer.chars().count() > FLUSH_THRESHOLD {
            flush_buffer(channel, channel_id, &mut buffer).await?;
        }
    }

    if killed {
        // The shell is gone but a grandchild may keep the pipes open, so
        // pick up what already arrived within a bounded window.
        drain(&mut out_lines, &mut out_done, &mut buffer).await;
        drain(&mut err_lines, &mut err_done, &mut buffer).await;
    }

    let status = child
        .wait()
        .await
        .map_err(|e| GavelError::Shell(format!("failed to reap `{command}`: {e}")))?;
    flush_buffer(channel, channel_id, &mut buffer).await?;

    if killed {
        send_plain(
            channel,
            channel_id,
            &format!(
                "Operation exceeded the {} seconds timeout, so I had to kill it:sweat_smile:",
                timeout.as_secs()
            ),
        )
        .await?;
    }
    send_plain(
        channel,
        channel_id,
        &format!("Process terminated with exit code {}", status.code().unwrap_or(-1)),
    )
    .await?;
    Ok(())
}

fn collect_line(line: std::io::Result<Option<String>>, buffer: &mut String, done: &mut bool) {
    match line {
        Ok(Some(l)) => {
            buffer.push_str(&l);
            buffer.push('\n');
        }
        Ok(None) => *done = true,
        Err(e) => {
            warn!("shell output read failed: {e}");
            *done = true;
        }
    }
}

async fn drain<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>, done: &mut bool, buffer: &mut String) {
    while !*done {
        match tokio::time::timeout(DRAIN_TIMEOUT, lines.next_line()).await {
            Ok(line) => collect_line(line, buffer, done),
            Err(_) => *done = true,
        }
    }
}

async fn flush_buffer(
    channel: &dyn Channel,
    channel_id: &str,
    buffer: &mut String,
) -> Result<(), GavelError> {
    if buffer.is_empty() {
        return Ok(());
    }
    for piece in chunk_fenced(buffer) {
        channel
            .send(&OutgoingReply::to_channel(channel_id, piece))
            .await?;
    }
    buffer.clear();
    Ok(())
}

async fn send_plain(channel: &dyn Channel, channel_id: &str, text: &str) -> Result<(), GavelError> {
    for piece in chunk_plain(text) {
        channel
            .send(&OutgoingReply::to_channel(channel_id, piece))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockChannel;

    fn shell_config() -> ShellConfig {
        ShellConfig::default()
    }

    #[test]
    fn test_timeout_for_default_command() {
        let cfg = shell_config();
        assert_eq!(timeout_for("ls -la /tmp", &cfg), Duration::from_secs(15));
        assert_eq!(timeout_for("", &cfg), Duration::from_secs(15));
    }

    #[test]
    fn test_timeout_for_extended_command() {
        let cfg = shell_config();
        assert_eq!(
            timeout_for("curl https://example.com", &cfg),
            Duration::from_secs(120)
        );
        assert_eq!(
            timeout_for("git clone https://example.com/r.git", &cfg),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_timeout_matches_first_token_only() {
        let cfg = shell_config();
        // `echo curl` is not a curl invocation.
        assert_eq!(timeout_for("echo curl", &cfg), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_run_shell_streams_output_and_exit_code() {
        let mock = MockChannel::new();
        run_shell(&mock, "chan", "echo hello", &shell_config())
            .await
            .unwrap();

        let texts = mock.sent_texts();
        assert_eq!(texts[0], "Executing shell command `echo hello`");
        assert!(texts.contains(&"```hello\n```".to_string()));
        assert_eq!(texts.last().unwrap(), "Process terminated with exit code 0");
    }

    #[tokio::test]
    async fn test_run_shell_reports_nonzero_exit() {
        let mock = MockChannel::new();
        run_shell(&mock, "chan", "exit 3", &shell_config())
            .await
            .unwrap();

        let texts = mock.sent_texts();
        assert_eq!(texts.last().unwrap(), "Process terminated with exit code 3");
    }

    #[tokio::test]
    async fn test_run_shell_captures_stderr() {
        let mock = MockChannel::new();
        run_shell(&mock, "chan", "echo oops >&2", &shell_config())
            .await
            .unwrap();

        let texts = mock.sent_texts();
        assert!(texts.iter().any(|t| t.contains("oops")));
    }

    #[tokio::test]
    async fn test_run_shell_kills_on_timeout() {
        let mock = MockChannel::new();
        let cfg = ShellConfig {
            timeout_secs: 1,
            ..ShellConfig::default()
        };
        run_shell(&mock, "chan", "sleep 30; echo done", &cfg)
            .await
            .unwrap();

        let texts = mock.sent_texts();
        assert!(texts
            .iter()
            .any(|t| t == "Operation exceeded the 1 seconds timeout, so I had to kill it:sweat_smile:"));
        assert!(texts.iter().any(|t| t.starts_with("Process terminated with exit code")));
        assert!(!texts.iter().any(|t| t.contains("done")));
    }
}
