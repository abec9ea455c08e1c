//! Maintainer fault reports.

use chrono::Local;
use gavel_core::message::OutgoingReply;
use gavel_core::traits::Channel;
use tracing::warn;

pub fn format_fault_report(event: &str, error: &str) -> String {
    format!(
        "Error at `{}` during handling event `{}`. Details:\n```\n{}\n```",
        Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
        event,
        error
    )
}

/// Best effort: a fault report that cannot be delivered is logged and
/// otherwise ignored, so it can never take down the handler that raised it.
pub async fn report_fault(channel: &dyn Channel, maintainer: &str, event: &str, error: &str) {
    if maintainer.is_empty() {
        return;
    }
    let reply = OutgoingReply::to_user(maintainer, format_fault_report(event, error));
    if let Err(e) = channel.send(&reply).await {
        warn!("failed to deliver fault report for `{event}`: {e}");
    }
}
