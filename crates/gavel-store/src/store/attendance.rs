//! Attendance records and reports.

use super::Store;
use chrono::{Days, Local};
use gavel_core::error::GavelError;

/// Timestamps are stored as local `YYYY-MM-DD HH:MM:SS` text so day
/// windows are plain string comparisons.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl Store {
    /// Append one attendance record for a redeemed key.
    pub async fn record_attendance(&self, user_id: &str, effective: f64) -> Result<(), GavelError> {
        let now = Local::now().format(TIME_FORMAT).to_string();
        sqlx::query("INSERT INTO attendance (user_id, time, effective) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(now)
            .bind(effective)
            .execute(&self.pool)
            .await
            .map_err(|e| GavelError::Store(format!("record attendance failed: {e}")))?;

        Ok(())
    }

    /// Meetings attended and effective total for one member.
    pub async fn attendance_totals(&self, user_id: &str) -> Result<(i64, f64), GavelError> {
        let (count, effective): (i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(effective), 0.0) FROM attendance WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GavelError::Store(format!("query failed: {e}")))?;

        Ok((count, effective))
    }

    /// Every meeting one member attended, in order: (timestamp, effective).
    pub async fn attendance_dates(&self, user_id: &str) -> Result<Vec<(String, f64)>, GavelError> {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            "SELECT time, effective FROM attendance WHERE user_id = ? ORDER BY time",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GavelError::Store(format!("query failed: {e}")))?;

        Ok(rows)
    }

    /// Display names of everyone who attended today's meeting.
    pub async fn attended_today(&self) -> Result<Vec<String>, GavelError> {
        let today = Local::now().date_naive();
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        let start = format!("{today} 00:00:00");
        let end = format!("{tomorrow} 00:00:00");

        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT m.first_name, m.last_name, m.username \
             FROM attendance a JOIN members m ON m.user_id = a.user_id \
             WHERE a.time >= ? AND a.time < ? ORDER BY a.time",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GavelError::Store(format!("query failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(first, last, username)| display_name(&first, &last, &username))
            .collect())
    }

    /// Per-member attendance totals: (display name, meetings, effective),
    /// best attendance first.
    pub async fn attendance_summary(&self) -> Result<Vec<(String, i64, f64)>, GavelError> {
        let rows: Vec<(String, String, String, i64, f64)> = sqlx::query_as(
            "SELECT m.first_name, m.last_name, m.username, \
             COUNT(*) AS total, SUM(a.effective) AS effective \
             FROM attendance a JOIN members m ON m.user_id = a.user_id \
             GROUP BY a.user_id ORDER BY effective DESC, total DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GavelError::Store(format!("query failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(first, last, username, total, effective)| {
                (display_name(&first, &last, &username), total, effective)
            })
            .collect())
    }
}

fn display_name(first: &str, last: &str, username: &str) -> String {
    let full = format!("{first} {last}");
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}
