//! Roster rows and notification preferences.

use super::Store;
use gavel_core::error::GavelError;

/// One member's roster row.
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub user_id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub opt_out_dm: bool,
    pub opt_out_email: bool,
}

impl MemberProfile {
    /// Full name, falling back to the username for roster rows created
    /// before onboarding filled in names.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Which notification method an `opt` command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptChannel {
    Email,
    Dm,
}

impl Store {
    /// Insert a member seen for the first time, or refresh the username of
    /// an existing row. Names and email are left for onboarding to fill.
    pub async fn upsert_member(&self, user_id: &str, username: &str) -> Result<(), GavelError> {
        sqlx::query(
            "INSERT INTO members (user_id, username) VALUES (?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET username = excluded.username",
        )
        .bind(user_id)
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(|e| GavelError::Store(format!("upsert member failed: {e}")))?;

        Ok(())
    }

    /// Fill in a member's profile (names, email).
    pub async fn update_profile(
        &self,
        user_id: &str,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
    ) -> Result<(), GavelError> {
        sqlx::query(
            "INSERT INTO members (user_id, first_name, last_name, email) VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
             first_name = excluded.first_name, \
             last_name = excluded.last_name, \
             email = excluded.email",
        )
        .bind(user_id)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|e| GavelError::Store(format!("update profile failed: {e}")))?;

        Ok(())
    }

    /// Look up one member.
    pub async fn member(&self, user_id: &str) -> Result<Option<MemberProfile>, GavelError> {
        let row: Option<(String, String, String, String, Option<String>, i64, i64)> =
            sqlx::query_as(
                "SELECT user_id, username, first_name, last_name, email, \
                 opt_out_dm, opt_out_email FROM members WHERE user_id = ?",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GavelError::Store(format!("query failed: {e}")))?;

        Ok(row.map(profile_from_row))
    }

    /// The whole roster, for the in-process member cache.
    pub async fn roster(&self) -> Result<Vec<MemberProfile>, GavelError> {
        let rows: Vec<(String, String, String, String, Option<String>, i64, i64)> =
            sqlx::query_as(
                "SELECT user_id, username, first_name, last_name, email, \
                 opt_out_dm, opt_out_email FROM members",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GavelError::Store(format!("query failed: {e}")))?;

        Ok(rows.into_iter().map(profile_from_row).collect())
    }

    /// Set or clear an opt-out flag.
    pub async fn set_opt_out(
        &self,
        user_id: &str,
        channel: OptChannel,
        opted_out: bool,
    ) -> Result<(), GavelError> {
        let sql = match channel {
            OptChannel::Email => "UPDATE members SET opt_out_email = ? WHERE user_id = ?",
            OptChannel::Dm => "UPDATE members SET opt_out_dm = ? WHERE user_id = ?",
        };
        sqlx::query(sql)
            .bind(opted_out as i64)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| GavelError::Store(format!("preference update failed: {e}")))?;

        Ok(())
    }

    /// Every distinct member email on file.
    pub async fn distinct_emails(&self) -> Result<Vec<String>, GavelError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT email FROM members \
             WHERE email IS NOT NULL AND email != '' ORDER BY email",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GavelError::Store(format!("query failed: {e}")))?;

        Ok(rows.into_iter().map(|(e,)| e).collect())
    }
}

fn profile_from_row(
    row: (String, String, String, String, Option<String>, i64, i64),
) -> MemberProfile {
    MemberProfile {
        user_id: row.0,
        username: row.1,
        first_name: row.2,
        last_name: row.3,
        email: row.4,
        opt_out_dm: row.5 != 0,
        opt_out_email: row.6 != 0,
    }
}
