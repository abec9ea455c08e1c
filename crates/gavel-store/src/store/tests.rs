use super::{OptChannel, Store};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Create an in-memory store for testing.
async fn test_store() -> Store {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap();
    Store::run_migrations(&pool).await.unwrap();
    Store { pool }
}

#[tokio::test]
async fn test_totals_empty() {
    let store = test_store().await;
    let (count, effective) = store.attendance_totals("nobody").await.unwrap();
    assert_eq!(count, 0);
    assert_eq!(effective, 0.0);
}

#[tokio::test]
async fn test_record_and_totals() {
    let store = test_store().await;
    for _ in 0..3 {
        store.record_attendance("u1", 1.0).await.unwrap();
    }
    let (count, effective) = store.attendance_totals("u1").await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(effective, 3.0);

    // Bonus meeting: two attended, three effective.
    store.record_attendance("u2", 1.0).await.unwrap();
    store.record_attendance("u2", 2.0).await.unwrap();
    let (count, effective) = store.attendance_totals("u2").await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(effective, 3.0);
}

#[tokio::test]
async fn test_attendance_dates_in_order() {
    let store = test_store().await;
    sqlx::query("INSERT INTO attendance (user_id, time, effective) VALUES (?, ?, ?)")
        .bind("u1")
        .bind("2026-02-01 18:00:00")
        .bind(2.0)
        .execute(store.pool())
        .await
        .unwrap();
    sqlx::query("INSERT INTO attendance (user_id, time, effective) VALUES (?, ?, ?)")
        .bind("u1")
        .bind("2026-01-01 18:00:00")
        .bind(1.0)
        .execute(store.pool())
        .await
        .unwrap();

    let dates = store.attendance_dates("u1").await.unwrap();
    assert_eq!(dates.len(), 2);
    assert!(dates[0].0.starts_with("2026-01-01"));
    assert_eq!(dates[0].1, 1.0);
    assert!(dates[1].0.starts_with("2026-02-01"));
    assert_eq!(dates[1].1, 2.0);
}

#[tokio::test]
async fn test_attended_today_window() {
    let store = test_store().await;
    store.upsert_member("u1", "alice").await.unwrap();
    store
        .update_profile("u1", "Alice", "Anders", None)
        .await
        .unwrap();
    store.upsert_member("u2", "bob").await.unwrap();

    // One record now, one in the distant past.
    store.record_attendance("u1", 1.0).await.unwrap();
    sqlx::query("INSERT INTO attendance (user_id, time, effective) VALUES (?, ?, ?)")
        .bind("u2")
        .bind("2020-01-01 18:00:00")
        .bind(1.0)
        .execute(store.pool())
        .await
        .unwrap();

    let today = store.attended_today().await.unwrap();
    assert_eq!(today, vec!["Alice Anders"]);
}

#[tokio::test]
async fn test_summary_ordering_and_name_fallback() {
    let store = test_store().await;
    store.upsert_member("u1", "alice").await.unwrap();
    store
        .update_profile("u1", "Alice", "Anders", None)
        .await
        .unwrap();
    store.upsert_member("u2", "bob").await.unwrap();

    store.record_attendance("u1", 1.0).await.unwrap();
    store.record_attendance("u2", 1.0).await.unwrap();
    store.record_attendance("u2", 2.5).await.unwrap();

    let summary = store.attendance_summary().await.unwrap();
    assert_eq!(summary.len(), 2);
    // Bob leads on effective total and falls back to his username.
    assert_eq!(summary[0].0, "bob");
    assert_eq!(summary[0].1, 2);
    assert_eq!(summary[0].2, 3.5);
    assert_eq!(summary[1].0, "Alice Anders");
}

#[tokio::test]
async fn test_opt_flags() {
    let store = test_store().await;
    store.upsert_member("u1", "alice").await.unwrap();

    store.set_opt_out("u1", OptChannel::Dm, true).await.unwrap();
    let m = store.member("u1").await.unwrap().unwrap();
    assert!(m.opt_out_dm);
    assert!(!m.opt_out_email);

    store
        .set_opt_out("u1", OptChannel::Email, true)
        .await
        .unwrap();
    store.set_opt_out("u1", OptChannel::Dm, false).await.unwrap();
    let m = store.member("u1").await.unwrap().unwrap();
    assert!(!m.opt_out_dm);
    assert!(m.opt_out_email);
}

#[tokio::test]
async fn test_upsert_keeps_profile() {
    let store = test_store().await;
    store.upsert_member("u1", "alice").await.unwrap();
    store
        .update_profile("u1", "Alice", "Anders", Some("alice@school.edu"))
        .await
        .unwrap();

    // A later roster upsert must not clobber onboarding data.
    store.upsert_member("u1", "alice2").await.unwrap();
    let m = store.member("u1").await.unwrap().unwrap();
    assert_eq!(m.username, "alice2");
    assert_eq!(m.first_name, "Alice");
    assert_eq!(m.email.as_deref(), Some("alice@school.edu"));
}

#[tokio::test]
async fn test_distinct_emails() {
    let store = test_store().await;
    store.upsert_member("u1", "alice").await.unwrap();
    store.upsert_member("u2", "bob").await.unwrap();
    store.upsert_member("u3", "carol").await.unwrap();
    store
        .update_profile("u1", "", "", Some("shared@school.edu"))
        .await
        .unwrap();
    store
        .update_profile("u2", "", "", Some("shared@school.edu"))
        .await
        .unwrap();

    let emails = store.distinct_emails().await.unwrap();
    assert_eq!(emails, vec!["shared@school.edu"]);
}

#[tokio::test]
async fn test_roster() {
    let store = test_store().await;
    store.upsert_member("u1", "alice").await.unwrap();
    store.upsert_member("u2", "bob").await.unwrap();

    let roster = store.roster().await.unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(store.member_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_raw_select() {
    let store = test_store().await;
    store.upsert_member("u1", "alice").await.unwrap();
    store.record_attendance("u1", 1.5).await.unwrap();

    let (cols, rows) = store
        .raw_select("SELECT user_id, effective FROM attendance")
        .await
        .unwrap();
    assert_eq!(cols, vec!["user_id", "effective"]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "u1");
    assert_eq!(rows[0][1], "1.5");

    // Empty result set keeps the call well-formed.
    let (cols, rows) = store
        .raw_select("SELECT user_id FROM attendance WHERE user_id = 'none'")
        .await
        .unwrap();
    assert!(cols.is_empty());
    assert!(rows.is_empty());

    // Bad SQL surfaces as a store error.
    assert!(store.raw_select("SELECT nope FROM missing").await.is_err());
}
