//! Local state store: migrations, remembered token, notifications and the
//! tracker's last-seen stages.

use std::str::FromStr;

use chrono::Utc;
use foodshare_lifecycle::{DonationId, Stage};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{ClientError, Result};
use crate::notifications::{NewNotification, NotificationRecord};

/// Key under which a remembered session token is stored.
pub const AUTH_TOKEN_KEY: &str = "foodshare.auth_token";

/// Open (creating if needed) the SQLite state file and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("State database ready at {url}");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Key/value state
// ─────────────────────────────────────────────────────────

pub async fn get_state(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM client_state WHERE key = ?1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(v,)| v))
}

pub async fn set_state(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO client_state (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_state(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM client_state WHERE key = ?1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────

/// SQLite integers are signed; ids past `i64::MAX` cannot be stored.
fn sql_id(donation: DonationId) -> Result<i64> {
    i64::try_from(donation.0).map_err(|_| ClientError::IdOutOfRange(donation.0))
}

/// Append a notification; returns its row id.
pub async fn enqueue_notification(pool: &SqlitePool, n: &NewNotification) -> Result<i64> {
    let donation_id = n.donation_id.map(sql_id).transpose()?;
    let id = sqlx::query(
        r#"
        INSERT INTO notifications (donation_id, kind, title, body, read, created_at)
        VALUES (?1, ?2, ?3, ?4, 0, ?5)
        "#,
    )
    .bind(donation_id)
    .bind(n.kind.as_str())
    .bind(&n.title)
    .bind(&n.body)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Newest first.
pub async fn list_notifications(
    pool: &SqlitePool,
    unread_only: bool,
) -> Result<Vec<NotificationRecord>> {
    let rows = sqlx::query_as::<_, NotificationRecord>(
        r#"
        SELECT id, donation_id, kind, title, body, read, created_at
        FROM   notifications
        WHERE  (?1 = 0 OR read = 0)
        ORDER  BY id DESC
        "#,
    )
    .bind(unread_only)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns `false` when no such notification exists.
pub async fn mark_notification_read(pool: &SqlitePool, id: i64) -> Result<bool> {
    let affected = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

// ─────────────────────────────────────────────────────────
// Tracker stages
// ─────────────────────────────────────────────────────────

pub async fn get_tracked_stage(pool: &SqlitePool, donation: DonationId) -> Result<Option<Stage>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT stage FROM tracked_donations WHERE donation_id = ?1")
            .bind(sql_id(donation)?)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(s,)| Stage::from_str_lossy(&s)))
}

pub async fn save_tracked_stage(pool: &SqlitePool, donation: DonationId, stage: Stage) -> Result<()> {
    sqlx::query(
        "INSERT INTO tracked_donations (donation_id, stage, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(donation_id) DO UPDATE SET stage = excluded.stage, updated_at = excluded.updated_at",
    )
    .bind(sql_id(donation)?)
    .bind(stage.as_str())
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}
