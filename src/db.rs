use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    models::ROLE_ADMIN,
    pricing::DEFAULT_PRICES,
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_admin(pool).await?;
    seed_prices(pool).await?;
    Ok(())
}

/// Best-effort audit trail shown on the admin dashboard. Failures are ignored,
/// the feed is informational only.
pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    booking_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, booking_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(booking_id)
    .execute(pool)
    .await;
}

async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>(
        "SELECT id FROM users WHERE role = ? LIMIT 1",
    )
    .bind(ROLE_ADMIN)
    .fetch_optional(pool)
    .await?;

    if existing.is_some() {
        return Ok(());
    }

    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@portergo.local".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    let name = env::var("ADMIN_NAME").unwrap_or_else(|_| "Platform Admin".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash = hash_password(&password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO users (id, name, email, role, password_hash, approved, phone, created_at)
           VALUES (?, ?, ?, ?, ?, 1, NULL, ?)"#,
    )
    .bind(new_id())
    .bind(name)
    .bind(email)
    .bind(ROLE_ADMIN)
    .bind(password_hash)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_prices(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for (bag_type, unit_price) in DEFAULT_PRICES {
        let exists = sqlx::query_as::<_, (String,)>(
            "SELECT bag_type FROM prices WHERE bag_type = ? LIMIT 1",
        )
        .bind(bag_type)
        .fetch_optional(pool)
        .await?;
        if exists.is_some() {
            continue;
        }
        sqlx::query("INSERT INTO prices (bag_type, unit_price, updated_at) VALUES (?, ?, ?)")
            .bind(bag_type)
            .bind(unit_price)
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await?;
    }
    Ok(())
}
