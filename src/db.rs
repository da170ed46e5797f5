use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::avatar::{self, AvatarStyle};
use crate::types::Gender;

const SAMPLE_USERS: &[(&str, &str, i64, Gender)] = &[
    ("John Doe", "john@example.com", 30, Gender::Male),
    ("Jane Smith", "jane@example.com", 25, Gender::Female),
    ("Bob Johnson", "bob@example.com", 35, Gender::Male),
    ("Alice Williams", "alice@example.com", 28, Gender::Female),
    ("Charlie Brown", "charlie@example.com", 32, Gender::Male),
    ("Eve Green", "eve@example.com", 27, Gender::Female),
    ("Frank White", "frank@example.com", 31, Gender::Male),
    ("Grace Black", "grace@example.com", 29, Gender::Female),
    ("Harry Red", "harry@example.com", 33, Gender::Male),
    ("Ivy Blue", "ivy@example.com", 26, Gender::Female),
];

/// Opens (or creates) the database file and prepares the schema and data.
///
/// The returned pool is only handed out once seeding/backfill has finished.
pub async fn open(path: &Path, max_connections: u32, style: AvatarStyle) -> anyhow::Result<SqlitePool> {
    let pool = connect(path, max_connections).await?;
    init_db(&pool, style).await?;
    Ok(pool)
}

pub async fn connect(path: &Path, max_connections: u32) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {}", parent.display()))?;
    }
    tracing::info!("Opening SQLite database at {}", path.display());
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool, style: AvatarStyle) -> anyhow::Result<()> {
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            age INTEGER NULL,
            gender TEXT NULL CHECK (gender IN ('male', 'female')),
            avatar_url TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await
    .context("failed to create users table")?;

    // Files created before gender/avatars existed lack these columns
    for column in ["gender", "avatar_url"] {
        let query = format!("ALTER TABLE users ADD COLUMN {} TEXT NULL", column);
        if let Err(e) = sqlx::query(&query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err)
                    if db_err.message().to_lowercase().contains("duplicate column") => {}
                _ => {
                    tracing::error!("Failed to add {} column to users: {}", column, e);
                    return Err(anyhow::anyhow!("Migration failed: {}", e));
                }
            }
        }
    }

    // Older files stored `YYYY-MM-DD HH:MM:SS`; rewrite them so ordering and output match new rows
    let normalized = sqlx::query(
        r#"UPDATE users SET created_at = strftime('%Y-%m-%dT%H:%M:%SZ', created_at)
           WHERE created_at NOT LIKE '%T%' AND strftime('%Y-%m-%dT%H:%M:%SZ', created_at) IS NOT NULL"#,
    )
    .execute(pool)
    .await
    .context("failed to normalize created_at timestamps")?
    .rows_affected();
    if normalized > 0 {
        tracing::info!("Normalized {} legacy created_at timestamps", normalized);
    }

    if let Err(e) = sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_created ON users(created_at DESC, id DESC)")
        .execute(pool)
        .await
    {
        tracing::warn!("Failed to create index idx_users_created: {}", e);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await?;
    if count == 0 {
        seed_sample_users(pool, style).await?;
    } else {
        backfill_avatars(pool, style).await?;
    }

    Ok(())
}

async fn seed_sample_users(pool: &SqlitePool, style: AvatarStyle) -> anyhow::Result<()> {
    let avatars: Vec<String> = {
        let mut rng = rand::thread_rng();
        SAMPLE_USERS
            .iter()
            .map(|(name, _, _, gender)| avatar::generate(name, Some(*gender), style, &mut rng))
            .collect()
    };

    let mut tx = pool.begin().await?;
    for ((name, email, age, gender), avatar_url) in SAMPLE_USERS.iter().zip(avatars) {
        sqlx::query("INSERT INTO users (name, email, age, gender, avatar_url) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(*name)
            .bind(*email)
            .bind(*age)
            .bind(*gender)
            .bind(avatar_url)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!("Inserted {} sample users", SAMPLE_USERS.len());
    Ok(())
}

/// Writes a freshly derived avatar to every row that has none.
pub async fn backfill_avatars(pool: &SqlitePool, style: AvatarStyle) -> anyhow::Result<u64> {
    let rows: Vec<(i64, String, Option<Gender>)> =
        sqlx::query_as("SELECT id, name, gender FROM users WHERE avatar_url IS NULL OR avatar_url = ''")
            .fetch_all(pool)
            .await?;
    if rows.is_empty() {
        return Ok(0);
    }

    let updates: Vec<(i64, String)> = {
        let mut rng = rand::thread_rng();
        rows.into_iter()
            .map(|(id, name, gender)| (id, avatar::generate(&name, gender, style, &mut rng)))
            .collect()
    };

    let mut tx = pool.begin().await?;
    for (id, avatar_url) in &updates {
        sqlx::query("UPDATE users SET avatar_url = ?1 WHERE id = ?2")
            .bind(avatar_url)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!("Backfilled avatars for {} users", updates.len());
    Ok(updates.len() as u64)
}

/// Flushes the WAL and closes every pooled connection.
pub async fn close(pool: &SqlitePool) {
    if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);").execute(pool).await {
        tracing::error!("Failed to checkpoint database before close: {}", e);
    }
    pool.close().await;
}
