use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::avatar::AvatarStyle;
use crate::db;
use crate::types::{Gender, User};

async fn open_in(dir: &Path, style: AvatarStyle) -> SqlitePool {
    db::open(&dir.join("nested").join("dir").join("users.db"), 1, style).await.unwrap()
}

#[tokio::test]
async fn test_open_creates_directory_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_in(dir.path(), AvatarStyle::Portrait).await;

    assert!(dir.path().join("nested/dir/users.db").is_file());

    let columns: Vec<String> = sqlx::query("PRAGMA table_info(users)")
        .fetch_all(&pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();
    for expected in ["id", "name", "email", "age", "gender", "avatar_url", "created_at"] {
        assert!(columns.iter().any(|c| c == expected), "missing column {}", expected);
    }
}

#[tokio::test]
async fn test_empty_table_is_seeded_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_in(dir.path(), AvatarStyle::Portrait).await;

    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY id").fetch_all(&pool).await.unwrap();
    assert_eq!(users.len(), 10);
    assert_eq!(users[0].name, "John Doe");
    assert_eq!(users[0].gender, Some(Gender::Male));
    assert_eq!(users[9].email, "ivy@example.com");
    assert!(users.iter().all(|u| u.avatar_url.as_deref().is_some_and(|a| !a.is_empty())));
    assert!(users.iter().all(|u| !u.created_at.is_empty()));

    // Re-running initialization does not seed again
    db::init_db(&pool, AvatarStyle::Portrait).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 10);
}

#[tokio::test]
async fn test_backfill_fills_missing_avatars_only() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_in(dir.path(), AvatarStyle::Initials).await;

    sqlx::query("UPDATE users SET avatar_url = NULL WHERE id = 2").execute(&pool).await.unwrap();
    sqlx::query("UPDATE users SET avatar_url = '' WHERE id = 3").execute(&pool).await.unwrap();
    sqlx::query("UPDATE users SET avatar_url = 'https://example.com/keep.png' WHERE id = 4")
        .execute(&pool)
        .await
        .unwrap();

    let filled = db::backfill_avatars(&pool, AvatarStyle::Initials).await.unwrap();
    assert_eq!(filled, 2);

    let avatar = |id: i64| {
        let pool = pool.clone();
        async move {
            sqlx::query_scalar::<_, String>("SELECT avatar_url FROM users WHERE id = ?1")
                .bind(id)
                .fetch_one(&pool)
                .await
                .unwrap()
        }
    };
    assert_eq!(avatar(2).await, "https://ui-avatars.com/api/?name=JS&background=random");
    assert_eq!(avatar(3).await, "https://ui-avatars.com/api/?name=BJ&background=random");
    assert_eq!(avatar(4).await, "https://example.com/keep.png");

    assert_eq!(db::backfill_avatars(&pool, AvatarStyle::Initials).await.unwrap(), 0);
}

#[tokio::test]
async fn test_legacy_table_is_upgraded_and_backfilled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    // Layout of a database written before gender/avatars existed
    {
        let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
        let legacy = SqlitePoolOptions::new().max_connections(1).connect_with(options).await.unwrap();
        sqlx::query(
            r#"CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                age INTEGER,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )"#,
        )
        .execute(&legacy)
        .await
        .unwrap();
        sqlx::query("INSERT INTO users (name, email, age) VALUES ('Old Timer', 'old@example.com', 70)")
            .execute(&legacy)
            .await
            .unwrap();
        legacy.close().await;
    }

    let pool = db::open(&path, 1, AvatarStyle::Portrait).await.unwrap();
    let user: User = sqlx::query_as("SELECT * FROM users WHERE email = 'old@example.com'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(user.name, "Old Timer");
    assert_eq!(user.gender, None);
    assert!(user.avatar_url.unwrap().starts_with("https://randomuser.me/api/portraits/"));

    // Not empty, so no sample rows were added
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_legacy_timestamps_are_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    {
        let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
        let legacy = SqlitePoolOptions::new().max_connections(1).connect_with(options).await.unwrap();
        sqlx::query(
            r#"CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                age INTEGER,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )"#,
        )
        .execute(&legacy)
        .await
        .unwrap();
        sqlx::query(
            r#"INSERT INTO users (name, email, created_at) VALUES
                ('Old Morning', 'morning@example.com', '2024-01-02 10:00:00'),
                ('Old Evening', 'evening@example.com', '2024-01-02 21:30:00')"#,
        )
        .execute(&legacy)
        .await
        .unwrap();
        legacy.close().await;
    }

    let pool = db::open(&path, 1, AvatarStyle::Portrait).await.unwrap();

    // A row written after the upgrade, on a later day
    sqlx::query("INSERT INTO users (name, email, created_at) VALUES ('New', 'new@example.com', '2024-01-03T08:00:00Z')")
        .execute(&pool)
        .await
        .unwrap();

    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT email, created_at FROM users ORDER BY created_at DESC, id DESC")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![
            ("new@example.com".to_string(), "2024-01-03T08:00:00Z".to_string()),
            ("evening@example.com".to_string(), "2024-01-02T21:30:00Z".to_string()),
            ("morning@example.com".to_string(), "2024-01-02T10:00:00Z".to_string()),
        ]
    );
    db::close(&pool).await;

    // Reopening leaves already-normalized values alone
    let pool = db::open(&path, 1, AvatarStyle::Portrait).await.unwrap();
    let stamp: String = sqlx::query_scalar("SELECT created_at FROM users WHERE email = 'morning@example.com'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stamp, "2024-01-02T10:00:00Z");
}

#[tokio::test]
async fn test_storage_enforces_constraints() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_in(dir.path(), AvatarStyle::Portrait).await;

    let dup = sqlx::query("INSERT INTO users (name, email) VALUES ('X', 'john@example.com')")
        .execute(&pool)
        .await
        .unwrap_err();
    match dup {
        sqlx::Error::Database(e) => assert!(e.is_unique_violation()),
        other => panic!("Expected database error, got {:?}", other),
    }

    let bad_gender = sqlx::query("INSERT INTO users (name, email, gender) VALUES ('Y', 'y@example.com', 'other')")
        .execute(&pool)
        .await;
    assert!(bad_gender.is_err());
}

#[tokio::test]
async fn test_open_fails_when_directory_cannot_be_created() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let result = db::open(&blocker.join("users.db"), 1, AvatarStyle::Portrait).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_close_then_queries_fail() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_in(dir.path(), AvatarStyle::Portrait).await;
    db::close(&pool).await;
    assert!(pool.is_closed());
    assert!(sqlx::query("SELECT 1").fetch_one(&pool).await.is_err());
}
