//! SQLite-backed post store

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::store::{PostStore, StatusTransition, StatusUpdate};
use crate::types::{Platform, Post, PostStatus};

const POST_COLUMNS: &str = "id, user_id, title, description, content, platforms, image_url, \
                            status, scheduled_for, published_at, created_at, updated_at";

#[derive(Clone)]
pub struct SqlitePostStore {
    pool: SqlitePool,
}

impl SqlitePostStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // Forward slashes keep the URL valid on Windows; mode=rwc creates the file.
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> Result<Self> {
        // Each connection to :memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::SqlxError)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Shared pool, so the sweep lease can live in the same database
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode_post(row: &SqliteRow) -> Result<Post> {
    let id: String = row.get("id");
    let corrupt = |reason: String| StoreError::Decode {
        post_id: id.clone(),
        reason,
    };

    let content: BTreeMap<Platform, String> =
        serde_json::from_str(&row.get::<String, _>("content"))
            .map_err(|e| corrupt(format!("content: {}", e)))?;
    let platforms: Vec<Platform> = serde_json::from_str(&row.get::<String, _>("platforms"))
        .map_err(|e| corrupt(format!("platforms: {}", e)))?;
    let status: PostStatus = row
        .get::<String, _>("status")
        .parse()
        .map_err(corrupt)?;

    Ok(Post {
        id: id.clone(),
        user_id: row.get("user_id"),
        title: row.get("title"),
        description: row.get("description"),
        content,
        platforms,
        image_url: row.get("image_url"),
        status,
        scheduled_for: row.get("scheduled_for"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn encode_json<T: serde::Serialize>(post_id: &str, field: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        StoreError::Decode {
            post_id: post_id.to_string(),
            reason: format!("{}: {}", field, e),
        }
        .into()
    })
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn query_due(&self, now: i64) -> Result<Vec<Post>> {
        let query = format!(
            r#"
            SELECT {}
            FROM posts
            WHERE status = 'scheduled'
              AND scheduled_for IS NOT NULL
              AND scheduled_for <= ?
            ORDER BY scheduled_for ASC, id ASC
            "#,
            POST_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        rows.iter().map(decode_post).collect()
    }

    async fn update_status(
        &self,
        post_id: &str,
        transition: StatusTransition,
    ) -> Result<StatusUpdate> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = ?,
                published_at = COALESCE(published_at, ?),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(transition.new.as_str())
        .bind(transition.published_at)
        .bind(transition.updated_at)
        .bind(post_id)
        .bind(transition.expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(if result.rows_affected() == 1 {
            StatusUpdate::Applied
        } else {
            StatusUpdate::Conflict
        })
    }

    async fn insert(&self, post: &Post) -> Result<()> {
        let content = encode_json(&post.id, "content", &post.content)?;
        let platforms = encode_json(&post.id, "platforms", &post.platforms)?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, user_id, title, description, content, platforms, image_url,
                               status, scheduled_for, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(content)
        .bind(platforms)
        .bind(&post.image_url)
        .bind(post.status.as_str())
        .bind(post.scheduled_for)
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    async fn get(&self, post_id: &str) -> Result<Option<Post>> {
        let query = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);

        let row = sqlx::query(&query)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        row.as_ref().map(decode_post).transpose()
    }
}
