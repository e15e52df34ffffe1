//! Post persistence
//!
//! The sweep only needs two things from storage: the list of due posts and
//! a conditional status write. Both backends implement the same contract:
//!
//! - `query_due(now)` returns posts with `status = scheduled` and
//!   `scheduled_for <= now`, ordered by `scheduled_for` then `id`.
//! - `update_status` applies a transition only while the post is still in
//!   the expected status. Anything else, including an unknown id, answers
//!   `StatusUpdate::Conflict` and leaves the row untouched.
//! - `published_at` is written at most once.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Post, PostStatus};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryPostStore;
pub use sqlite::SqlitePostStore;

/// A conditional status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    /// Status the post must still have for the write to apply
    pub expected: PostStatus,
    pub new: PostStatus,
    pub published_at: Option<i64>,
    pub updated_at: i64,
}

impl StatusTransition {
    pub fn publish(now: i64) -> Self {
        Self {
            expected: PostStatus::Scheduled,
            new: PostStatus::Published,
            published_at: Some(now),
            updated_at: now,
        }
    }

    pub fn fail(now: i64) -> Self {
        Self {
            expected: PostStatus::Scheduled,
            new: PostStatus::Failed,
            published_at: None,
            updated_at: now,
        }
    }
}

/// Result of a conditional status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Applied,
    /// The post was no longer in the expected status
    Conflict,
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Posts that are due at `now`, oldest schedule first
    async fn query_due(&self, now: i64) -> Result<Vec<Post>>;

    /// Apply `transition` to `post_id` if its status still matches
    async fn update_status(&self, post_id: &str, transition: StatusTransition)
        -> Result<StatusUpdate>;

    async fn insert(&self, post: &Post) -> Result<()>;

    async fn get(&self, post_id: &str) -> Result<Option<Post>>;
}
