//! In-process post store
//!
//! Used by tests and dry runs. Every operation holds one mutex for its whole
//! duration, so the conditional status write is atomic with respect to
//! other callers sharing the store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{PostpilotError, Result, StoreError};
use crate::store::{PostStore, StatusTransition, StatusUpdate};
use crate::types::Post;

#[derive(Default)]
pub struct InMemoryPostStore {
    posts: Mutex<BTreeMap<String, Post>>,
    unavailable: AtomicBool,
    query_count: AtomicUsize,
    update_count: AtomicUsize,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store
    pub fn with_posts(posts: impl IntoIterator<Item = Post>) -> Self {
        let store = Self::new();
        {
            let mut map = store.lock();
            for post in posts {
                map.insert(post.id.clone(), post);
            }
        }
        store
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    /// Copy of every stored post, ordered by id
    pub fn snapshot(&self) -> Vec<Post> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Post>> {
        self.posts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn query_due(&self, now: i64) -> Result<Vec<Post>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut due: Vec<Post> = self
            .lock()
            .values()
            .filter(|post| post.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.scheduled_for
                .cmp(&b.scheduled_for)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(due)
    }

    async fn update_status(
        &self,
        post_id: &str,
        transition: StatusTransition,
    ) -> Result<StatusUpdate> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut posts = self.lock();
        let Some(post) = posts.get_mut(post_id) else {
            return Ok(StatusUpdate::Conflict);
        };
        if post.status != transition.expected {
            return Ok(StatusUpdate::Conflict);
        }

        post.status = transition.new;
        if post.published_at.is_none() {
            post.published_at = transition.published_at;
        }
        post.updated_at = transition.updated_at;
        Ok(StatusUpdate::Applied)
    }

    async fn insert(&self, post: &Post) -> Result<()> {
        self.check_available()?;

        let mut posts = self.lock();
        if posts.contains_key(&post.id) {
            return Err(PostpilotError::InvalidInput(format!(
                "post {} already exists",
                post.id
            )));
        }
        posts.insert(post.id.clone(), post.clone());
        Ok(())
    }

    async fn get(&self, post_id: &str) -> Result<Option<Post>> {
        self.check_available()?;
        Ok(self.lock().get(post_id).cloned())
    }
}
