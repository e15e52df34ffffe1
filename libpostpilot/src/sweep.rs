//! Scheduled publish sweep
//!
//! One sweep:
//!
//! 1. takes the sweep lease, or returns `SweepInProgress` if another
//!    sweeper holds it. The lease is renewed before every post starts, so it
//!    outlives any sweep whose posts each finish within `lease_ttl`;
//! 2. asks the store for due posts (a failure here ends the sweep before
//!    any client is called);
//! 3. publishes every due post to each of its platforms that has copy,
//!    several posts at a time and all platforms of a post at once;
//! 4. once all of a post's attempts are back, writes its new status with a
//!    conditional update on `status = scheduled`;
//! 5. releases the lease.
//!
//! A platform failure (error, refusal, timeout, missing client) is recorded
//! against that platform only. Store failures end the sweep.
//!
//! # Partial failures
//!
//! - any platform succeeded: the post becomes `published`;
//! - no platform had copy: the post becomes `failed`;
//! - every attempt failed: [`TotalFailurePolicy`] decides between leaving
//!   it `scheduled` for the next sweep and marking it `failed`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use libpostpilot::config::SweepConfig;
//! use libpostpilot::lease::InMemorySweepLock;
//! use libpostpilot::platforms::{mock::MockClient, PlatformRegistry};
//! use libpostpilot::store::InMemoryPostStore;
//! use libpostpilot::sweep::Sweeper;
//! use libpostpilot::{Platform, Post};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> libpostpilot::Result<()> {
//! let now = 1_700_000_000;
//! let post = Post::new("user-1", "Launch")
//!     .with_content(Platform::Facebook, "We're live!")
//!     .scheduled_at(now - 60);
//!
//! let sweeper = Sweeper::new(
//!     Arc::new(InMemoryPostStore::with_posts([post])),
//!     Arc::new(InMemorySweepLock::new()),
//!     PlatformRegistry::new().with(Arc::new(MockClient::success(Platform::Facebook))),
//!     SweepConfig::default(),
//! );
//!
//! let result = sweeper.run_sweep(now).await?;
//! assert_eq!(result.published, 1);
//! # Ok(())
//! # }
//! ```

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{SweepConfig, TotalFailurePolicy};
use crate::error::{PlatformError, PostpilotError, PublishErrorKind, Result};
use crate::lease::{LeaseAttempt, SweepLock};
use crate::platforms::PlatformRegistry;
use crate::store::{PostStore, StatusTransition, StatusUpdate};
use crate::types::{Platform, Post, PostStatus};

/// Result of one publish attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformOutcome {
    pub post_id: String,
    pub platform: Platform,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<PublishErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlatformOutcome {
    fn succeeded(post_id: &str, platform: Platform, remote_id: String) -> Self {
        Self {
            post_id: post_id.to_string(),
            platform,
            success: true,
            remote_id: Some(remote_id),
            error_kind: None,
            error: None,
        }
    }

    fn failed(post_id: &str, platform: Platform, error: &PlatformError) -> Self {
        Self {
            post_id: post_id.to_string(),
            platform,
            success: false,
            remote_id: None,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
        }
    }
}

/// What the sweep did with a due post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostDisposition {
    Published,
    Failed,
    /// Left `scheduled` for the next sweep
    Retained,
    /// Another sweep changed the post first; nothing was written
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub post_id: String,
    pub disposition: PostDisposition,
    pub attempts: usize,
    pub successes: usize,
}

/// Report of one sweep, in due order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SweepResult {
    pub started_at: i64,
    pub total_due: usize,
    pub published: usize,
    pub failed: usize,
    pub retained: usize,
    pub conflicts: usize,
    /// Due posts never started, because of cancellation or a lost lease
    pub skipped_posts: usize,
    pub cancelled: bool,
    /// Another holder took the lease mid-sweep
    pub lease_lost: bool,
    pub posts: Vec<PostSummary>,
    pub outcomes: Vec<PlatformOutcome>,
}

impl SweepResult {
    fn empty(now: i64) -> Self {
        Self {
            started_at: now,
            ..Default::default()
        }
    }

    fn record(&mut self, processed: Processed) {
        match processed.summary.disposition {
            PostDisposition::Published => self.published += 1,
            PostDisposition::Failed => self.failed += 1,
            PostDisposition::Retained => self.retained += 1,
            PostDisposition::Conflict => self.conflicts += 1,
        }
        self.posts.push(processed.summary);
        self.outcomes.extend(processed.outcomes);
    }

    pub fn successful_attempts(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed_attempts(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// External stop signal for a sweep
///
/// Once cancelled (or past the deadline) no further post is started.
/// Posts already in flight finish, status write included.
#[derive(Debug, Clone, Default)]
pub struct SweepCancel {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl SweepCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing flag, e.g. one flipped by a signal handler
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self {
            flag,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// One processed post: its summary, its outcomes, and the store error that
/// stopped its status write, if any.
struct Processed {
    summary: PostSummary,
    outcomes: Vec<PlatformOutcome>,
    error: Option<PostpilotError>,
}

pub struct Sweeper {
    store: Arc<dyn PostStore>,
    lock: Arc<dyn SweepLock>,
    registry: PlatformRegistry,
    config: SweepConfig,
    clock: Arc<dyn Clock>,
    holder_id: String,
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn PostStore>,
        lock: Arc<dyn SweepLock>,
        registry: PlatformRegistry,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            lock,
            registry,
            config,
            clock: Arc::new(SystemClock),
            holder_id: format!(
                "sweeper-{}-{}",
                std::process::id(),
                uuid::Uuid::new_v4().simple()
            ),
        }
    }

    /// Override the lease holder identity (defaults to pid + random suffix)
    pub fn with_holder_id(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = holder_id.into();
        self
    }

    /// Clock that measures how far a running sweep has advanced past its
    /// `now`, for lease renewals
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run one sweep at `now` (Unix seconds)
    pub async fn run_sweep(&self, now: i64) -> Result<SweepResult> {
        self.run_sweep_with_cancel(now, &SweepCancel::new()).await
    }

    pub async fn run_sweep_with_cancel(
        &self,
        now: i64,
        cancel: &SweepCancel,
    ) -> Result<SweepResult> {
        let lease_name = self.config.lease_name.as_str();

        match self
            .lock
            .try_acquire(lease_name, &self.holder_id, now, self.config.lease_ttl)
            .await
        {
            Ok(LeaseAttempt::Acquired { expires_at }) => {
                debug!(lease = lease_name, holder = %self.holder_id, expires_at, "Sweep lease acquired");
            }
            Ok(LeaseAttempt::Held { holder, expires_at }) => {
                info!(
                    lease = lease_name,
                    holder = %holder,
                    expires_at,
                    "Sweep already running elsewhere, skipping this run"
                );
                return Err(PostpilotError::SweepInProgress { holder });
            }
            Err(e) => {
                error!("Failed to acquire sweep lease: {}", e);
                return Err(e);
            }
        }

        let clock_start = self.clock.now();
        let result = self.sweep_due(now, clock_start, cancel).await;

        if let Err(e) = self.lock.release(lease_name, &self.holder_id).await {
            warn!(lease = lease_name, "Failed to release sweep lease: {}", e);
        }

        result
    }

    /// Extend the lease before a post starts; `false` once it is gone
    async fn renew_lease(&self, now: i64, clock_start: i64) -> bool {
        let lease_name = self.config.lease_name.as_str();
        let at = now.saturating_add((self.clock.now() - clock_start).max(0));

        match self
            .lock
            .try_acquire(lease_name, &self.holder_id, at, self.config.lease_ttl)
            .await
        {
            Ok(LeaseAttempt::Acquired { .. }) => true,
            Ok(LeaseAttempt::Held { holder, .. }) => {
                warn!(
                    lease = lease_name,
                    holder = %holder,
                    "Sweep lease taken over by {}, starting no further posts",
                    holder
                );
                false
            }
            Err(e) => {
                warn!(lease = lease_name, "Failed to renew sweep lease: {}", e);
                false
            }
        }
    }

    async fn sweep_due(
        &self,
        now: i64,
        clock_start: i64,
        cancel: &SweepCancel,
    ) -> Result<SweepResult> {
        let due = match self.store.query_due(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to query due posts: {}", e);
                return Err(e);
            }
        };

        let mut result = SweepResult::empty(now);
        result.total_due = due.len();

        if due.is_empty() {
            debug!("No posts due");
            return Ok(result);
        }

        info!(total_due = due.len(), "Found {} post(s) due for publishing", due.len());

        let aborted = AtomicBool::new(false);
        let lease_lost = AtomicBool::new(false);
        let processed: Vec<Option<Processed>> = stream::iter(due)
            .map(|post| {
                let (aborted, lease_lost) = (&aborted, &lease_lost);
                async move {
                    if cancel.is_cancelled()
                        || aborted.load(Ordering::SeqCst)
                        || lease_lost.load(Ordering::SeqCst)
                    {
                        return None;
                    }
                    if !self.renew_lease(now, clock_start).await {
                        lease_lost.store(true, Ordering::SeqCst);
                        return None;
                    }
                    let processed = self.process_post(post, now).await;
                    if processed.error.is_some() {
                        aborted.store(true, Ordering::SeqCst);
                    }
                    Some(processed)
                }
            })
            .buffered(self.config.max_concurrent_posts.max(1))
            .collect()
            .await;

        let mut first_error = None;
        for item in processed {
            match item {
                Some(mut processed) => {
                    if let Some(e) = processed.error.take() {
                        first_error.get_or_insert(e);
                    }
                    result.record(processed);
                }
                None => result.skipped_posts += 1,
            }
        }

        if let Some(e) = first_error {
            error!(
                published = result.published,
                attempts = result.outcomes.len(),
                "Sweep aborted by store failure: {}",
                e
            );
            return Err(e);
        }

        result.lease_lost = lease_lost.load(Ordering::SeqCst);
        if result.skipped_posts > 0 && !result.lease_lost {
            result.cancelled = true;
            warn!(
                skipped = result.skipped_posts,
                "Sweep cancelled before {} due post(s) started",
                result.skipped_posts
            );
        }

        info!(
            total_due = result.total_due,
            published = result.published,
            failed = result.failed,
            retained = result.retained,
            conflicts = result.conflicts,
            skipped = result.skipped_posts,
            failed_attempts = result.failed_attempts(),
            "Sweep finished"
        );

        Ok(result)
    }

    /// Publish one post everywhere it has copy, then record its status
    async fn process_post(&self, post: Post, now: i64) -> Processed {
        let targets = post.publish_targets();
        debug!(
            post_id = %post.id,
            platforms = targets.len(),
            "Publishing post"
        );

        let outcomes: Vec<PlatformOutcome> = join_all(
            targets
                .into_iter()
                .map(|(platform, text)| self.attempt(&post, platform, text)),
        )
        .await;

        let attempts = outcomes.len();
        let successes = outcomes.iter().filter(|o| o.success).count();

        let transition = if successes > 0 {
            Some(StatusTransition::publish(now))
        } else if attempts == 0 {
            warn!(post_id = %post.id, "Post has no copy for any of its platforms, marking failed");
            Some(StatusTransition::fail(now))
        } else {
            match self.config.on_total_failure {
                TotalFailurePolicy::Retry => None,
                TotalFailurePolicy::Fail => Some(StatusTransition::fail(now)),
            }
        };

        let mut summary = PostSummary {
            post_id: post.id.clone(),
            disposition: PostDisposition::Retained,
            attempts,
            successes,
        };

        let Some(transition) = transition else {
            warn!(
                post_id = %post.id,
                attempts,
                "Every platform failed, leaving post scheduled for the next sweep"
            );
            return Processed {
                summary,
                outcomes,
                error: None,
            };
        };

        match self.store.update_status(&post.id, transition).await {
            Ok(StatusUpdate::Applied) => {
                summary.disposition = if transition.new == PostStatus::Published {
                    PostDisposition::Published
                } else {
                    PostDisposition::Failed
                };
                info!(
                    post_id = %post.id,
                    status = %transition.new,
                    successes,
                    attempts,
                    "Post marked {}",
                    transition.new
                );
                Processed {
                    summary,
                    outcomes,
                    error: None,
                }
            }
            Ok(StatusUpdate::Conflict) => {
                summary.disposition = PostDisposition::Conflict;
                info!(
                    post_id = %post.id,
                    "Post was no longer scheduled, another sweep already handled it"
                );
                Processed {
                    summary,
                    outcomes,
                    error: None,
                }
            }
            Err(e) => {
                error!(post_id = %post.id, "Failed to record post status: {}", e);
                Processed {
                    summary,
                    outcomes,
                    error: Some(e),
                }
            }
        }
    }

    /// One publish call, bounded by the publish timeout
    async fn attempt(&self, post: &Post, platform: Platform, text: &str) -> PlatformOutcome {
        let Some(client) = self.registry.get(platform) else {
            let error = PlatformError::NotConfigured(platform.to_string());
            warn!(post_id = %post.id, platform = %platform, "{}", error);
            return PlatformOutcome::failed(&post.id, platform, &error);
        };

        let timeout = self.config.publish_timeout;
        let answer = tokio::time::timeout(timeout, client.publish(text, post.image_url.as_deref())).await;

        let outcome = match answer {
            Ok(Ok(receipt)) if receipt.success => {
                PlatformOutcome::succeeded(&post.id, platform, receipt.remote_id)
            }
            Ok(Ok(receipt)) => {
                let mut outcome = PlatformOutcome::failed(
                    &post.id,
                    platform,
                    &PlatformError::Rejected(format!("{} did not accept the post", platform)),
                );
                if !receipt.remote_id.is_empty() {
                    outcome.remote_id = Some(receipt.remote_id);
                }
                outcome
            }
            Ok(Err(e)) => PlatformOutcome::failed(&post.id, platform, &e),
            Err(_) => PlatformOutcome::failed(&post.id, platform, &PlatformError::Timeout(timeout)),
        };

        if outcome.success {
            info!(
                post_id = %post.id,
                platform = %platform,
                remote_id = outcome.remote_id.as_deref().unwrap_or_default(),
                "Published to {}",
                platform
            );
        } else {
            warn!(
                post_id = %post.id,
                platform = %platform,
                error = outcome.error.as_deref().unwrap_or_default(),
                "Failed to publish to {}",
                platform
            );
        }

        outcome
    }
}
