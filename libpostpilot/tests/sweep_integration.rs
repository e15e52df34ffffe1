//! End-to-end sweep behaviour against the in-memory store and mock clients

use async_trait::async_trait;
use libpostpilot::config::SweepConfig;
use libpostpilot::lease::{InMemorySweepLock, SweepLock};
use libpostpilot::platforms::mock::MockClient;
use libpostpilot::platforms::{PlatformRegistry, PublishClient, PublishResult};
use libpostpilot::store::{InMemoryPostStore, PostStore, StatusTransition};
use libpostpilot::{
    Clock, FixedClock, Platform, PlatformError, Post, PostDisposition, PostStatus,
    PostpilotError, PublishErrorKind, PublishReceipt, SweepCancel, Sweeper, TotalFailurePolicy,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const NOW: i64 = 1_700_000_000;

fn sweeper(store: &Arc<InMemoryPostStore>, registry: PlatformRegistry) -> Sweeper {
    Sweeper::new(
        store.clone(),
        Arc::new(InMemorySweepLock::new()),
        registry,
        SweepConfig::default(),
    )
}

fn config_with(f: impl FnOnce(&mut SweepConfig)) -> SweepConfig {
    let mut config = SweepConfig::default();
    f(&mut config);
    config
}

async fn stored(store: &InMemoryPostStore, id: &str) -> Post {
    store.get(id).await.unwrap().expect("post should exist")
}

#[tokio::test]
async fn test_only_platforms_with_copy_are_published() {
    // Targets facebook and instagram, but only facebook copy was generated.
    let post = Post::new("user-1", "Spring launch")
        .with_content(Platform::Facebook, "Hello")
        .with_platforms(vec![Platform::Facebook, Platform::Instagram])
        .scheduled_at(NOW - 60);
    let store = Arc::new(InMemoryPostStore::with_posts([post.clone()]));

    let facebook = MockClient::success(Platform::Facebook);
    let instagram = MockClient::success(Platform::Instagram);
    let (fb_calls, ig_calls) = (facebook.calls_handle(), instagram.calls_handle());
    let registry = PlatformRegistry::new()
        .with(Arc::new(facebook))
        .with(Arc::new(instagram));

    let result = sweeper(&store, registry).run_sweep(NOW).await.unwrap();

    assert_eq!(result.total_due, 1);
    assert_eq!(result.published, 1);
    assert_eq!(result.outcomes.len(), 1);
    assert_eq!(result.outcomes[0].platform, Platform::Facebook);
    assert!(result.outcomes[0].success);
    assert_eq!(fb_calls.lock().unwrap().len(), 1);
    assert_eq!(fb_calls.lock().unwrap()[0].content, "Hello");
    assert!(ig_calls.lock().unwrap().is_empty());

    let after = stored(&store, &post.id).await;
    assert_eq!(after.status, PostStatus::Published);
    assert_eq!(after.published_at, Some(NOW));
    assert_eq!(after.updated_at, NOW);
}

#[tokio::test]
async fn test_store_unavailable_aborts_before_any_publish() {
    let post = Post::new("user-1", "t")
        .with_content(Platform::Twitter, "tweet")
        .scheduled_at(NOW - 1);
    let store = Arc::new(InMemoryPostStore::with_posts([post]));
    store.set_unavailable(true);

    let twitter = MockClient::success(Platform::Twitter);
    let calls = twitter.calls_handle();

    let err = sweeper(&store, PlatformRegistry::new().with(Arc::new(twitter)))
        .run_sweep(NOW)
        .await
        .unwrap_err();

    assert!(err.is_store_unavailable());
    assert_eq!(err.exit_code(), 1);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(store.update_count(), 0);
}

#[tokio::test]
async fn test_one_platform_failing_does_not_block_the_other() {
    let post = Post::new("user-1", "t")
        .with_content(Platform::Twitter, "short")
        .with_content(Platform::Linkedin, "longer professional copy")
        .scheduled_at(NOW - 5);
    let store = Arc::new(InMemoryPostStore::with_posts([post.clone()]));
    let registry = PlatformRegistry::new()
        .with(Arc::new(MockClient::failure(
            Platform::Twitter,
            PlatformError::Network("connection reset".to_string()),
        )))
        .with(Arc::new(MockClient::success(Platform::Linkedin)));

    let result = sweeper(&store, registry).run_sweep(NOW).await.unwrap();

    assert_eq!(result.outcomes.len(), 2);
    let twitter = &result.outcomes[0];
    assert_eq!(twitter.platform, Platform::Twitter);
    assert!(!twitter.success);
    assert_eq!(twitter.error_kind, Some(PublishErrorKind::Network));
    assert!(twitter.error.as_deref().unwrap().contains("connection reset"));

    let linkedin = &result.outcomes[1];
    assert_eq!(linkedin.platform, Platform::Linkedin);
    assert!(linkedin.success);
    assert!(linkedin.remote_id.is_some());

    assert_eq!(result.successful_attempts(), 1);
    assert_eq!(result.failed_attempts(), 1);
    assert_eq!(result.published, 1);
    assert_eq!(stored(&store, &post.id).await.status, PostStatus::Published);
}

#[tokio::test]
async fn test_timeout_on_one_post_does_not_affect_another() {
    let slow = Post::new("user-1", "slow")
        .with_content(Platform::Twitter, "stuck")
        .scheduled_at(NOW - 20);
    let fast = Post::new("user-1", "fast")
        .with_content(Platform::Facebook, "quick")
        .scheduled_at(NOW - 10);
    let store = Arc::new(InMemoryPostStore::with_posts([slow.clone(), fast.clone()]));

    let registry = PlatformRegistry::new()
        .with(Arc::new(
            MockClient::success(Platform::Twitter).with_delay(Duration::from_secs(10)),
        ))
        .with(Arc::new(MockClient::success(Platform::Facebook)));
    let sweeper = Sweeper::new(
        store.clone(),
        Arc::new(InMemorySweepLock::new()),
        registry,
        config_with(|c| c.publish_timeout = Duration::from_millis(100)),
    );

    let started = Instant::now();
    let result = sweeper.run_sweep(NOW).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.outcomes[0].post_id, slow.id);
    assert_eq!(result.outcomes[0].error_kind, Some(PublishErrorKind::Timeout));
    assert_eq!(result.outcomes[1].post_id, fast.id);
    assert!(result.outcomes[1].success);

    assert_eq!(result.published, 1);
    assert_eq!(result.retained, 1);
    assert_eq!(stored(&store, &slow.id).await.status, PostStatus::Scheduled);
    assert_eq!(stored(&store, &fast.id).await.status, PostStatus::Published);
}

#[tokio::test]
async fn test_posts_not_due_are_untouched() {
    let future = Post::new("u", "future")
        .with_content(Platform::Facebook, "later")
        .scheduled_at(NOW + 1);
    let mut draft = Post::new("u", "draft").with_content(Platform::Facebook, "draft");
    draft.scheduled_for = Some(NOW - 100);
    let mut published = Post::new("u", "done")
        .with_content(Platform::Facebook, "done")
        .scheduled_at(NOW - 100);
    published.status = PostStatus::Published;
    published.published_at = Some(NOW - 90);
    let mut failed = Post::new("u", "failed")
        .with_content(Platform::Facebook, "failed")
        .scheduled_at(NOW - 100);
    failed.status = PostStatus::Failed;

    let store = Arc::new(InMemoryPostStore::with_posts([
        future, draft, published, failed,
    ]));
    let before = store.snapshot();

    let facebook = MockClient::success(Platform::Facebook);
    let calls = facebook.calls_handle();
    let result = sweeper(&store, PlatformRegistry::new().with(Arc::new(facebook)))
        .run_sweep(NOW)
        .await
        .unwrap();

    assert_eq!(result.total_due, 0);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(store.update_count(), 0);
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_each_platform_attempted_exactly_once() {
    let post = Post::new("u", "dupes")
        .with_content(Platform::Facebook, "fb")
        .with_content(Platform::Twitter, "tw")
        .with_platforms(vec![
            Platform::Facebook,
            Platform::Twitter,
            Platform::Facebook,
        ])
        .scheduled_at(NOW);
    let store = Arc::new(InMemoryPostStore::with_posts([post]));

    let facebook = MockClient::success(Platform::Facebook);
    let twitter = MockClient::success(Platform::Twitter);
    let (fb_calls, tw_calls) = (facebook.calls_handle(), twitter.calls_handle());

    let result = sweeper(
        &store,
        PlatformRegistry::new()
            .with(Arc::new(facebook))
            .with(Arc::new(twitter)),
    )
    .run_sweep(NOW)
    .await
    .unwrap();

    assert_eq!(fb_calls.lock().unwrap().len(), 1);
    assert_eq!(tw_calls.lock().unwrap().len(), 1);
    let platforms: Vec<Platform> = result.outcomes.iter().map(|o| o.platform).collect();
    assert_eq!(platforms, vec![Platform::Facebook, Platform::Twitter]);
}

#[tokio::test]
async fn test_second_sweep_does_not_republish() {
    let post = Post::new("u", "t")
        .with_content(Platform::Facebook, "once")
        .scheduled_at(NOW - 1);
    let store = Arc::new(InMemoryPostStore::with_posts([post.clone()]));
    let facebook = MockClient::success(Platform::Facebook);
    let calls = facebook.calls_handle();
    let sweeper = sweeper(&store, PlatformRegistry::new().with(Arc::new(facebook)));

    assert_eq!(sweeper.run_sweep(NOW).await.unwrap().published, 1);
    let second = sweeper.run_sweep(NOW + 60).await.unwrap();

    assert_eq!(second.total_due, 0);
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(stored(&store, &post.id).await.published_at, Some(NOW));
}

#[tokio::test]
async fn test_overlapping_sweeps_share_one_lease() {
    let post = Post::new("u", "t")
        .with_content(Platform::Facebook, "only once")
        .scheduled_at(NOW - 1);
    let store = Arc::new(InMemoryPostStore::with_posts([post.clone()]));
    let lock: Arc<dyn SweepLock> = Arc::new(InMemorySweepLock::new());

    let facebook = MockClient::success(Platform::Facebook).with_delay(Duration::from_millis(200));
    let calls = facebook.calls_handle();
    let registry = PlatformRegistry::new().with(Arc::new(facebook));

    let first = Sweeper::new(
        store.clone(),
        lock.clone(),
        registry.clone(),
        SweepConfig::default(),
    )
    .with_holder_id("worker-a");
    let second = Sweeper::new(store.clone(), lock, registry, SweepConfig::default())
        .with_holder_id("worker-b");

    let (a, b) = tokio::join!(first.run_sweep(NOW), second.run_sweep(NOW));

    assert_eq!(a.unwrap().published, 1);
    match b {
        Err(PostpilotError::SweepInProgress { holder }) => assert_eq!(holder, "worker-a"),
        other => panic!("Expected SweepInProgress, got {:?}", other),
    }
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(stored(&store, &post.id).await.status, PostStatus::Published);
}

#[tokio::test]
async fn test_unlocked_overlap_writes_status_once() {
    // Two sweepers on different lease names both pick up the post; only one
    // status write may land.
    let post = Post::new("u", "t")
        .with_content(Platform::Facebook, "race")
        .scheduled_at(NOW - 1);
    let store = Arc::new(InMemoryPostStore::with_posts([post.clone()]));
    let lock: Arc<dyn SweepLock> = Arc::new(InMemorySweepLock::new());
    let registry = PlatformRegistry::new().with(Arc::new(
        MockClient::success(Platform::Facebook).with_delay(Duration::from_millis(100)),
    ));

    let first = Sweeper::new(
        store.clone(),
        lock.clone(),
        registry.clone(),
        config_with(|c| c.lease_name = "sweep-a".to_string()),
    );
    let second = Sweeper::new(
        store.clone(),
        lock,
        registry,
        config_with(|c| c.lease_name = "sweep-b".to_string()),
    );

    let later = NOW + 30;
    let (a, b) = tokio::join!(first.run_sweep(NOW), second.run_sweep(later));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.published + b.published, 1);
    assert_eq!(a.conflicts + b.conflicts, 1);

    let after = stored(&store, &post.id).await;
    assert_eq!(after.status, PostStatus::Published);
    let winner_time = if a.published == 1 { NOW } else { later };
    assert_eq!(after.published_at, Some(winner_time));
}

/// A client whose publish call lets another writer change the post first
struct InterferingClient {
    store: Arc<InMemoryPostStore>,
    post_id: String,
}

#[async_trait]
impl PublishClient for InterferingClient {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    async fn publish(&self, _content: &str, _image_url: Option<&str>) -> PublishResult<PublishReceipt> {
        self.store
            .update_status(&self.post_id, StatusTransition::fail(NOW - 1))
            .await
            .unwrap();
        Ok(PublishReceipt::accepted("li-1"))
    }
}

#[tokio::test]
async fn test_status_changed_mid_sweep_is_conflict() {
    let post = Post::new("u", "t")
        .with_content(Platform::Linkedin, "copy")
        .scheduled_at(NOW - 1);
    let store = Arc::new(InMemoryPostStore::with_posts([post.clone()]));
    let registry = PlatformRegistry::new().with(Arc::new(InterferingClient {
        store: store.clone(),
        post_id: post.id.clone(),
    }));

    let result = sweeper(&store, registry).run_sweep(NOW).await.unwrap();

    assert_eq!(result.conflicts, 1);
    assert_eq!(result.published, 0);
    assert_eq!(result.posts[0].disposition, PostDisposition::Conflict);
    assert!(result.outcomes[0].success);

    let after = stored(&store, &post.id).await;
    assert_eq!(after.status, PostStatus::Failed);
    assert_eq!(after.published_at, None);
}

#[tokio::test]
async fn test_cancelled_before_start_publishes_nothing() {
    let posts: Vec<Post> = (0..3)
        .map(|i| {
            Post::new("u", format!("post {}", i))
                .with_content(Platform::Facebook, "copy")
                .scheduled_at(NOW - 10 + i)
        })
        .collect();
    let store = Arc::new(InMemoryPostStore::with_posts(posts));
    let facebook = MockClient::success(Platform::Facebook);
    let calls = facebook.calls_handle();

    let cancel = SweepCancel::new();
    cancel.cancel();

    let result = sweeper(&store, PlatformRegistry::new().with(Arc::new(facebook)))
        .run_sweep_with_cancel(NOW, &cancel)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.total_due, 3);
    assert_eq!(result.skipped_posts, 3);
    assert!(calls.lock().unwrap().is_empty());
    assert!(store
        .snapshot()
        .iter()
        .all(|p| p.status == PostStatus::Scheduled));
}

/// Cancels the sweep from inside the first publish call
struct CancellingClient {
    cancel: SweepCancel,
    inner: MockClient,
}

#[async_trait]
impl PublishClient for CancellingClient {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn publish(&self, content: &str, image_url: Option<&str>) -> PublishResult<PublishReceipt> {
        self.cancel.cancel();
        self.inner.publish(content, image_url).await
    }
}

#[tokio::test]
async fn test_cancel_mid_sweep_finishes_in_flight_post() {
    let posts: Vec<Post> = (0..3)
        .map(|i| {
            Post::new("u", format!("post {}", i))
                .with_content(Platform::Facebook, "copy")
                .scheduled_at(NOW - 10 + i)
        })
        .collect();
    let first_id = posts[0].id.clone();
    let store = Arc::new(InMemoryPostStore::with_posts(posts));

    let cancel = SweepCancel::new();
    let inner = MockClient::success(Platform::Facebook).with_delay(Duration::from_millis(50));
    let calls = inner.calls_handle();
    let registry = PlatformRegistry::new().with(Arc::new(CancellingClient {
        cancel: cancel.clone(),
        inner,
    }));
    let sweeper = Sweeper::new(
        store.clone(),
        Arc::new(InMemorySweepLock::new()),
        registry,
        config_with(|c| c.max_concurrent_posts = 1),
    );

    let result = sweeper.run_sweep_with_cancel(NOW, &cancel).await.unwrap();

    assert!(result.cancelled);
    assert_eq!(result.published, 1);
    assert_eq!(result.skipped_posts, 2);
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(stored(&store, &first_id).await.status, PostStatus::Published);
}

#[tokio::test]
async fn test_total_failure_retry_policy_keeps_post_scheduled() {
    let post = Post::new("u", "t")
        .with_content(Platform::Twitter, "copy")
        .scheduled_at(NOW - 1);
    let store = Arc::new(InMemoryPostStore::with_posts([post.clone()]));
    let registry = PlatformRegistry::new().with(Arc::new(MockClient::failure(
        Platform::Twitter,
        PlatformError::RateLimit("slow down".to_string()),
    )));

    let result = sweeper(&store, registry).run_sweep(NOW).await.unwrap();

    assert_eq!(result.retained, 1);
    assert_eq!(result.posts[0].disposition, PostDisposition::Retained);
    assert_eq!(store.update_count(), 0);
    let after = stored(&store, &post.id).await;
    assert_eq!(after, post);
}

#[tokio::test]
async fn test_total_failure_fail_policy_marks_failed() {
    let post = Post::new("u", "t")
        .with_content(Platform::Twitter, "copy")
        .scheduled_at(NOW - 1);
    let store = Arc::new(InMemoryPostStore::with_posts([post.clone()]));
    let registry = PlatformRegistry::new().with(Arc::new(MockClient::failure(
        Platform::Twitter,
        PlatformError::Authentication("token expired".to_string()),
    )));
    let sweeper = Sweeper::new(
        store.clone(),
        Arc::new(InMemorySweepLock::new()),
        registry,
        config_with(|c| c.on_total_failure = TotalFailurePolicy::Fail),
    );

    let result = sweeper.run_sweep(NOW).await.unwrap();

    assert_eq!(result.failed, 1);
    let after = stored(&store, &post.id).await;
    assert_eq!(after.status, PostStatus::Failed);
    assert_eq!(after.published_at, None);
    assert_eq!(after.updated_at, NOW);
}

#[tokio::test]
async fn test_post_without_copy_is_marked_failed() {
    let post = Post::new("u", "empty")
        .with_content(Platform::Facebook, "   ")
        .with_platforms(vec![Platform::Facebook, Platform::Instagram])
        .scheduled_at(NOW - 1);
    let store = Arc::new(InMemoryPostStore::with_posts([post.clone()]));
    let facebook = MockClient::success(Platform::Facebook);
    let calls = facebook.calls_handle();

    let result = sweeper(&store, PlatformRegistry::new().with(Arc::new(facebook)))
        .run_sweep(NOW)
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    assert!(result.outcomes.is_empty());
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(stored(&store, &post.id).await.status, PostStatus::Failed);
}

#[tokio::test]
async fn test_outcomes_follow_due_order_under_concurrency() {
    let posts: Vec<Post> = (0..6)
        .map(|i| {
            Post::new("u", format!("post {}", i))
                .with_content(Platform::Facebook, format!("copy {}", i))
                .scheduled_at(NOW - 100 + i)
        })
        .collect();
    let expected: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
    let store = Arc::new(InMemoryPostStore::with_posts(posts));
    let registry = PlatformRegistry::new().with(Arc::new(
        MockClient::success(Platform::Facebook).with_delay(Duration::from_millis(20)),
    ));

    let result = sweeper(&store, registry).run_sweep(NOW).await.unwrap();

    let order: Vec<String> = result.posts.iter().map(|p| p.post_id.clone()).collect();
    assert_eq!(order, expected);
    assert_eq!(result.published, 6);
}

#[tokio::test]
async fn test_built_in_clients_from_config() {
    let config = libpostpilot::Config::from_toml(
        r#"
[database]
path = "unused.db"

[platforms.facebook]
access_token = "fb-token"

[platforms.instagram]
access_token = "ig-token"
"#,
    )
    .unwrap();
    let registry = PlatformRegistry::from_config(&config.platforms);

    let post = Post::new("u", "t")
        .with_content(Platform::Facebook, "Posted from config")
        .with_content(Platform::Instagram, "No image, so this one fails")
        .scheduled_at(NOW - 1);
    let store = Arc::new(InMemoryPostStore::with_posts([post]));

    let result = sweeper(&store, registry).run_sweep(NOW).await.unwrap();

    assert_eq!(result.published, 1);
    assert!(result.outcomes[0]
        .remote_id
        .as_deref()
        .unwrap()
        .starts_with("fb-"));
    assert_eq!(
        result.outcomes[1].error_kind,
        Some(PublishErrorKind::Validation)
    );
}

/// Moves a shared clock forward by `step` seconds on every publish
struct SlowClient {
    clock: Arc<FixedClock>,
    step: i64,
    inner: MockClient,
}

#[async_trait]
impl PublishClient for SlowClient {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn publish(&self, content: &str, image_url: Option<&str>) -> PublishResult<PublishReceipt> {
        self.clock.advance(self.step);
        self.inner.publish(content, image_url).await
    }
}

fn due_posts(count: i64) -> Vec<Post> {
    (0..count)
        .map(|i| {
            Post::new("u", format!("post {}", i))
                .with_content(Platform::Facebook, "copy")
                .scheduled_at(NOW - 60 + i)
        })
        .collect()
}

#[tokio::test]
async fn test_sweep_longer_than_lease_ttl_keeps_the_lease() {
    // Six posts at 100s each run well past the 300s lease.
    let store = Arc::new(InMemoryPostStore::with_posts(due_posts(6)));
    let lock: Arc<dyn SweepLock> = Arc::new(InMemorySweepLock::new());
    let clock = Arc::new(FixedClock::new(NOW));

    let inner = MockClient::success(Platform::Facebook).with_delay(Duration::from_millis(100));
    let calls = inner.calls_handle();
    let registry = PlatformRegistry::new().with(Arc::new(SlowClient {
        clock: clock.clone(),
        step: 100,
        inner,
    }));
    let config = config_with(|c| c.max_concurrent_posts = 1);
    let lease_ttl = config.lease_ttl.as_secs() as i64;

    let long = Sweeper::new(store.clone(), lock.clone(), registry.clone(), config.clone())
        .with_clock(clock.clone())
        .with_holder_id("worker-a");
    let late = Sweeper::new(store.clone(), lock, registry, config).with_holder_id("worker-b");

    let late_run = async {
        let deadline = Instant::now() + Duration::from_secs(5);
        while clock.now() <= NOW + lease_ttl + 1 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        late.run_sweep(clock.now()).await
    };

    let (a, b) = tokio::join!(long.run_sweep(NOW), late_run);

    let a = a.unwrap();
    assert_eq!(a.published, 6);
    assert!(!a.lease_lost);
    match b {
        Err(PostpilotError::SweepInProgress { holder }) => assert_eq!(holder, "worker-a"),
        other => panic!("Expected SweepInProgress, got {:?}", other),
    }
    assert_eq!(calls.lock().unwrap().len(), 6);
    assert!(store
        .snapshot()
        .iter()
        .all(|p| p.status == PostStatus::Published));
}

/// Takes the sweep lease for another holder during the first publish
struct LeaseStealingClient {
    lock: Arc<InMemorySweepLock>,
    inner: MockClient,
}

#[async_trait]
impl PublishClient for LeaseStealingClient {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn publish(&self, content: &str, image_url: Option<&str>) -> PublishResult<PublishReceipt> {
        self.lock
            .try_acquire(
                libpostpilot::config::DEFAULT_LEASE_NAME,
                "intruder",
                NOW + 10_000,
                Duration::from_secs(300),
            )
            .await
            .unwrap();
        self.inner.publish(content, image_url).await
    }
}

#[tokio::test]
async fn test_lost_lease_stops_starting_posts() {
    let posts = due_posts(6);
    let first_id = posts[0].id.clone();
    let store = Arc::new(InMemoryPostStore::with_posts(posts));
    let lock = Arc::new(InMemorySweepLock::new());

    let inner = MockClient::success(Platform::Facebook);
    let calls = inner.calls_handle();
    let registry = PlatformRegistry::new().with(Arc::new(LeaseStealingClient {
        lock: lock.clone(),
        inner,
    }));
    let sweeper = Sweeper::new(
        store.clone(),
        lock.clone(),
        registry,
        config_with(|c| c.max_concurrent_posts = 1),
    )
    .with_clock(Arc::new(FixedClock::new(NOW)));

    let result = sweeper.run_sweep(NOW).await.unwrap();

    assert!(result.lease_lost);
    assert!(!result.cancelled);
    assert_eq!(result.total_due, 6);
    assert_eq!(result.published, 1);
    assert_eq!(result.skipped_posts, 5);
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(stored(&store, &first_id).await.status, PostStatus::Published);
    assert_eq!(
        lock.holder(libpostpilot::config::DEFAULT_LEASE_NAME).as_deref(),
        Some("intruder")
    );
}
