//! Mock publishing client for testing
//!
//! Configurable to succeed, fail with any `PlatformError`, answer
//! `success: false`, or stall. Every call is recorded so tests can assert on
//! exactly what was published and how many times.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::{PublishClient, PublishResult};
use crate::types::{Platform, PublishReceipt};

/// How the mock answers a publish call
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed,
    Fail(PlatformError),
    /// Answer a receipt with `success: false`
    Refuse,
}

/// One recorded publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCall {
    pub content: String,
    pub image_url: Option<String>,
}

pub struct MockClient {
    platform: Platform,
    behavior: MockBehavior,
    delay: Duration,
    character_limit: Option<usize>,
    calls: Arc<Mutex<Vec<PublishCall>>>,
}

impl MockClient {
    pub fn new(platform: Platform, behavior: MockBehavior) -> Self {
        Self {
            platform,
            behavior,
            delay: Duration::ZERO,
            character_limit: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A client that always succeeds
    pub fn success(platform: Platform) -> Self {
        Self::new(platform, MockBehavior::Succeed)
    }

    /// A client that always fails with `error`
    pub fn failure(platform: Platform, error: PlatformError) -> Self {
        Self::new(platform, MockBehavior::Fail(error))
    }

    /// A client that answers `success: false`
    pub fn refusing(platform: Platform) -> Self {
        Self::new(platform, MockBehavior::Refuse)
    }

    /// Wait `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_character_limit(mut self, limit: usize) -> Self {
        self.character_limit = Some(limit);
        self
    }

    /// Shared handle to the call log; stays valid after the client moves
    /// into a registry.
    pub fn calls_handle(&self) -> Arc<Mutex<Vec<PublishCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PublishClient for MockClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn character_limit(&self) -> Option<usize> {
        self.character_limit
    }

    async fn publish(&self, content: &str, image_url: Option<&str>) -> PublishResult<PublishReceipt> {
        self.calls.lock().unwrap().push(PublishCall {
            content: content.to_string(),
            image_url: image_url.map(str::to_string),
        });

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match &self.behavior {
            MockBehavior::Succeed => Ok(PublishReceipt::accepted(format!(
                "{}:mock-{}",
                self.platform,
                uuid::Uuid::new_v4()
            ))),
            MockBehavior::Refuse => Ok(PublishReceipt::refused(String::new())),
            MockBehavior::Fail(error) => Err(error.clone()),
        }
    }
}
