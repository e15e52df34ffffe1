//! Platform publishing clients
//!
//! Every social network sits behind the same [`PublishClient`] contract:
//! hand it the copy (and optionally an image URL) and it answers with a
//! [`PublishReceipt`] or a [`PlatformError`]. The sweep never knows which
//! network it is talking to; it looks the client up in a
//! [`PlatformRegistry`] by [`Platform`].
//!
//! Adding a network is a registration:
//!
//! ```
//! use std::sync::Arc;
//! use libpostpilot::platforms::{mock::MockClient, PlatformRegistry};
//! use libpostpilot::Platform;
//!
//! let registry = PlatformRegistry::new()
//!     .with(Arc::new(MockClient::success(Platform::Facebook)))
//!     .with(Arc::new(MockClient::success(Platform::Linkedin)));
//!
//! assert!(registry.get(Platform::Facebook).is_some());
//! assert!(registry.get(Platform::Twitter).is_none());
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::PlatformsConfig;
use crate::error::PlatformError;
use crate::types::{Platform, PublishReceipt};

pub mod linkedin;
pub mod meta;
pub mod twitter;

// Available outside tests so integration tests and dry runs can use it.
pub mod mock;

pub use linkedin::LinkedInClient;
pub use meta::{FacebookClient, InstagramClient};
pub use twitter::TwitterClient;

pub type PublishResult<T> = std::result::Result<T, PlatformError>;

/// Blank and length checks shared by every client
pub fn validate_default(
    platform: Platform,
    character_limit: Option<usize>,
    content: &str,
) -> PublishResult<()> {
    if content.trim().is_empty() {
        return Err(PlatformError::Validation(format!(
            "{} content cannot be empty",
            platform
        )));
    }

    if let Some(limit) = character_limit {
        let length = content.chars().count();
        if length > limit {
            return Err(PlatformError::Validation(format!(
                "Content exceeds {}'s {} character limit (current: {} characters)",
                platform, limit, length
            )));
        }
    }

    Ok(())
}

#[async_trait]
pub trait PublishClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Maximum post length in characters, if the network has one
    fn character_limit(&self) -> Option<usize> {
        None
    }

    /// Check the copy before it is sent
    ///
    /// The default rejects blank copy and copy over `character_limit`.
    fn validate_content(&self, content: &str, _image_url: Option<&str>) -> PublishResult<()> {
        validate_default(self.platform(), self.character_limit(), content)
    }

    /// Publish `content` and return the network's receipt
    async fn publish(&self, content: &str, image_url: Option<&str>) -> PublishResult<PublishReceipt>;
}

/// Platform name to client mapping
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    clients: HashMap<Platform, Arc<dyn PublishClient>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` under its platform, replacing any previous one
    pub fn register(&mut self, client: Arc<dyn PublishClient>) -> Option<Arc<dyn PublishClient>> {
        self.clients.insert(client.platform(), client)
    }

    pub fn with(mut self, client: Arc<dyn PublishClient>) -> Self {
        self.register(client);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PublishClient>> {
        self.clients.get(&platform).cloned()
    }

    /// Registered platforms in canonical order
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.clients.keys().copied().collect();
        platforms.sort();
        platforms
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Build the built-in client for every enabled platform section
    pub fn from_config(config: &PlatformsConfig) -> Self {
        let mut registry = Self::new();

        for platform in config.enabled() {
            let Some(section) = config.get(platform) else {
                continue;
            };
            let credentials = ApiCredentials::new(
                section.access_token.clone(),
                section.latency.unwrap_or_default(),
            );
            if credentials.access_token.is_none() {
                warn!(
                    platform = %platform,
                    "No access token configured; publishes to {} will fail authentication",
                    platform
                );
            }

            let client: Arc<dyn PublishClient> = match platform {
                Platform::Facebook => Arc::new(FacebookClient::new(credentials)),
                Platform::Instagram => Arc::new(InstagramClient::new(credentials)),
                Platform::Twitter => Arc::new(TwitterClient::new(credentials)),
                Platform::Linkedin => Arc::new(LinkedInClient::new(credentials)),
            };
            info!(platform = %platform, "Registered publishing client");
            registry.register(client);
        }

        registry
    }
}

/// Access token and simulated latency shared by the built-in clients
pub struct ApiCredentials {
    access_token: Option<SecretString>,
    latency: Duration,
}

impl ApiCredentials {
    pub fn new(access_token: Option<String>, latency: Duration) -> Self {
        Self {
            access_token: access_token
                .filter(|token| !token.trim().is_empty())
                .map(SecretString::from),
            latency,
        }
    }

    /// The access token, or an authentication error naming the platform
    fn bearer(&self, platform: Platform) -> PublishResult<&str> {
        self.access_token
            .as_ref()
            .map(|token| token.expose_secret())
            .ok_or_else(|| {
                PlatformError::Authentication(format!(
                    "{} access token is not configured. Suggestion: set platforms.{}.access_token",
                    platform, platform
                ))
            })
    }

    /// Stand-in for the network's publish endpoint
    ///
    /// The networks are not called for real yet. This waits out the
    /// configured latency and mints a remote id from `prefix` and the
    /// current time in milliseconds.
    async fn simulate_publish(
        &self,
        platform: Platform,
        prefix: &str,
        content: &str,
        image_url: Option<&str>,
    ) -> PublishResult<PublishReceipt> {
        let _token = self.bearer(platform)?;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let remote_id = format!("{}-{}", prefix, chrono::Utc::now().timestamp_millis());
        info!(
            platform = %platform,
            remote_id = %remote_id,
            chars = content.chars().count(),
            has_image = image_url.is_some(),
            "Published to {}",
            platform
        );
        Ok(PublishReceipt::accepted(remote_id))
    }
}
