//! Meta Graph API clients (Facebook pages and Instagram business accounts)

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::platforms::{validate_default, ApiCredentials, PublishClient, PublishResult};
use crate::types::{Platform, PublishReceipt};

pub const FACEBOOK_CHARACTER_LIMIT: usize = 63_206;
pub const INSTAGRAM_CHARACTER_LIMIT: usize = 2_200;

pub struct FacebookClient {
    credentials: ApiCredentials,
}

impl FacebookClient {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl PublishClient for FacebookClient {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn character_limit(&self) -> Option<usize> {
        Some(FACEBOOK_CHARACTER_LIMIT)
    }

    async fn publish(&self, content: &str, image_url: Option<&str>) -> PublishResult<PublishReceipt> {
        self.validate_content(content, image_url)?;
        self.credentials
            .simulate_publish(Platform::Facebook, "fb", content, image_url)
            .await
    }
}

/// Instagram only accepts posts that carry an image
pub struct InstagramClient {
    credentials: ApiCredentials,
}

impl InstagramClient {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl PublishClient for InstagramClient {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn character_limit(&self) -> Option<usize> {
        Some(INSTAGRAM_CHARACTER_LIMIT)
    }

    fn validate_content(&self, content: &str, image_url: Option<&str>) -> PublishResult<()> {
        if image_url.map_or(true, |url| url.trim().is_empty()) {
            return Err(PlatformError::Validation(
                "Instagram posts require an image URL".to_string(),
            ));
        }

        validate_default(Platform::Instagram, self.character_limit(), content)
    }

    async fn publish(&self, content: &str, image_url: Option<&str>) -> PublishResult<PublishReceipt> {
        self.validate_content(content, image_url)?;
        self.credentials
            .simulate_publish(Platform::Instagram, "ig", content, image_url)
            .await
    }
}
