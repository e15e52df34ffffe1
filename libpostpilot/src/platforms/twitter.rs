//! Twitter / X client

use async_trait::async_trait;

use crate::platforms::{ApiCredentials, PublishClient, PublishResult};
use crate::types::{Platform, PublishReceipt};

pub const TWITTER_CHARACTER_LIMIT: usize = 280;

pub struct TwitterClient {
    credentials: ApiCredentials,
}

impl TwitterClient {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl PublishClient for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn character_limit(&self) -> Option<usize> {
        Some(TWITTER_CHARACTER_LIMIT)
    }

    async fn publish(&self, content: &str, image_url: Option<&str>) -> PublishResult<PublishReceipt> {
        self.validate_content(content, image_url)?;
        self.credentials
            .simulate_publish(Platform::Twitter, "tw", content, image_url)
            .await
    }
}
