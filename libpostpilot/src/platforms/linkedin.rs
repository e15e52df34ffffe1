//! LinkedIn client

use async_trait::async_trait;

use crate::platforms::{ApiCredentials, PublishClient, PublishResult};
use crate::types::{Platform, PublishReceipt};

pub const LINKEDIN_CHARACTER_LIMIT: usize = 3_000;

pub struct LinkedInClient {
    credentials: ApiCredentials,
}

impl LinkedInClient {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl PublishClient for LinkedInClient {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    fn character_limit(&self) -> Option<usize> {
        Some(LINKEDIN_CHARACTER_LIMIT)
    }

    async fn publish(&self, content: &str, image_url: Option<&str>) -> PublishResult<PublishReceipt> {
        self.validate_content(content, image_url)?;
        self.credentials
            .simulate_publish(Platform::Linkedin, "li", content, image_url)
            .await
    }
}
