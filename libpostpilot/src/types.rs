//! Core types for Postpilot

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Social networks a post can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Twitter,
        Platform::Linkedin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "twitter" | "x" => Ok(Platform::Twitter),
            "linkedin" => Ok(Platform::Linkedin),
            other => Err(format!(
                "Unknown platform: '{}'. Valid options: facebook, instagram, twitter, linkedin",
                other
            )),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a post
///
/// Only `Scheduled` posts are eligible for the sweep. `Published` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(format!("Unknown post status: '{}'", other)),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A generated campaign post with per-platform copy
///
/// Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    /// Generated copy per platform. A missing key means nothing was generated.
    pub content: BTreeMap<Platform, String>,
    /// Target platforms, in publishing order
    pub platforms: Vec<Platform>,
    pub image_url: Option<String>,
    pub status: PostStatus,
    pub scheduled_for: Option<i64>,
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Post {
    /// Create a draft post owned by `user_id`
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            description: String::new(),
            content: BTreeMap::new(),
            platforms: Vec::new(),
            image_url: None,
            status: PostStatus::Draft,
            scheduled_for: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add generated copy for a platform and target it
    pub fn with_content(mut self, platform: Platform, text: impl Into<String>) -> Self {
        self.content.insert(platform, text.into());
        if !self.platforms.contains(&platform) {
            self.platforms.push(platform);
        }
        self
    }

    /// Replace the target platform list without touching the copy
    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Mark the post as scheduled for `at`
    pub fn scheduled_at(mut self, at: i64) -> Self {
        self.status = PostStatus::Scheduled;
        self.scheduled_for = Some(at);
        self
    }

    /// A post is due iff it is scheduled and its time has arrived
    pub fn is_due(&self, now: i64) -> bool {
        self.status == PostStatus::Scheduled && self.scheduled_for.is_some_and(|at| at <= now)
    }

    /// Copy for `platform`, or `None` when absent or blank
    pub fn content_for(&self, platform: Platform) -> Option<&str> {
        self.content
            .get(&platform)
            .map(String::as_str)
            .filter(|text| !text.trim().is_empty())
    }

    /// Platforms that will receive a publish attempt, in list order.
    ///
    /// Platforms without copy are skipped and repeated entries collapse
    /// to the first occurrence.
    pub fn publish_targets(&self) -> Vec<(Platform, &str)> {
        let mut seen = Vec::with_capacity(self.platforms.len());
        let mut targets = Vec::new();
        for platform in &self.platforms {
            if seen.contains(platform) {
                continue;
            }
            seen.push(*platform);
            if let Some(text) = self.content_for(*platform) {
                targets.push((*platform, text));
            }
        }
        targets
    }
}

/// What a platform client answered for one publish call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub success: bool,
    pub remote_id: String,
}

impl PublishReceipt {
    pub fn accepted(remote_id: impl Into<String>) -> Self {
        Self {
            success: true,
            remote_id: remote_id.into(),
        }
    }

    pub fn refused(remote_id: impl Into<String>) -> Self {
        Self {
            success: false,
            remote_id: remote_id.into(),
        }
    }
}
