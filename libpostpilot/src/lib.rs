//! Postpilot - scheduled publishing for social posts
//!
//! This library finds posts whose scheduled time has passed, publishes each
//! to every platform it has copy for, and records the outcome, without two
//! sweeps ever publishing the same post twice.

pub mod clock;
pub mod config;
pub mod error;
pub mod lease;
pub mod logging;
pub mod platforms;
pub mod store;
pub mod sweep;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, SweepConfig, TotalFailurePolicy};
pub use error::{PlatformError, PostpilotError, PublishErrorKind, Result};
pub use lease::{InMemorySweepLock, SqliteSweepLock, SweepLock};
pub use platforms::{PlatformRegistry, PublishClient};
pub use store::{InMemoryPostStore, PostStore, SqlitePostStore};
pub use sweep::{PlatformOutcome, PostDisposition, SweepCancel, SweepResult, Sweeper};
pub use types::{Platform, Post, PostStatus, PublishReceipt};
