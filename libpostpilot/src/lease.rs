//! Named, expiring leases that keep sweeps from overlapping
//!
//! A lease is a row `(name, holder, expires_at)`. Acquiring succeeds when no
//! row exists, when the existing row has expired, or when the caller already
//! holds it. The SQLite variant does this in a single upsert, so any number
//! of processes sharing the database agree on one holder.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Outcome of a lease attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseAttempt {
    Acquired { expires_at: i64 },
    Held { holder: String, expires_at: i64 },
}

impl LeaseAttempt {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LeaseAttempt::Acquired { .. })
    }
}

#[async_trait]
pub trait SweepLock: Send + Sync {
    async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        now: i64,
        ttl: Duration,
    ) -> Result<LeaseAttempt>;

    /// Drop the lease if `holder` still owns it
    async fn release(&self, name: &str, holder: &str) -> Result<()>;
}

fn expiry(now: i64, ttl: Duration) -> i64 {
    let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
    now.saturating_add(secs)
}

/// Lease table in the post database
#[derive(Clone)]
pub struct SqliteSweepLock {
    pool: SqlitePool,
}

impl SqliteSweepLock {
    /// The pool must come from a migrated `SqlitePostStore`
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SweepLock for SqliteSweepLock {
    async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        now: i64,
        ttl: Duration,
    ) -> Result<LeaseAttempt> {
        let expires_at = expiry(now, ttl);

        let result = sqlx::query(
            r#"
            INSERT INTO sweep_leases (name, holder, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE
            SET holder = excluded.holder,
                expires_at = excluded.expires_at
            WHERE sweep_leases.expires_at <= ?
               OR sweep_leases.holder = excluded.holder
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        if result.rows_affected() == 1 {
            return Ok(LeaseAttempt::Acquired { expires_at });
        }

        let row = sqlx::query("SELECT holder, expires_at FROM sweep_leases WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        match row {
            Some(row) => Ok(LeaseAttempt::Held {
                holder: row.get("holder"),
                expires_at: row.get("expires_at"),
            }),
            // Released between the two statements.
            None => Err(StoreError::Unavailable(format!(
                "lease {} changed hands while being acquired",
                name
            ))
            .into()),
        }
    }

    async fn release(&self, name: &str, holder: &str) -> Result<()> {
        sqlx::query("DELETE FROM sweep_leases WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;
        Ok(())
    }
}

/// Lease map for a single process
#[derive(Default)]
pub struct InMemorySweepLock {
    leases: Mutex<HashMap<String, (String, i64)>>,
}

impl InMemorySweepLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of `name`, expired or not
    pub fn holder(&self, name: &str) -> Option<String> {
        self.lock().get(name).map(|(holder, _)| holder.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, i64)>> {
        self.leases.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SweepLock for InMemorySweepLock {
    async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        now: i64,
        ttl: Duration,
    ) -> Result<LeaseAttempt> {
        let mut leases = self.lock();
        if let Some((current, expires_at)) = leases.get(name) {
            if current != holder && *expires_at > now {
                return Ok(LeaseAttempt::Held {
                    holder: current.clone(),
                    expires_at: *expires_at,
                });
            }
        }

        let expires_at = expiry(now, ttl);
        leases.insert(name.to_string(), (holder.to_string(), expires_at));
        Ok(LeaseAttempt::Acquired { expires_at })
    }

    async fn release(&self, name: &str, holder: &str) -> Result<()> {
        let mut leases = self.lock();
        if leases.get(name).is_some_and(|(current, _)| current == holder) {
            leases.remove(name);
        }
        Ok(())
    }
}
