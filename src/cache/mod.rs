//! Result cache for scan targets.
//!
//! Entries are keyed by `sha1(account|region|service|bucket)` where the bucket
//! is the wall-clock time divided by a fixed width. A hit additionally
//! requires the entry to be younger than the TTL. Lookups try the current
//! bucket and then the previous one, so a run shortly after a bucket boundary
//! still finds the entries written just before it.
//!
//! Every failure in here is swallowed: a broken cache behaves like an empty
//! one.

pub mod store;

pub use store::{CacheStore, FileCacheStore, MemoryCacheStore};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use tracing::debug;

use crate::error::CacheError;
use crate::probes::ResourceRecord;
use crate::scan::target::ScanTarget;

/// Cached result of one successful probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub target: ScanTarget,
    pub written_at: DateTime<Utc>,
    pub records: Vec<ResourceRecord>,
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests
#[cfg(test)]
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Compute the cache key for a target in a given bucket
pub fn cache_key(target: &ScanTarget, bucket: i64) -> String {
    let input = format!(
        "{}|{}|{}|{}",
        target.account_id,
        target.region,
        target.service_kind.plural(),
        bucket
    );

    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Memory-first cache with optional persistent backing
pub struct ScanCache {
    memory: MemoryCacheStore,
    backing: Option<Arc<dyn CacheStore>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    bucket_seconds: i64,
}

impl ScanCache {
    pub fn new(clock: Arc<dyn Clock>, ttl_seconds: u64, bucket_seconds: u64) -> Self {
        Self {
            memory: MemoryCacheStore::new(),
            backing: None,
            clock,
            ttl: seconds(ttl_seconds),
            bucket_seconds: i64::try_from(bucket_seconds.max(1)).unwrap_or(i64::MAX),
        }
    }

    /// Persist entries through `store` in addition to memory
    pub fn with_backing(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.backing = Some(store);
        self
    }

    fn bucket(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.bucket_seconds)
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let age = now - entry.written_at;
        age >= Duration::zero() && age < self.ttl
    }

    fn lookup(&self, key: &str) -> Option<CacheEntry> {
        if let Ok(Some(entry)) = self.memory.get(key) {
            return Some(entry);
        }

        let backing = self.backing.as_ref()?;
        match backing.get(key) {
            Ok(Some(entry)) => {
                if let Err(e) = self.memory.put(&entry) {
                    debug!("Ignoring in-memory cache failure: {}", e);
                }
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("Ignoring cache read failure: {}", e);
                None
            }
        }
    }

    /// Fresh records for `target`, if any
    pub fn get(&self, target: &ScanTarget) -> Option<CacheEntry> {
        let now = self.clock.now();
        let bucket = self.bucket(now);

        for candidate in [bucket, bucket - 1] {
            let key = cache_key(target, candidate);
            if let Some(entry) = self.lookup(&key)
                && entry.target == *target
                && self.is_fresh(&entry, now)
            {
                return Some(entry);
            }
        }

        None
    }

    /// Store records for `target` in the current bucket.
    ///
    /// Best-effort: failures are logged and dropped.
    pub fn put(&self, target: &ScanTarget, records: &[ResourceRecord]) {
        let now = self.clock.now();
        let entry = CacheEntry {
            key: cache_key(target, self.bucket(now)),
            target: target.clone(),
            written_at: now,
            records: records.to_vec(),
        };

        if let Err(e) = self.memory.put(&entry) {
            debug!("Ignoring in-memory cache failure for {}: {}", target, e);
        }

        if let Some(backing) = &self.backing
            && let Err(e) = backing.put(&entry)
        {
            debug!("Ignoring cache write failure for {}: {}", target, e);
        }
    }

    /// Remove expired and unreadable entries, returning how many were removed
    pub fn prune(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let mut removed = prune_store(&self.memory, |e| self.is_fresh(e, now))?;

        if let Some(backing) = &self.backing {
            removed += prune_store(backing.as_ref(), |e| self.is_fresh(e, now))?;
        }

        Ok(removed)
    }

    /// Remove every entry, returning how many persisted entries were removed
    pub fn clear(&self) -> Result<usize, CacheError> {
        for key in self.memory.keys()? {
            self.memory.remove(&key)?;
        }

        let mut removed = 0;
        if let Some(backing) = &self.backing {
            for key in backing.keys()? {
                backing.remove(&key)?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Seconds as a duration, saturating where chrono cannot represent the value
fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

fn prune_store<F>(store: &dyn CacheStore, keep: F) -> Result<usize, CacheError>
where
    F: Fn(&CacheEntry) -> bool,
{
    let mut removed = 0;

    for key in store.keys()? {
        let expired = match store.get(&key) {
            Ok(Some(entry)) => !keep(&entry),
            Ok(None) => false,
            Err(CacheError::Corrupt { .. }) => true,
            Err(e) => return Err(e),
        };

        if expired {
            store.remove(&key)?;
            removed += 1;
        }
    }

    Ok(removed)
}
