use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::JwkSet;

use crate::utils::clock::Clock;

/// Remote key sets are good for six hours.
const DEFAULT_TTL_HOURS: i64 = 6;

/// Process-local cache of fetched key sets, keyed by key-set URL.
///
/// A stale entry is simply skipped on read; the next verification refetches
/// and overwrites it. The clock is injected so expiry is testable.
pub struct JwksCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, (JwkSet, DateTime<Utc>)>>,
}

impl JwksCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, Duration::hours(DEFAULT_TTL_HOURS))
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, url: &str) -> Option<JwkSet> {
        let entries = self.entries.read().unwrap();
        let (set, fetched_at) = entries.get(url)?;
        if self.clock.now() - *fetched_at >= self.ttl {
            return None;
        }
        Some(set.clone())
    }

    pub fn insert(&self, url: &str, set: JwkSet) {
        let now = self.clock.now();
        self.entries
            .write()
            .unwrap()
            .insert(url.to_string(), (set, now));
    }
}
