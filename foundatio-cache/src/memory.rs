use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::CacheError;
use crate::store::Cache;

/// A single entry in the in-memory cache.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

fn expiry_from_ttl(ttl: Option<Duration>) -> Option<Instant> {
    ttl.map(|d| Instant::now() + d)
}

/// In-memory [`Cache`] backed by a [`DashMap`].
///
/// Expired entries are evicted lazily on the next operation that touches
/// the same key. This is the backend the lock and queue conformance test
/// suites run against; it is not meant to survive a process restart or be
/// shared across processes — a real deployment would swap in a Redis- or
/// Azure-backed [`Cache`] behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    data: DashMap<String, Entry>,
}

impl InMemoryCache {
    /// Create a new, empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn add_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        self.data.remove_if(key, |_, entry| entry.is_expired());

        let inserted = match self.data.entry(key.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: value.to_owned(),
                    expires_at: expiry_from_ttl(ttl),
                });
                true
            }
        };
        Ok(inserted)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.data.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.data.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = expiry_from_ttl(ttl);
        self.data.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        match self.data.remove(key) {
            Some((_, entry)) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn remove_if_equal(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let mut removed = false;
        self.data.remove_if(key, |_, entry| {
            let matches = !entry.is_expired() && entry.value == expected;
            removed = matches;
            matches
        });
        Ok(removed)
    }

    async fn replace_if_equal(
        &self,
        key: &str,
        expected: &str,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let Some(mut entry) = self.data.get_mut(key) else {
            return Ok(false);
        };
        if entry.is_expired() || entry.value != expected {
            return Ok(false);
        }
        new_value.clone_into(&mut entry.value);
        if ttl.is_some() {
            entry.expires_at = expiry_from_ttl(ttl);
        }
        Ok(true)
    }

    async fn increment(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError> {
        self.data.remove_if(key, |_, entry| entry.is_expired());

        let expires_at = expiry_from_ttl(ttl);
        let mut entry = self.data.entry(key.to_owned()).or_insert_with(|| Entry {
            value: "0".to_owned(),
            expires_at,
        });

        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| CacheError::NotACounter(key.to_owned()))?;
        let new_value = current + delta;
        new_value.to_string().clone_into(&mut entry.value);
        if let Some(ea) = expires_at {
            entry.expires_at = Some(ea);
        }
        Ok(new_value)
    }

    async fn get_expiration(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let Some(entry) = self.data.get(key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            return Ok(None);
        }
        Ok(entry
            .expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now())))
    }

    async fn set_expiration(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        if let Some(mut entry) = self.data.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}
