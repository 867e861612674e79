//! Deadline-bound provider access with last-known-good fallback.
//!
//! Every call out to a provider goes through [`FallbackCache::fetch`]: the
//! call is raced against a deadline, a success refreshes the cache, and a
//! timeout (or provider error) is answered from the cache instead of being
//! surfaced. Only a timeout with a cold cache produces
//! [`Error::UpstreamTimeout`], which the engines convert into a deterministic
//! degraded result before it can reach the caller.

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;

use tracing::warn;

use crate::errors::{Error, Result};

/// Last-known-good cache for one kind of provider data, keyed by id.
#[derive(Debug)]
pub struct FallbackCache<V> {
    provider: &'static str,
    deadline: Duration,
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone> FallbackCache<V> {
    /// `provider` names the upstream in logs and errors.
    pub fn new(provider: &'static str, deadline: Duration) -> Self {
        Self {
            provider,
            deadline,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Run `call` under the deadline; refresh and return on success, fall
    /// back to the cached value on timeout or provider error.
    pub async fn fetch<F, Fut>(&self, key: &str, call: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        match tokio::time::timeout(self.deadline, call()).await {
            Ok(Ok(value)) => {
                self.store(key, value.clone());
                Ok(value)
            }
            Ok(Err(err)) => {
                warn!(
                    provider = self.provider,
                    key,
                    error = %err,
                    "provider call failed, using cached value"
                );
                self.cached(key).ok_or(err)
            }
            Err(_elapsed) => {
                warn!(
                    provider = self.provider,
                    key,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "provider call timed out, using cached value"
                );
                self.cached(key).ok_or(Error::UpstreamTimeout {
                    provider: self.provider,
                    deadline_ms: self.deadline.as_millis() as u64,
                })
            }
        }
    }

    /// Cached value, if any.
    pub fn cached(&self, key: &str) -> Option<V> {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    fn store(&self, key: &str, value: V) {
        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), value);
    }
}
