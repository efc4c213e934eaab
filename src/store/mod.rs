//! Shared key-value state
//!
//! Every counter and block entry lives in a store with per-key TTL expiry.
//! Nothing else is shared between gatekeeper instances, so there is no
//! in-process locking around store calls: each operation is an independent
//! network round-trip (or map access for the in-memory backend).
//!
//! - [`MemoryStore`]: single-instance deployments and tests
//! - [`RedisStore`]: distributed deployments

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::clock::Clock;
use crate::config::{StoreBackend, StoreConfig};
use crate::error::{GatekeeperError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Minimal key-value interface the admission layer needs
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value; missing and expired keys are `None`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one. `None` keeps it until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Build the store selected by configuration
pub async fn connect(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn KvStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory counter store");
            let store = Arc::new(MemoryStore::new(clock));
            MemoryStore::start_purge_task(
                &store,
                Duration::from_secs(config.purge_interval_secs),
            );
            Ok(store as Arc<dyn KvStore>)
        }
        StoreBackend::Redis => {
            let url = config.url.as_deref().ok_or_else(|| {
                GatekeeperError::Config("Redis store requires a url".to_string())
            })?;
            info!("Using Redis counter store");
            let store = RedisStore::new(url).await?;
            Ok(Arc::new(store))
        }
    }
}
