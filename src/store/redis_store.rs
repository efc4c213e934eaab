use super::KvStore;
use crate::error::Result;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::Duration;
use tracing::debug;

/// Redis-backed store shared by every gatekeeper instance
#[derive(Clone)]
pub struct RedisStore {
    /// Redis connection manager (cheap to clone, reconnects on failure)
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self { connection })
    }

    /// Test Redis connection
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection.clone();
        match ttl {
            // SET EX rejects a zero expiry
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                let _: () = conn.set_ex(key, value, secs).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        debug!(key, "Stored value in Redis");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // They are ignored by default. Run with: cargo test -- --ignored

    async fn create_test_store() -> RedisStore {
        RedisStore::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis")
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_connection() {
        let store = create_test_store().await;
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_set_get_delete() {
        let store = create_test_store().await;
        let key = format!("gatekeeper-test:{}", rand::random::<u32>());

        assert_eq!(store.get(&key).await.unwrap(), None);

        store
            .set(&key, "7", Some(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some("7".to_string()));

        assert!(store.delete(&key).await.unwrap());
        assert!(!store.delete(&key).await.unwrap());
    }
}
