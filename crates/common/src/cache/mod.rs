//! Shared cache client (redis)
//!
//! A thin, scoped wrapper over a redis connection manager. Three concerns
//! ride on it: JSON result-set entries with a TTL, the dedup ledger's
//! authoritative hash set, and the rate limiter's Lua token bucket.
//!
//! Everything here is advisory by contract: callers treat transport errors
//! as misses, and a payload that no longer decodes reads as a miss rather
//! than an error. The connection manager reconnects on its own, so no
//! connection state is guarded here.

use crate::errors::{CoreError, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};

fn cache_err(op: &'static str, e: redis::RedisError) -> CoreError {
    CoreError::Cache {
        message: format!("redis {}: {}", op, e),
    }
}

/// Scoped cache handle; cheap to use concurrently (the manager is cloned
/// per operation, multiplexing over one connection).
pub struct Cache {
    manager: ConnectionManager,
    scope: String,
}

impl Cache {
    /// Open a managed connection. Startup proceeds without the cache when
    /// this fails; the caller decides how loudly.
    pub async fn connect(url: &str, scope: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| cache_err("open", e))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| cache_err("connect", e))?;

        Ok(Self {
            manager,
            scope: scope.to_string(),
        })
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.scope, key)
    }

    /// Fetch and decode a JSON entry. Absent keys and undecodable payloads
    /// both read as `None`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.manager.clone();
        let raw: Option<Vec<u8>> = conn
            .get(self.scoped(key))
            .await
            .map_err(|e| cache_err("get", e))?;

        Ok(raw.and_then(|bytes| serde_json::from_slice(&bytes).ok()))
    }

    /// Encode and store a JSON entry with a TTL.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let body = serde_json::to_vec(value).map_err(|e| CoreError::Cache {
            message: format!("cache encode: {}", e),
        })?;

        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(self.scoped(key), body, ttl_secs)
            .await
            .map_err(|e| cache_err("setex", e))
    }

    /// Drop a key; true when it existed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let dropped: i64 = conn
            .del(self.scoped(key))
            .await
            .map_err(|e| cache_err("del", e))?;
        Ok(dropped > 0)
    }

    /// Drop every key under a sub-prefix (SCAN, then one DEL).
    pub async fn clear_prefix(&self, prefix: &str) -> Result<u64> {
        let pattern = format!("{}:{}*", self.scope, prefix);
        let mut conn = self.manager.clone();

        let keys: Vec<String> = {
            let mut iter = conn
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(|e| cache_err("scan", e))?;

            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }
        conn.del(&keys).await.map_err(|e| cache_err("del", e))
    }

    /// Add a member to a set, returning whether it was newly added.
    pub async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let added: i64 = conn
            .sadd(self.scoped(key), member)
            .await
            .map_err(|e| cache_err("sadd", e))?;
        Ok(added > 0)
    }

    /// Remove a member from a set.
    pub async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn
            .srem(self.scoped(key), member)
            .await
            .map_err(|e| cache_err("srem", e))?;
        Ok(removed > 0)
    }

    /// Check membership in a set.
    pub async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        conn.sismember(self.scoped(key), member)
            .await
            .map_err(|e| cache_err("sismember", e))
    }

    /// Fetch all members of a set.
    pub async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        conn.smembers(self.scoped(key))
            .await
            .map_err(|e| cache_err("smembers", e))
    }

    /// Run a Lua script with the given keys and args, returning an integer.
    pub async fn eval_script(
        &self,
        script: &redis::Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64> {
        let mut conn = self.manager.clone();
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(self.scoped(key));
        }
        for arg in args {
            invocation.arg(arg);
        }
        invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| cache_err("eval", e))
    }

    /// Round-trip check for readiness probes.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| cache_err("ping", e))?;
        Ok(())
    }
}

/// Cache key builder helpers
pub mod keys {
    /// Build a result-cache key from a request fingerprint
    pub fn result(fingerprint: &str) -> String {
        format!("result:{}", fingerprint)
    }

    /// Sub-prefix for clearing the whole result cache
    pub const RESULT_PREFIX: &str = "result:";

    /// Key of the authoritative dedup hash set
    pub fn dedup_set() -> String {
        "dedup:hashes".to_string()
    }

    /// Build a rate-limiter bucket key for a source
    pub fn rate_bucket(source: &str) -> String {
        format!("ratelimit:{}", source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        assert_eq!(keys::result("abcd"), "result:abcd");
        assert!(keys::result("abcd").starts_with(keys::RESULT_PREFIX));
        assert_eq!(keys::rate_bucket("arxiv"), "ratelimit:arxiv");
        assert_eq!(keys::dedup_set(), "dedup:hashes");
    }

    #[test]
    fn test_cache_err_names_operation() {
        let err = cache_err("get", redis::RedisError::from((redis::ErrorKind::IoError, "down")));
        assert!(err.to_string().contains("redis get"));
    }
}
