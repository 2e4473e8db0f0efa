use redis::AsyncCommands;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::HashMap,
    hash::Hash,
    time::{Duration, Instant},
};

/// Best-effort JSON read; connection or decode failures read as a miss.
pub async fn redis_get_json<T: DeserializeOwned>(client: &redis::Client, key: &str) -> Option<T> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(_) => return None,
    };
    let s: Option<String> = conn.get(key).await.ok().flatten();
    s.and_then(|v| serde_json::from_str(&v).ok())
}

pub async fn redis_set_json<T: Serialize>(
    client: &redis::Client,
    key: &str,
    value: &T,
    ttl_secs: u64,
) {
    if let Ok(mut conn) = client.get_multiplexed_async_connection().await
        && let Ok(json) = serde_json::to_string(value)
    {
        let _: Result<(), _> = conn.set_ex(key, json, ttl_secs).await;
    }
}

/// Claims `key` only if nobody holds it yet. Returns the value already stored
/// when the claim loses.
pub async fn redis_claim(
    client: &redis::Client,
    key: &str,
    value: &str,
    ttl_secs: u64,
) -> Result<Option<String>, redis::RedisError> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    let claimed: bool = redis::cmd("SET")
        .arg(key)
        .arg(value)
        .arg("NX")
        .arg("EX")
        .arg(ttl_secs)
        .query_async::<Option<String>>(&mut conn)
        .await?
        .is_some();
    if claimed {
        return Ok(None);
    }
    conn.get(key).await
}

pub fn client_from_env() -> Option<redis::Client> {
    let url = std::env::var("REDIS_URL").ok()?;
    redis::Client::open(url).ok()
}

/// In-process fallback for state that redis would otherwise expire. Entries
/// lapse `ttl` after insertion; lapsed entries are invisible to reads and
/// dropped on the next write.
pub struct ExpiringMap<K, V> {
    entries: HashMap<K, (V, Instant)>,
    ttl: Duration,
}

impl<K: Eq + Hash, V> ExpiringMap<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(value, _)| value)
    }

    pub fn insert(&mut self, key: K, value: V) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, at)| at.elapsed() < ttl);
        self.entries.insert(key, (value, Instant::now()));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
