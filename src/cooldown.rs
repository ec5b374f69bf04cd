use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;

pub const COOLDOWN_PREFIX: &str = "submit_cooldown";

/// Deterministic key of a user's run/submit cooldown
pub fn cooldown_key(user_id: i64) -> String {
    format!("{COOLDOWN_PREFIX}:{user_id}")
}

/// Shared store of expiring keys.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Creates `key` with a lifetime of `window` unless it already exists.
    /// Returns `false` when the key was already present.
    async fn try_acquire(&self, key: &str, window: Duration) -> anyhow::Result<bool>;
}

/// Redis-backed store, shared by every server instance.
pub struct RedisCooldown {
    conn: ConnectionManager,
}

impl RedisCooldown {
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CooldownStore for RedisCooldown {
    async fn try_acquire(&self, key: &str, window: Duration) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        // SET NX answers nil when the key exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(window.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }
}

/// Single-process store for deployments without Redis.
#[derive(Default)]
pub struct MemoryCooldown {
    expiries: Mutex<HashMap<String, Instant>>,
}

impl MemoryCooldown {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CooldownStore for MemoryCooldown {
    async fn try_acquire(&self, key: &str, window: Duration) -> anyhow::Result<bool> {
        let now = Instant::now();
        let mut expiries = self.expiries.lock();
        expiries.retain(|_, expiry| *expiry > now);

        if expiries.contains_key(key) {
            return Ok(false);
        }
        expiries.insert(key.to_string(), now + window);
        Ok(true)
    }
}

/// Per-user run/submit rate limit
pub struct Cooldown {
    store: Arc<dyn CooldownStore>,
    window: Duration,
}

impl Cooldown {
    pub fn new(store: Arc<dyn CooldownStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Starts the user's window. Returns `false` if one is still active.
    pub async fn try_begin(&self, user_id: i64) -> anyhow::Result<bool> {
        self.store
            .try_acquire(&cooldown_key(user_id), self.window)
            .await
    }
}
