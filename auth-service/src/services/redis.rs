//! Redis-backed ephemeral state: token revocation, MFA challenge sessions,
//! and the category-aware sliding-window rate limiter.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use uuid::Uuid;

/// Revocation list for access/refresh token IDs. Checks must fail closed: if
/// Redis is unreachable, callers should treat the token as not verifiable
/// rather than silently accepting it.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    async fn blacklist_token(&self, token_jti: &str, expiry_seconds: i64) -> Result<(), anyhow::Error>;
    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;

    /// Begin a 5-minute, single-use MFA challenge session and return its opaque token.
    /// `remember_me` is carried through so the eventual token issuance after
    /// verification can size the refresh session accordingly.
    async fn create_mfa_session(&self, user_id: Uuid, amr_so_far: &[String], remember_me: bool) -> Result<String, anyhow::Error>;

    /// Atomically consume an MFA session. A second call with the same token returns `None`.
    async fn consume_mfa_session(&self, mfa_token: &str) -> Result<Option<(Uuid, Vec<String>, bool)>, anyhow::Error>;

    /// Category-aware counter. Returns `(allowed, count_in_window)` so the
    /// caller can report `X-RateLimit-Remaining` alongside the decision.
    async fn check_rate_limit(&self, category: &str, key: &str, limit: u32, window_seconds: i64) -> Result<(bool, u32), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %config.url, "connecting to redis");
        let client = Client::open(config.url.clone())?;
        let manager = client.get_connection_manager().await?;
        tracing::info!("successfully connected to redis");
        Ok(Self { _client: client, manager })
    }

}

#[async_trait]
impl TokenBlacklist for RedisService {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async(&mut conn).await
            .map_err(|e| anyhow::anyhow!("redis health check failed: {}", e))
    }

    async fn blacklist_token(&self, token_jti: &str, expiry_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let key = format!("revoked:{}", token_jti);
        let _: () = conn.set_ex(&key, "revoked", expiry_seconds.max(1) as u64).await?;
        Ok(())
    }

    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let key = format!("revoked:{}", token_jti);
        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    async fn create_mfa_session(&self, user_id: Uuid, amr_so_far: &[String], remember_me: bool) -> Result<String, anyhow::Error> {
        let mfa_token = Uuid::new_v4().to_string();
        let key = format!("mfa_session:{}", mfa_token);
        let payload = serde_json::json!({ "user_id": user_id, "amr": amr_so_far, "remember_me": remember_me }).to_string();

        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(&key, payload, 300).await?;
        Ok(mfa_token)
    }

    async fn consume_mfa_session(&self, mfa_token: &str) -> Result<Option<(Uuid, Vec<String>, bool)>, anyhow::Error> {
        let key = format!("mfa_session:{}", mfa_token);
        let mut conn = self.manager.clone();

        let raw: Option<String> = redis::cmd("GETDEL").arg(&key).query_async(&mut conn).await?;
        let Some(raw) = raw else { return Ok(None) };

        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let user_id: Uuid = value["user_id"].as_str().and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("corrupt mfa session payload"))?;
        let amr = value["amr"].as_array().map(|arr| {
            arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()
        }).unwrap_or_default();
        let remember_me = value["remember_me"].as_bool().unwrap_or(false);

        Ok(Some((user_id, amr, remember_me)))
    }

    /// Atomic INCR with a first-write EXPIRE.
    async fn check_rate_limit(&self, category: &str, key: &str, limit: u32, window_seconds: i64) -> Result<(bool, u32), anyhow::Error> {
        let redis_key = format!("ratelimit:{}:{}", category, key);
        let mut conn = self.manager.clone();

        let count: i64 = conn.incr(&redis_key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&redis_key, window_seconds).await?;
        }
        let count = count.max(0) as u32;
        Ok((count <= limit, count))
    }
}

/// In-memory stand-in for tests and for local runs without Redis. Counts
/// accumulate for the lifetime of the process rather than a real sliding
/// window - good enough to exercise the allow/deny boundary in tests, not a
/// substitute for exercising `RedisService`'s window expiry.
#[derive(Default)]
pub struct MockBlacklist {
    pub blacklisted_tokens: std::sync::Mutex<std::collections::HashSet<String>>,
    mfa_sessions: std::sync::Mutex<std::collections::HashMap<String, (Uuid, Vec<String>, bool)>>,
    rate_limit_counts: std::sync::Mutex<std::collections::HashMap<String, u32>>,
}

impl MockBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for MockBlacklist {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn blacklist_token(&self, token_jti: &str, _expiry_seconds: i64) -> Result<(), anyhow::Error> {
        self.blacklisted_tokens.lock().unwrap().insert(token_jti.to_string());
        Ok(())
    }

    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, anyhow::Error> {
        Ok(self.blacklisted_tokens.lock().unwrap().contains(token_jti))
    }

    async fn create_mfa_session(&self, user_id: Uuid, amr_so_far: &[String], remember_me: bool) -> Result<String, anyhow::Error> {
        let mfa_token = Uuid::new_v4().to_string();
        self.mfa_sessions.lock().unwrap().insert(mfa_token.clone(), (user_id, amr_so_far.to_vec(), remember_me));
        Ok(mfa_token)
    }

    async fn consume_mfa_session(&self, mfa_token: &str) -> Result<Option<(Uuid, Vec<String>, bool)>, anyhow::Error> {
        Ok(self.mfa_sessions.lock().unwrap().remove(mfa_token))
    }

    async fn check_rate_limit(&self, category: &str, key: &str, limit: u32, _window_seconds: i64) -> Result<(bool, u32), anyhow::Error> {
        let mut counts = self.rate_limit_counts.lock().unwrap();
        let count = counts.entry(format!("{}:{}", category, key)).or_insert(0);
        *count += 1;
        Ok((*count <= limit, *count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_blacklist_round_trips() {
        let blacklist = MockBlacklist::new();
        assert!(!blacklist.is_blacklisted("jti-1").await.unwrap());
        blacklist.blacklist_token("jti-1", 60).await.unwrap();
        assert!(blacklist.is_blacklisted("jti-1").await.unwrap());
    }
}
