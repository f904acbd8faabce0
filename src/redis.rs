use crate::algorithms::{
    window_millis, Admission, WindowStore, MAX_WINDOW, SLIDING_WINDOW_SCRIPT,
};
use crate::error::LimiterError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Default namespace for window keys.
pub const DEFAULT_KEY_PREFIX: &str = "rate_limiter:";

/// Window store backed by a Redis sorted set per rate key.
///
/// Each evaluation is one `EVALSHA` of [`SLIDING_WINDOW_SCRIPT`], so pruning,
/// counting and recording are atomic across every process sharing the server.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    script: Script,
    key_prefix: String,
}

impl RedisStore {
    /// Connect to `redis_url` using the default key prefix.
    pub async fn connect(redis_url: &str) -> Result<Self, LimiterError> {
        Self::connect_with_prefix(redis_url, DEFAULT_KEY_PREFIX).await
    }

    pub async fn connect_with_prefix(
        redis_url: &str,
        key_prefix: impl Into<String>,
    ) -> Result<Self, LimiterError> {
        let client = Client::open(redis_url).map_err(|e| {
            LimiterError::Configuration(format!("Failed to create Redis client: {}", e))
        })?;
        let connection = client.get_multiplexed_tokio_connection().await?;

        info!(target: "rate_limiter::redis", "Connected to Redis");

        Ok(Self::from_connection(connection, key_prefix))
    }

    /// Build a store on top of an existing multiplexed connection.
    pub fn from_connection(
        connection: MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
            key_prefix: key_prefix.into(),
        }
    }

    pub async fn ping(&self) -> Result<String, LimiterError> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong)
    }

    /// Full Redis key for a rate key.
    pub fn window_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl WindowStore for RedisStore {
    async fn evaluate_and_record(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_ms: u64,
    ) -> Result<Admission, LimiterError> {
        if window > MAX_WINDOW {
            return Err(LimiterError::Configuration(format!(
                "window {:?} exceeds the maximum of {:?}",
                window, MAX_WINDOW
            )));
        }

        let mut conn = self.connection.clone();
        let window_key = self.window_key(key);

        // invoke_async tries EVALSHA first and loads the script on NOSCRIPT
        let reply: Vec<i64> = self
            .script
            .key(&window_key)
            .arg(limit)
            .arg(window_millis(window))
            .arg(now_ms)
            .arg(Uuid::new_v4().simple().to_string())
            .invoke_async(&mut conn)
            .await?;

        let admission = parse_reply(&reply)?;
        debug!(
            target: "rate_limiter::redis",
            key = %window_key,
            admitted = admission.admitted,
            count = admission.count,
            retry_after_ms = admission.retry_after_ms,
            "Evaluated sliding window"
        );
        Ok(admission)
    }

    async fn reset(&self, key: &str) -> Result<(), LimiterError> {
        let mut conn = self.connection.clone();
        redis::cmd("DEL")
            .arg(self.window_key(key))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

/// Decode the `{admitted, retry_after_ms, count}` reply of the window script.
fn parse_reply(reply: &[i64]) -> Result<Admission, LimiterError> {
    let [admitted, retry_after_ms, count] = reply else {
        return Err(LimiterError::Protocol(format!(
            "expected 3 integers from window script, got {:?}",
            reply
        )));
    };

    let retry_after_ms = (*retry_after_ms).max(0) as u64;
    let count = (*count).max(0) as u64;
    match admitted {
        1 => Ok(Admission::admitted(count)),
        0 => Ok(Admission::denied(retry_after_ms, count)),
        other => Err(LimiterError::Protocol(format!(
            "window script returned admitted flag {}",
            other
        ))),
    }
}
