/// Optional Redis cache that never fails the caller.
///
/// Without a URL, with an invalid URL, or when the server is down, reads are misses and writes
/// are dropped (with a warning). Values are stored as JSON.
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

pub struct RedisCache {
    client: Option<redis::Client>,
}

impl RedisCache {
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| match redis::Client::open(u) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "invalid REDIS_URL, cache disabled");
                None
            }
        });
        Self { client }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// PING the server once.
    pub async fn is_available(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()?;
        serde_json::from_str(&raw?)
            .inspect_err(|e| warn!(error = %e, key, "cached value is not valid JSON"))
            .ok()
    }

    /// Store `value` under `key` for `ttl_secs`. Returns whether the write happened.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        let Ok(json) = serde_json::to_string(value) else {
            return false;
        };
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        conn.set_ex::<_, _, ()>(key, json, ttl_secs)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis SETEX failed"))
            .is_ok()
    }

    async fn connection(&self) -> Option<MultiplexedConnection> {
        self.client
            .as_ref()?
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()
    }
}
