use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{info, warn};

/// Key/value access to Redis, storing values as JSON strings.
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    connection: ConnectionManager,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let connection = ConnectionManager::new(client.clone())
            .await
            .context("Failed to establish Redis connection")?;

        info!("Successfully connected to Redis");

        Ok(Self { client, connection })
    }

    /// Underlying client, for opening dedicated pub/sub connections.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn set<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        expiry: Option<Duration>,
    ) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize value")?;
        let mut connection = self.connection.clone();

        let result = match expiry {
            Some(ttl) => {
                connection
                    .set_ex::<_, _, ()>(key, json, ttl.as_secs().max(1))
                    .await
            }
            None => connection.set::<_, _, ()>(key, json).await,
        };

        if let Err(e) = &result {
            if e.is_connection_dropped() || e.is_io_error() {
                warn!("Redis connection lost, the manager will reconnect");
            }
        }

        result.with_context(|| format!("Failed to set key {key}"))
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut connection = self.connection.clone();
        let json: Option<String> = connection
            .get(key)
            .await
            .with_context(|| format!("Failed to get key {key}"))?;

        match json {
            Some(json) => {
                let value = serde_json::from_str(&json).context("Failed to deserialize value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn ping(&self) -> Result<()> {
        let mut connection = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut connection)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }
}
