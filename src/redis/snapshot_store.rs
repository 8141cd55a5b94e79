use super::redis_client::RedisClient;
use crate::models::Token;
use crate::revival::SnapshotStore;
use async_trait::async_trait;
use std::time::Duration;

/// Token snapshots stored as JSON under the token's own id.
///
/// Keys are bare token ids so other readers of the cache can look a token up
/// by its public key alone.
#[derive(Clone)]
pub struct RedisSnapshotStore {
    redis: RedisClient,
}

impl RedisSnapshotStore {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn load_token_snapshot(&self, token_id: &str) -> anyhow::Result<Option<Token>> {
        self.redis.get(token_id).await
    }

    async fn save_token_snapshot(&self, token: &Token, ttl: Option<Duration>) -> anyhow::Result<()> {
        self.redis.set(&token.id, token, ttl).await
    }
}
