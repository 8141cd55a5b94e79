use crate::models::Token;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Durable snapshot storage for tokens that have left (or never entered)
/// the in-memory registry.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` means nothing is cached for `token_id`.
    async fn load_token_snapshot(&self, token_id: &str) -> anyhow::Result<Option<Token>>;

    async fn save_token_snapshot(&self, token: &Token, ttl: Option<Duration>) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum RevivalError {
    #[error("no cached state for {0}")]
    NotCached(String),

    #[error("snapshot store failed: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Rebuilds tokens from the snapshot store after a registry miss.
#[derive(Clone)]
pub struct Reviver {
    store: Arc<dyn SnapshotStore>,
}

impl Reviver {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    pub async fn revive(&self, token_id: &str) -> Result<Token, RevivalError> {
        let mut token = self
            .store
            .load_token_snapshot(token_id)
            .await?
            .ok_or_else(|| RevivalError::NotCached(token_id.to_string()))?;

        // Older snapshots may predate the id field.
        if token.id.is_empty() {
            token.id = token_id.to_string();
        }

        Ok(token)
    }
}
