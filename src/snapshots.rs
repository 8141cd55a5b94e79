//! Write-back of registry state to the snapshot store.
//!
//! Snapshots are what cold-state revival reads, so a token only survives a
//! restart (or a lookup from another process) once it has been written here.

use crate::registry::{LiveToken, TokenRegistry};
use crate::revival::SnapshotStore;
use crate::shutdown::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Stamps `last_cache_update` and writes the token's snapshot.
pub async fn persist_token(
    store: &dyn SnapshotStore,
    token: &LiveToken,
    ttl: Duration,
) -> anyhow::Result<()> {
    let now = chrono::Utc::now().timestamp();
    let mut snapshot = token.snapshot();
    snapshot.last_cache_update = Some(now);

    store.save_token_snapshot(&snapshot, Some(ttl)).await?;
    token.mark_cached(now);
    Ok(())
}

/// Periodically writes every resident token to `store` until shutdown.
///
/// A failed write is logged and retried on the next round.
pub async fn snapshot_task(
    registry: TokenRegistry,
    store: Arc<dyn SnapshotStore>,
    every: Duration,
    ttl: Duration,
    mut shutdown: Shutdown,
) {
    info!(interval = ?every, "Starting snapshot writer");

    let mut timer = interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = timer.tick() => {}
        }

        let tokens = registry.tokens();
        if tokens.is_empty() {
            continue;
        }

        let mut written = 0usize;
        for token in &tokens {
            match persist_token(store.as_ref(), token, ttl).await {
                Ok(()) => written += 1,
                Err(e) => warn!(token = %token.id(), error = %e, "Snapshot write failed"),
            }
        }
        debug!(written, total = tokens.len(), "Snapshot round complete");
    }

    info!("Snapshot writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Token;
    use crate::shutdown;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<HashMap<String, (Token, Option<Duration>)>>,
    }

    #[async_trait]
    impl SnapshotStore for RecordingStore {
        async fn load_token_snapshot(&self, id: &str) -> anyhow::Result<Option<Token>> {
            Ok(self.saved.lock().unwrap().get(id).map(|(t, _)| t.clone()))
        }

        async fn save_token_snapshot(&self, token: &Token, ttl: Option<Duration>) -> anyhow::Result<()> {
            self.saved
                .lock()
                .unwrap()
                .insert(token.id.clone(), (token.clone(), ttl));
            Ok(())
        }
    }

    #[tokio::test]
    async fn persist_stamps_cache_time() {
        let store = RecordingStore::default();
        let token = LiveToken::from_token(Token::new("TKN"));
        token.append_volume_delta(3.0, 1);

        persist_token(&store, &token, Duration::from_secs(60)).await.unwrap();

        let saved = store.saved.lock().unwrap();
        let (snapshot, ttl) = saved.get("TKN").unwrap();
        assert_eq!(snapshot.latest_volume(), Some(3.0));
        assert!(snapshot.last_cache_update.is_some());
        assert_eq!(*ttl, Some(Duration::from_secs(60)));
        assert_eq!(token.snapshot().last_cache_update, snapshot.last_cache_update);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_task_writes_registry_until_shutdown() {
        let registry = TokenRegistry::new();
        registry.put("A", Token::new("A"));
        registry.put("B", Token::new("B"));
        let store = Arc::new(RecordingStore::default());
        let (trigger, shutdown) = shutdown::channel();

        let task = tokio::spawn(snapshot_task(
            registry,
            store.clone(),
            Duration::from_secs(10),
            Duration::from_secs(100),
            shutdown,
        ));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(store.saved.lock().unwrap().len(), 2);

        trigger.trigger();
        task.await.unwrap();
    }
}
