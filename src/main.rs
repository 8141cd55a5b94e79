use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use token_processor::chain::{ChainData, RpcChainData};
use token_processor::config::AppConfig;
use token_processor::followers::Followers;
use token_processor::listeners::{Channels, TokenProcessor};
use token_processor::redis::{RedisClient, RedisSnapshotStore, RedisSubscriber};
use token_processor::registry::TokenRegistry;
use token_processor::revival::{Reviver, SnapshotStore};
use token_processor::shutdown;
use token_processor::snapshots::snapshot_task;
use token_processor::swaps::SeriesSwapProcessor;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Upper bound on waiting for followers to write their final snapshots.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 Starting token data processor");

    let config = AppConfig::from_env().context("Invalid configuration")?;

    let redis = RedisClient::new(&config.redis_url).await?;
    redis.ping().await?;

    let store: Arc<dyn SnapshotStore> = Arc::new(RedisSnapshotStore::new(redis.clone()));
    let chain: Arc<dyn ChainData> = Arc::new(
        RpcChainData::new(&config.rpc_url, config.metadata_timeout)
            .context("Failed to build RPC client")?,
    );

    let (trigger, shutdown) = shutdown::channel();
    let trigger = Arc::new(trigger);
    let registry = TokenRegistry::new();

    let followers = Followers::new(
        Arc::clone(&chain),
        config.price,
        config.owners,
        config.max_followed_tokens,
        shutdown.clone(),
    )
    .with_snapshot_store(Arc::clone(&store), config.snapshot_ttl);

    let processor = TokenProcessor::new(
        registry.clone(),
        Reviver::new(Arc::clone(&store)),
        chain,
        Arc::new(SeriesSwapProcessor),
        followers,
        config.metadata_timeout,
    );

    let snapshots = config.snapshot_interval.map(|every| {
        tokio::spawn(snapshot_task(
            registry.clone(),
            Arc::clone(&store),
            every,
            config.snapshot_ttl,
            shutdown.clone(),
        ))
    });

    tokio::spawn({
        let trigger = Arc::clone(&trigger);
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, shutting down");
                    trigger.trigger();
                }
                Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
            }
        }
    });

    let subscriber = RedisSubscriber::new(redis.client().clone());
    let channels = Channels {
        new_pairs: config.new_pairs_channel.clone(),
        swaps: config.swaps_channel.clone(),
        burns: config.burns_channel.clone(),
    };

    processor
        .start_services(&subscriber, &channels, shutdown.clone())
        .await;

    if !shutdown.is_triggered() {
        warn!("All listeners stopped without a shutdown request, shutting down");
        trigger.trigger();
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, processor.followers().wait_idle())
        .await
        .is_err()
    {
        warn!(active = processor.followers().active(), "Followers still running after grace period");
    }

    if let Some(snapshots) = snapshots {
        if let Err(e) = snapshots.await {
            error!(error = %e, "Snapshot writer panicked");
        }
    }

    info!(tokens = registry.len(), "Token data processor stopped");
    Ok(())
}
