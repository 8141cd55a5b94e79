//! The three channel consumers: new pairs, swaps and burns.
//!
//! Every listener follows the same discipline:
//! - a receive failure ends that listener only (logged, no resubscribe);
//! - a payload that fails to decode is logged and skipped;
//! - a failed fetch abandons the side effects of that one message.

use crate::chain::{ChainData, Commitment};
use crate::error::ProcessorError;
use crate::followers::Followers;
use crate::models::{BurnEvent, NewPairEvent, SwapEvent, decode};
use crate::registry::{SharedToken, TokenRegistry};
use crate::revival::Reviver;
use crate::shutdown::Shutdown;
use crate::swaps::SwapProcessor;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// One subscribed channel.
#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next raw payload. An error means the subscription is gone.
    async fn next_payload(&mut self) -> Result<String, ProcessorError>;
}

#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn MessageSource>, ProcessorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NewPair,
    Swap,
    Burn,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::NewPair => write!(f, "new_pairs"),
            EventKind::Swap => write!(f, "swaps"),
            EventKind::Burn => write!(f, "burns"),
        }
    }
}

/// Channel name per event kind.
#[derive(Debug, Clone)]
pub struct Channels {
    pub new_pairs: String,
    pub swaps: String,
    pub burns: String,
}

/// Shared state and collaborators used by every listener.
#[derive(Clone)]
pub struct TokenProcessor {
    registry: TokenRegistry,
    reviver: Reviver,
    chain: Arc<dyn ChainData>,
    swaps: Arc<dyn SwapProcessor>,
    followers: Followers,
    metadata_timeout: Duration,
}

impl TokenProcessor {
    pub fn new(
        registry: TokenRegistry,
        reviver: Reviver,
        chain: Arc<dyn ChainData>,
        swaps: Arc<dyn SwapProcessor>,
        followers: Followers,
        metadata_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            reviver,
            chain,
            swaps,
            followers,
            metadata_timeout,
        }
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn followers(&self) -> &Followers {
        &self.followers
    }

    // ==========================================
    // LISTENER LOOPS
    // ==========================================

    /// Subscribes to all three channels and runs a listener per channel until
    /// each one ends. A channel that cannot be subscribed leaves the other
    /// two running.
    pub async fn start_services(&self, subscriber: &dyn Subscriber, channels: &Channels, shutdown: Shutdown) {
        info!("Starting services");

        let mut listeners = JoinSet::new();
        for (kind, channel) in [
            (EventKind::Burn, &channels.burns),
            (EventKind::NewPair, &channels.new_pairs),
            (EventKind::Swap, &channels.swaps),
        ] {
            let source = match subscriber.subscribe(channel).await {
                Ok(source) => source,
                Err(e) => {
                    error!(listener = %kind, channel = %channel, error = %e, "Failed to subscribe");
                    continue;
                }
            };

            let processor = self.clone();
            let shutdown = shutdown.clone();
            listeners.spawn(async move { processor.run_listener(kind, source, shutdown).await });
        }

        info!(count = listeners.len(), "All services started");

        while let Some(joined) = listeners.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Listener task panicked");
            }
        }

        info!("All services stopped");
    }

    /// Receives and dispatches messages until the subscription fails or
    /// shutdown is triggered.
    pub async fn run_listener(&self, kind: EventKind, mut source: Box<dyn MessageSource>, mut shutdown: Shutdown) {
        loop {
            let payload = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(listener = %kind, "Shutdown requested, stopping listener");
                    return;
                }
                received = source.next_payload() => match received {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!(listener = %kind, error = %e, "Error receiving message");
                        return;
                    }
                },
            };

            self.dispatch(kind, &payload).await;
        }
    }

    /// Decodes one payload and applies it. Decode failures are logged and dropped.
    pub async fn dispatch(&self, kind: EventKind, payload: &str) {
        match kind {
            EventKind::NewPair => match decode::<NewPairEvent>(payload) {
                Ok(event) => {
                    self.handle_new_pair(event).await;
                }
                Err(e) => warn!(listener = %kind, error = %e, "Error parsing new pair event"),
            },
            EventKind::Swap => match decode::<SwapEvent>(payload) {
                Ok(event) => {
                    self.handle_swap(event).await;
                }
                Err(e) => warn!(listener = %kind, error = %e, "Error parsing swap event"),
            },
            EventKind::Burn => match decode::<BurnEvent>(payload) {
                Ok(event) => self.handle_burn(&event),
                Err(e) => warn!(listener = %kind, error = %e, "Error parsing burn event"),
            },
        }
    }

    // ==========================================
    // EVENT HANDLERS
    // ==========================================

    /// Fetches the new token's metadata, registers it and starts its followers.
    ///
    /// Returns the registered token, or `None` when the message was abandoned
    /// or the token was already registered.
    pub async fn handle_new_pair(&self, event: NewPairEvent) -> Option<SharedToken> {
        let pair = event.data;
        debug!(token = %pair.base_token, block_time = pair.block_time, "Parsed NewPairEvent");

        // Redelivered pair: keep the live entry and its followers.
        if self.registry.contains(&pair.base_token) {
            info!(token = %pair.base_token, "Token already registered, ignoring new pair");
            return None;
        }

        let pools = match pair.pool_accounts() {
            Ok(pools) => pools,
            Err(e) => {
                warn!(token = %pair.base_token, error = %e, "Skipping new pair with invalid pool account");
                return None;
            }
        };

        // STEP 1: fetch token info
        let start = Instant::now();
        let fetched = timeout(
            self.metadata_timeout,
            self.chain
                .fetch_token_metadata(&pair.base_token, Commitment::Finalized, &pools),
        )
        .await
        .unwrap_or(Err(ProcessorError::Timeout(self.metadata_timeout)));

        let mut token = match fetched {
            Ok(token) => token,
            Err(e) => {
                error!(token = %pair.base_token, error = %e, "Failed to get token info");
                return None;
            }
        };

        token.id = pair.base_token.clone();
        token.pools = pools;
        token.ipo = pair.block_time;
        token.discovered_at = chrono::Utc::now().timestamp();

        info!(
            token = %pair.base_token,
            symbol = token.symbol.as_deref().unwrap_or("?"),
            elapsed = ?start.elapsed(),
            "Fetched token info"
        );

        // STEP 2: register, unless a swap revived the token during the fetch
        let Some(live) = self.registry.insert_if_absent(pair.base_token.clone(), token) else {
            info!(token = %pair.base_token, "Token registered while fetching, keeping resident entry");
            return None;
        };

        // STEP 3: price and ownership followers
        self.followers.spawn_for(Arc::clone(&live));

        Some(live)
    }

    /// Applies a swap to its token, reviving the token from cache if needed.
    ///
    /// Returns `false` when the token is unknown and the swap was dropped.
    pub async fn handle_swap(&self, event: SwapEvent) -> bool {
        let token_id = event.data.token_address.as_str();

        let Some(token) = self.registry.get_or_revive(token_id, &self.reviver).await else {
            warn!(token = %token_id, "Dropping swap for unknown token");
            return false;
        };

        self.swaps.apply_swap(&token, &event);
        true
    }

    /// Burns are logged only; token supply is not adjusted here.
    pub fn handle_burn(&self, event: &BurnEvent) {
        let burn = &event.data;
        info!(
            token = %burn.token_address,
            amount = burn.amount,
            signature = burn.signature.as_deref().unwrap_or("-"),
            "🔥 Parsed BurnEvent"
        );
    }
}
