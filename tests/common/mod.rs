#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use token_processor::chain::{ChainData, Commitment};
use token_processor::config::FollowConfig;
use token_processor::error::ProcessorError;
use token_processor::followers::Followers;
use token_processor::listeners::{MessageSource, Subscriber, TokenProcessor};
use token_processor::models::{HolderSnapshot, PoolAccounts, SwapEvent, Token};
use token_processor::registry::{LiveToken, TokenRegistry};
use token_processor::revival::{Reviver, SnapshotStore};
use token_processor::shutdown::{self, ShutdownTrigger};
use token_processor::swaps::SwapProcessor;
use tokio::sync::mpsc;

pub const POOL_A: &str = "So11111111111111111111111111111111111111112";
pub const POOL_B: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

// ---------- Message sources ----------

pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_payload(&mut self) -> Result<String, ProcessorError> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| ProcessorError::Subscription("test channel closed".into()))
    }
}

pub fn channel_source() -> (mpsc::UnboundedSender<String>, Box<dyn MessageSource>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Box::new(ChannelSource { rx }))
}

/// Hands out pre-registered sources; unknown channels fail to subscribe.
#[derive(Default)]
pub struct FakeSubscriber {
    sources: Mutex<HashMap<String, Box<dyn MessageSource>>>,
}

impl FakeSubscriber {
    pub fn channel(&self, name: &str) -> mpsc::UnboundedSender<String> {
        let (tx, source) = channel_source();
        self.sources.lock().unwrap().insert(name.to_string(), source);
        tx
    }
}

#[async_trait]
impl Subscriber for FakeSubscriber {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn MessageSource>, ProcessorError> {
        self.sources
            .lock()
            .unwrap()
            .remove(channel)
            .ok_or_else(|| ProcessorError::Subscription(format!("no such channel {channel}")))
    }
}

// ---------- Chain data ----------

#[derive(Default)]
pub struct FakeChain {
    pub metadata: Mutex<HashMap<String, Token>>,
    pub metadata_delay: Option<Duration>,
    pub price_calls: AtomicUsize,
}

impl FakeChain {
    pub fn with_token(self, token: Token) -> Self {
        self.metadata.lock().unwrap().insert(token.id.clone(), token);
        self
    }
}

#[async_trait]
impl ChainData for FakeChain {
    async fn fetch_token_metadata(
        &self,
        token_id: &str,
        _: Commitment,
        _: &PoolAccounts,
    ) -> Result<Token, ProcessorError> {
        if let Some(delay) = self.metadata_delay {
            tokio::time::sleep(delay).await;
        }
        self.metadata
            .lock()
            .unwrap()
            .get(token_id)
            .cloned()
            .ok_or_else(|| ProcessorError::Rpc(format!("mint account {token_id} not found")))
    }

    async fn fetch_current_price(&self, _: &str, _: &PoolAccounts) -> Result<Decimal, ProcessorError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Decimal::new(15, 4))
    }

    async fn fetch_top_holders(&self, _: &str) -> Result<HolderSnapshot, ProcessorError> {
        Ok(HolderSnapshot {
            holders: vec![],
            top_ownership_percentage: 30.0,
            time: chrono::Utc::now().timestamp(),
        })
    }
}

// ---------- Snapshot store ----------

#[derive(Default)]
pub struct MemoryStore {
    pub tokens: Mutex<HashMap<String, Token>>,
    pub broken: bool,
}

impl MemoryStore {
    pub fn with_token(self, token: Token) -> Self {
        self.tokens.lock().unwrap().insert(token.id.clone(), token);
        self
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load_token_snapshot(&self, token_id: &str) -> anyhow::Result<Option<Token>> {
        if self.broken {
            anyhow::bail!("connection refused");
        }
        Ok(self.tokens.lock().unwrap().get(token_id).cloned())
    }

    async fn save_token_snapshot(&self, token: &Token, _: Option<Duration>) -> anyhow::Result<()> {
        if self.broken {
            anyhow::bail!("connection refused");
        }
        self.tokens
            .lock()
            .unwrap()
            .insert(token.id.clone(), token.clone());
        Ok(())
    }
}

// ---------- Swap effect ----------

/// Records which token each swap was applied to.
#[derive(Default)]
pub struct RecordingSwaps {
    pub applied: Mutex<Vec<(Token, SwapEvent)>>,
}

impl SwapProcessor for RecordingSwaps {
    fn apply_swap(&self, token: &LiveToken, swap: &SwapEvent) {
        self.applied
            .lock()
            .unwrap()
            .push((token.snapshot(), swap.clone()));
    }
}

// ---------- Wiring ----------

pub struct Harness {
    pub processor: TokenProcessor,
    pub registry: TokenRegistry,
    pub chain: Arc<FakeChain>,
    pub store: Arc<MemoryStore>,
    pub swaps: Arc<RecordingSwaps>,
    pub trigger: ShutdownTrigger,
}

pub fn harness(chain: FakeChain, store: MemoryStore) -> Harness {
    harness_with(chain, store, Duration::from_secs(10), Duration::from_secs(3_600))
}

pub fn harness_with(
    chain: FakeChain,
    store: MemoryStore,
    metadata_timeout: Duration,
    follow_time: Duration,
) -> Harness {
    let chain = Arc::new(chain);
    let store = Arc::new(store);
    let swaps = Arc::new(RecordingSwaps::default());
    let registry = TokenRegistry::new();
    let (trigger, shutdown) = shutdown::channel();

    let follow = FollowConfig {
        follow_time,
        interval: Duration::from_secs(1),
    };
    let followers = Followers::new(chain.clone(), follow, follow, None, shutdown);

    let processor = TokenProcessor::new(
        registry.clone(),
        Reviver::new(store.clone()),
        chain.clone(),
        swaps.clone(),
        followers,
        metadata_timeout,
    );

    Harness {
        processor,
        registry,
        chain,
        store,
        swaps,
        trigger,
    }
}

pub fn new_pair_payload(token: &str, block_time: i64) -> String {
    format!(
        r#"{{"type":"new_pair","data":{{"baseToken":"{token}","basePoolAccount":"{POOL_A}","quotePoolAccount":"{POOL_B}","blockTime":{block_time}}}}}"#
    )
}

pub fn swap_payload(token: &str, token_amount: f64, quote_amount: f64, block_time: i64) -> String {
    format!(
        r#"{{"type":"swap","data":{{"tokenAddress":"{token}","isBuy":true,"tokenAmount":{token_amount},"quoteAmount":{quote_amount},"blockTime":{block_time}}}}}"#
    )
}

pub fn burn_payload(token: &str, amount: u64) -> String {
    format!(r#"{{"type":"burn","data":{{"tokenAddress":"{token}","amount":{amount}}}}}"#)
}

/// Polls `check` until it holds or a second has passed.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
