//! Per-token background samplers started when a token is discovered.
//!
//! Every discovered token gets a price follower and an ownership follower.
//! Each one samples on its own interval until its follow time has elapsed,
//! and is hard-stopped at a deadline of [`DEADLINE_FACTOR`] times the follow
//! time even if a fetch hangs. The deadline belongs to that follower alone:
//! it is not tied to the listener that spawned it or to the other follower.

use crate::chain::ChainData;
use crate::config::FollowConfig;
use crate::error::ProcessorError;
use crate::registry::{LiveToken, SharedToken};
use crate::revival::SnapshotStore;
use crate::shutdown::Shutdown;
use crate::snapshots::persist_token;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval, timeout_at};
use tracing::{debug, info, warn};

/// Hard deadline of a follower, as a multiple of its follow time.
pub const DEADLINE_FACTOR: u32 = 5;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

// Deadline used when follow_time * DEADLINE_FACTOR does not fit in an Instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerKind {
    Price,
    Ownership,
}

impl fmt::Display for FollowerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FollowerKind::Price => write!(f, "price"),
            FollowerKind::Ownership => write!(f, "ownership"),
        }
    }
}

/// Handle to one running follower.
///
/// Dropping the handle detaches the follower; it still stops at its own
/// deadline or on shutdown.
#[derive(Debug)]
pub struct FollowerHandle {
    kind: FollowerKind,
    deadline: Instant,
    task: JoinHandle<()>,
}

impl FollowerHandle {
    pub fn kind(&self) -> FollowerKind {
        self.kind
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels this follower only.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}

#[derive(Default)]
struct Activity {
    count: AtomicUsize,
    idle: Notify,
}

struct ActiveGuard(Arc<Activity>);

impl ActiveGuard {
    fn new(activity: &Arc<Activity>) -> Self {
        activity.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(activity))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

fn deadline_after(follow_time: Duration) -> Instant {
    let now = Instant::now();
    follow_time
        .checked_mul(DEADLINE_FACTOR)
        .and_then(|d| now.checked_add(d))
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Spawns and accounts for follower pairs.
#[derive(Clone)]
pub struct Followers {
    chain: Arc<dyn ChainData>,
    store: Option<Arc<dyn SnapshotStore>>,
    snapshot_ttl: Duration,
    price: FollowConfig,
    owners: FollowConfig,
    slots: Option<Arc<Semaphore>>,
    active: Arc<Activity>,
    shutdown: Shutdown,
}

impl Followers {
    /// `max_tokens` bounds how many tokens are followed at once; `None` is unbounded.
    pub fn new(
        chain: Arc<dyn ChainData>,
        price: FollowConfig,
        owners: FollowConfig,
        max_tokens: Option<usize>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            chain,
            store: None,
            snapshot_ttl: Duration::ZERO,
            price,
            owners,
            slots: max_tokens.map(|n| Arc::new(Semaphore::new(n))),
            active: Arc::new(Activity::default()),
            shutdown,
        }
    }

    /// Persist each token to `store` when one of its followers stops.
    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>, ttl: Duration) -> Self {
        self.store = Some(store);
        self.snapshot_ttl = ttl;
        self
    }

    /// Number of follower tasks currently running.
    pub fn active(&self) -> usize {
        self.active.count.load(Ordering::SeqCst)
    }

    /// Resolves once no follower is running, including any final snapshot write.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.active.idle.notified();
            if self.active() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Starts the price and ownership followers for `token`.
    ///
    /// Returns `None` without spawning anything when the follow budget is
    /// exhausted; the token stays registered either way.
    pub fn spawn_for(&self, token: SharedToken) -> Option<[FollowerHandle; 2]> {
        let permit = match &self.slots {
            Some(slots) => match Arc::clone(slots).try_acquire_owned() {
                Ok(permit) => Some(Arc::new(permit)),
                Err(_) => {
                    warn!(token = %token.id(), "Follow budget exhausted, not following token");
                    return None;
                }
            },
            None => None,
        };

        let price = self.spawn(FollowerKind::Price, Arc::clone(&token), permit.clone());
        let owners = self.spawn(FollowerKind::Ownership, token, permit);
        Some([price, owners])
    }

    fn spawn(
        &self,
        kind: FollowerKind,
        token: SharedToken,
        permit: Option<Arc<OwnedSemaphorePermit>>,
    ) -> FollowerHandle {
        let config = match kind {
            FollowerKind::Price => self.price,
            FollowerKind::Ownership => self.owners,
        };
        let deadline = deadline_after(config.follow_time);
        let token_id = token.id().to_string();

        let guard = ActiveGuard::new(&self.active);
        let chain = Arc::clone(&self.chain);
        let store = self.store.clone();
        let ttl = self.snapshot_ttl;
        let mut shutdown = self.shutdown.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let _permit = permit;

            tokio::select! {
                finished = timeout_at(deadline, sampling_loop(kind, chain.as_ref(), &token, config)) => {
                    if finished.is_err() {
                        warn!(token = %token.id(), follower = %kind, "Follower hit its deadline");
                    }
                }
                _ = shutdown.cancelled() => {
                    debug!(token = %token.id(), follower = %kind, "Follower cancelled by shutdown");
                }
            }

            if let Some(store) = store {
                if let Err(e) = persist_token(store.as_ref(), &token, ttl).await {
                    warn!(token = %token.id(), error = %e, "Failed to persist token snapshot");
                }
            }
        });

        info!(token = %token_id, follower = %kind, "Follower started");

        FollowerHandle {
            kind,
            deadline,
            task,
        }
    }
}

/// Samples until `follow_time` has elapsed. Failed ticks are logged and skipped.
async fn sampling_loop(kind: FollowerKind, chain: &dyn ChainData, token: &LiveToken, config: FollowConfig) {
    let started = Instant::now();
    let mut ticker = interval(config.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if started.elapsed() >= config.follow_time {
            break;
        }

        if let Err(e) = sample(kind, chain, token).await {
            warn!(token = %token.id(), follower = %kind, error = %e, "Sample failed");
        }
    }

    debug!(token = %token.id(), follower = %kind, "Follow time elapsed");
}

async fn sample(kind: FollowerKind, chain: &dyn ChainData, token: &LiveToken) -> Result<(), ProcessorError> {
    match kind {
        FollowerKind::Price => {
            let price = chain
                .fetch_current_price(token.id(), &token.info().pools)
                .await?;
            token.append_price(price, chrono::Utc::now().timestamp());
        }
        FollowerKind::Ownership => {
            let holders = chain.fetch_top_holders(token.id()).await?;
            token.append_holders(holders);
        }
    }
    Ok(())
}
