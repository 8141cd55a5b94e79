use crate::models::{
    HolderSeries, HolderSnapshot, PricePoint, PriceSeries, Token, UnixTime, VolumeSeries,
};
use crate::revival::{RevivalError, Reviver};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{error, info, warn};

// ==========================================
// LIVE TOKEN
// ==========================================

/// A registry-resident token.
///
/// Static mint data is immutable once registered. Each series sits behind
/// its own lock, so the price follower, the ownership follower and the swap
/// path can append concurrently without tearing a single entry. Nothing is
/// promised about ordering across series.
#[derive(Debug)]
pub struct LiveToken {
    info: Token,
    prices: Mutex<PriceSeries>,
    volumes: Mutex<VolumeSeries>,
    largest_holders: Mutex<HolderSeries>,
    last_cache_update: Mutex<Option<UnixTime>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LiveToken {
    pub fn from_token(mut token: Token) -> Self {
        let prices = std::mem::take(&mut token.prices);
        let volumes = std::mem::take(&mut token.volumes);
        let largest_holders = std::mem::take(&mut token.largest_holders);
        let last_cache_update = token.last_cache_update.take();

        Self {
            info: token,
            prices: Mutex::new(prices),
            volumes: Mutex::new(volumes),
            largest_holders: Mutex::new(largest_holders),
            last_cache_update: Mutex::new(last_cache_update),
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Static mint data. The series fields of the returned value are empty;
    /// use [`LiveToken::snapshot`] for a full copy.
    pub fn info(&self) -> &Token {
        &self.info
    }

    /// Consistent copy of every series, each read under its own lock.
    pub fn snapshot(&self) -> Token {
        let mut token = self.info.clone();
        token.prices = lock(&self.prices).clone();
        token.volumes = lock(&self.volumes).clone();
        token.largest_holders = lock(&self.largest_holders).clone();
        token.last_cache_update = *lock(&self.last_cache_update);
        token
    }

    // ---------- Mutators ----------

    pub fn append_price(&self, price: Decimal, time: UnixTime) {
        lock(&self.prices).append(PricePoint { price, time });
    }

    /// Adds `delta` to the running volume total.
    pub fn append_volume_delta(&self, delta: f64, time: UnixTime) {
        lock(&self.volumes).append_delta(delta, time);
    }

    pub fn append_holders(&self, snapshot: HolderSnapshot) {
        lock(&self.largest_holders).append(snapshot);
    }

    pub fn mark_cached(&self, time: UnixTime) {
        *lock(&self.last_cache_update) = Some(time);
    }

    // ---------- Accessors ----------

    pub fn with_prices<R>(&self, f: impl FnOnce(&PriceSeries) -> R) -> R {
        f(&lock(&self.prices))
    }

    pub fn with_volumes<R>(&self, f: impl FnOnce(&VolumeSeries) -> R) -> R {
        f(&lock(&self.volumes))
    }

    pub fn with_holders<R>(&self, f: impl FnOnce(&HolderSeries) -> R) -> R {
        f(&lock(&self.largest_holders))
    }

    pub fn latest_price(&self) -> Option<Decimal> {
        self.with_prices(|s| s.latest().map(|p| p.price))
    }

    pub fn price_at_time(&self, at: UnixTime) -> Option<Decimal> {
        self.with_prices(|s| s.at_time(at).map(|p| p.price))
    }

    pub fn latest_volume(&self) -> Option<f64> {
        self.with_volumes(|s| s.latest().map(|v| v.volume))
    }

    pub fn volume_at_time(&self, at: UnixTime) -> Option<f64> {
        self.with_volumes(|s| s.at_time(at).map(|v| v.volume))
    }

    pub fn top_ownership_percentage(&self) -> Option<f64> {
        self.with_holders(|s| s.latest().map(|h| h.top_ownership_percentage))
    }
}

// ==========================================
// REGISTRY
// ==========================================

pub type SharedToken = Arc<LiveToken>;

/// Process-wide map from token id to its live state.
///
/// Cloning is cheap and every clone sees the same map. Map operations hold
/// the lock only for the lookup or insert itself, never across an await.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: Arc<RwLock<HashMap<String, SharedToken>>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token_id: &str) -> Option<SharedToken> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token_id)
            .cloned()
    }

    /// Registers `token` under `token_id`, replacing any previous entry.
    pub fn put(&self, token_id: impl Into<String>, token: Token) -> SharedToken {
        let live = Arc::new(LiveToken::from_token(token));
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token_id.into(), Arc::clone(&live));
        live
    }

    /// Registers `token` only if `token_id` is not resident yet.
    ///
    /// Returns `None` and leaves the resident entry untouched otherwise.
    pub fn insert_if_absent(&self, token_id: impl Into<String>, token: Token) -> Option<SharedToken> {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        match tokens.entry(token_id.into()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(Arc::clone(
                slot.insert(Arc::new(LiveToken::from_token(token))),
            )),
        }
    }

    /// Looks up `token_id`, falling back to the snapshot store on a miss.
    ///
    /// A revived token is only inserted if no other caller registered the id
    /// while the store was being queried; the resident entry wins otherwise.
    /// Store failures are logged and reported as a miss.
    pub async fn get_or_revive(&self, token_id: &str, reviver: &Reviver) -> Option<SharedToken> {
        if let Some(token) = self.get(token_id) {
            return Some(token);
        }

        warn!(token = %token_id, "Token not in registry, searching cache");

        let revived = match reviver.revive(token_id).await {
            Ok(token) => token,
            Err(RevivalError::NotCached(_)) => {
                warn!(token = %token_id, "Token not found in cache");
                return None;
            }
            Err(e) => {
                error!(token = %token_id, error = %e, "Cache lookup failed");
                return None;
            }
        };

        let live = {
            let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                tokens
                    .entry(token_id.to_string())
                    .or_insert_with(|| Arc::new(LiveToken::from_token(revived))),
            )
        };

        info!(token = %token_id, "Revived token from cache");
        Some(live)
    }

    pub fn len(&self) -> usize {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, token_id: &str) -> bool {
        self.get(token_id).is_some()
    }

    /// Handles to every resident token.
    pub fn tokens(&self) -> Vec<SharedToken> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
