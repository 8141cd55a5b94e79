use super::series::{Sample, TimeSeries, UnixTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// 1. TIME-SERIES SAMPLES
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Decimal,
    pub time: UnixTime,
}

/// Running total of traded volume at `time`, not the per-interval amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumePoint {
    pub volume: f64,
    pub time: UnixTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargestHolder {
    pub holder: String,
    pub amount: f64,
}

/// Top-holder distribution sampled at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderSnapshot {
    pub holders: Vec<LargestHolder>,
    pub top_ownership_percentage: f64,
    pub time: UnixTime,
}

impl Sample for PricePoint {
    fn time(&self) -> UnixTime {
        self.time
    }
}

impl Sample for VolumePoint {
    fn time(&self) -> UnixTime {
        self.time
    }
}

impl Sample for HolderSnapshot {
    fn time(&self) -> UnixTime {
        self.time
    }
}

pub type PriceSeries = TimeSeries<PricePoint>;
pub type VolumeSeries = TimeSeries<VolumePoint>;
pub type HolderSeries = TimeSeries<HolderSnapshot>;

impl TimeSeries<VolumePoint> {
    /// Appends `latest + delta`, treating an empty series as zero.
    pub fn append_delta(&mut self, delta: f64, time: UnixTime) {
        let current = self.latest().map(|v| v.volume).unwrap_or(0.0);
        self.append(VolumePoint {
            volume: current + delta,
            time,
        });
    }
}

// ==========================================
// 2. TOKEN AGGREGATE
// ==========================================

/// Liquidity pool vaults the token trades against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolAccounts {
    pub base_pool_account: String,
    pub quote_pool_account: String,
}

/// A tracked token: static mint data plus its accumulated time-series.
///
/// This is the plain, serializable form used for chain fetches and cache
/// snapshots. Tokens resident in the registry are wrapped in
/// [`crate::registry::LiveToken`], which guards each series separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub uri: Option<String>,
    pub decimals: u8,
    /// Raw supply in base units.
    pub supply: u64,
    /// Supply divided by 10^decimals.
    pub real_supply: f64,
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
    #[serde(default)]
    pub pools: PoolAccounts,
    pub is_initialized: bool,
    /// Block time of the pool creation.
    pub ipo: UnixTime,
    pub discovered_at: UnixTime,
    #[serde(default)]
    pub total_burned: u64,
    #[serde(default)]
    pub last_cache_update: Option<UnixTime>,

    #[serde(default)]
    pub prices: PriceSeries,
    #[serde(default)]
    pub volumes: VolumeSeries,
    #[serde(default)]
    pub largest_holders: HolderSeries,
}

/// Every series of a token evaluated at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAsOf {
    pub id: String,
    pub at: UnixTime,
    pub price: Option<Decimal>,
    pub volume: Option<f64>,
    pub top_ownership_percentage: Option<f64>,
    pub top_holders: Option<Vec<LargestHolder>>,
}

impl Token {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    // ---------- Price access ----------

    pub fn latest_price(&self) -> Option<Decimal> {
        self.prices.latest().map(|p| p.price)
    }

    pub fn price_at_time(&self, at: UnixTime) -> Option<Decimal> {
        self.prices.at_time(at).map(|p| p.price)
    }

    pub fn price_at_index(&self, index: usize) -> Option<Decimal> {
        self.prices.at_index(index).map(|p| p.price)
    }

    // ---------- Volume access ----------

    pub fn latest_volume(&self) -> Option<f64> {
        self.volumes.latest().map(|v| v.volume)
    }

    pub fn volume_at_time(&self, at: UnixTime) -> Option<f64> {
        self.volumes.at_time(at).map(|v| v.volume)
    }

    pub fn volume_at_index(&self, index: usize) -> Option<f64> {
        self.volumes.at_index(index).map(|v| v.volume)
    }

    // ---------- Holder access ----------

    pub fn top_holders(&self) -> Option<&[LargestHolder]> {
        self.largest_holders.latest().map(|h| h.holders.as_slice())
    }

    pub fn top_ownership_percentage(&self) -> Option<f64> {
        self.largest_holders
            .latest()
            .map(|h| h.top_ownership_percentage)
    }

    pub fn top_holders_at_time(&self, at: UnixTime) -> Option<&[LargestHolder]> {
        self.largest_holders.at_time(at).map(|h| h.holders.as_slice())
    }

    pub fn top_ownership_percentage_at_time(&self, at: UnixTime) -> Option<f64> {
        self.largest_holders
            .at_time(at)
            .map(|h| h.top_ownership_percentage)
    }

    pub fn top_holders_at_index(&self, index: usize) -> Option<&[LargestHolder]> {
        self.largest_holders
            .at_index(index)
            .map(|h| h.holders.as_slice())
    }

    pub fn top_ownership_percentage_at_index(&self, index: usize) -> Option<f64> {
        self.largest_holders
            .at_index(index)
            .map(|h| h.top_ownership_percentage)
    }

    pub fn as_of(&self, at: UnixTime) -> TokenAsOf {
        TokenAsOf {
            id: self.id.clone(),
            at,
            price: self.price_at_time(at),
            volume: self.volume_at_time(at),
            top_ownership_percentage: self.top_ownership_percentage_at_time(at),
            top_holders: self.top_holders_at_time(at).map(<[LargestHolder]>::to_vec),
        }
    }
}
