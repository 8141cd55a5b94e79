use crate::error::ProcessorError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// How long and how often a follower samples one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowConfig {
    pub follow_time: Duration,
    pub interval: Duration,
}

/// Process-wide settings, loaded once before any listener starts.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub redis_url: String,
    pub new_pairs_channel: String,
    pub swaps_channel: String,
    pub burns_channel: String,
    pub rpc_url: String,
    pub price: FollowConfig,
    pub owners: FollowConfig,
    pub metadata_timeout: Duration,
    /// Maximum tokens followed at once, `None` when unbounded.
    pub max_followed_tokens: Option<usize>,
    /// `None` disables periodic snapshot write-back.
    pub snapshot_interval: Option<Duration>,
    pub snapshot_ttl: Duration,
}

impl AppConfig {
    /// Environment variables:
    /// - `REDIS_URL` (default: redis://127.0.0.1:6379)
    /// - `NEW_PAIRS_CHANNEL`, `SWAPS_CHANNEL`, `BURNS_CHANNEL`
    /// - `RPC_URL`, or `HELIUS_API_KEY` for the Helius mainnet endpoint
    /// - `PRICE_FOLLOW_TIME` / `PRICE_INTERVAL` (seconds, default 600 / 5)
    /// - `OWNERS_FOLLOW_TIME` / `OWNERS_INTERVAL` (seconds, default 600 / 30)
    /// - `METADATA_TIMEOUT` (seconds, default 10)
    /// - `MAX_FOLLOWED_TOKENS` (default 1000, 0 = unbounded)
    /// - `SNAPSHOT_INTERVAL` (seconds, default 60, 0 = disabled)
    /// - `SNAPSHOT_TTL` (seconds, default 86400)
    pub fn from_env() -> Result<Self, ProcessorError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProcessorError> {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let rpc_url = match (lookup("RPC_URL"), lookup("HELIUS_API_KEY")) {
            (Some(url), _) => url,
            (None, Some(api_key)) => format!("https://mainnet.helius-rpc.com/?api-key={}", api_key),
            (None, None) => {
                return Err(ProcessorError::Config(
                    "RPC_URL or HELIUS_API_KEY must be set".to_string(),
                ));
            }
        };

        let max_followed: usize = parse(&lookup, "MAX_FOLLOWED_TOKENS", 1_000)?;
        let snapshot_interval = seconds(&lookup, "SNAPSHOT_INTERVAL", 60)?;

        Ok(Self {
            redis_url: string("REDIS_URL", "redis://127.0.0.1:6379"),
            new_pairs_channel: string("NEW_PAIRS_CHANNEL", "new_pairs"),
            swaps_channel: string("SWAPS_CHANNEL", "swaps"),
            burns_channel: string("BURNS_CHANNEL", "burns"),
            rpc_url,
            price: FollowConfig {
                follow_time: seconds(&lookup, "PRICE_FOLLOW_TIME", 600)?,
                interval: seconds(&lookup, "PRICE_INTERVAL", 5)?,
            },
            owners: FollowConfig {
                follow_time: seconds(&lookup, "OWNERS_FOLLOW_TIME", 600)?,
                interval: seconds(&lookup, "OWNERS_INTERVAL", 30)?,
            },
            metadata_timeout: seconds(&lookup, "METADATA_TIMEOUT", 10)?,
            max_followed_tokens: (max_followed > 0).then_some(max_followed),
            snapshot_interval: (!snapshot_interval.is_zero()).then_some(snapshot_interval),
            snapshot_ttl: seconds(&lookup, "SNAPSHOT_TTL", 86_400)?,
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ProcessorError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ProcessorError::Config(format!("{key} is not a valid number: {raw}"))),
        None => Ok(default),
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ProcessorError> {
    parse(lookup, key, default).map(Duration::from_secs)
}
