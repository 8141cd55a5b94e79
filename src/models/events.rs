use super::series::UnixTime;
use super::token::PoolAccounts;
use crate::error::ProcessorError;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Wire envelope published on every channel: `{ "type": ..., "data": {...} }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "type", alias = "Type", default)]
    pub kind: Option<String>,
    #[serde(alias = "Data")]
    pub data: T,
}

pub type NewPairEvent = Envelope<NewPair>;
pub type SwapEvent = Envelope<Swap>;
pub type BurnEvent = Envelope<Burn>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPair {
    #[serde(alias = "BaseToken")]
    pub base_token: String,
    #[serde(alias = "BasePoolAccount")]
    pub base_pool_account: String,
    #[serde(alias = "QuotePoolAccount")]
    pub quote_pool_account: String,
    #[serde(alias = "BlockTime")]
    pub block_time: UnixTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swap {
    #[serde(alias = "TokenAddress")]
    pub token_address: String,
    #[serde(alias = "Signature", default)]
    pub signature: Option<String>,
    #[serde(alias = "IsBuy", default)]
    pub is_buy: bool,
    /// Base token amount, UI units.
    #[serde(alias = "TokenAmount", default)]
    pub token_amount: f64,
    /// Quote (SOL) amount, UI units.
    #[serde(alias = "QuoteAmount", alias = "SolAmount", default)]
    pub quote_amount: f64,
    /// Execution price if the publisher already computed it.
    #[serde(alias = "Price", default)]
    pub price: Option<Decimal>,
    #[serde(alias = "BlockTime", default)]
    pub block_time: Option<UnixTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Burn {
    #[serde(alias = "TokenAddress")]
    pub token_address: String,
    #[serde(alias = "Amount", default)]
    pub amount: u64,
    #[serde(alias = "Signature", default)]
    pub signature: Option<String>,
    #[serde(alias = "BlockTime", default)]
    pub block_time: Option<UnixTime>,
}

/// Decodes a raw channel payload into its event form.
pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, ProcessorError> {
    Ok(serde_json::from_str(payload)?)
}

impl NewPair {
    /// Pool accounts, rejected unless both are valid base58 public keys.
    pub fn pool_accounts(&self) -> Result<PoolAccounts, ProcessorError> {
        for account in [&self.base_pool_account, &self.quote_pool_account] {
            Pubkey::from_str(account)
                .map_err(|_| ProcessorError::InvalidAddress(account.clone()))?;
        }

        Ok(PoolAccounts {
            base_pool_account: self.base_pool_account.clone(),
            quote_pool_account: self.quote_pool_account.clone(),
        })
    }
}
