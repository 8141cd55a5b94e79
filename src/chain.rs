use crate::error::ProcessorError;
use crate::models::{HolderSnapshot, LargestHolder, PoolAccounts, Token};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

/// On-chain data needed to discover and sample a token.
#[async_trait]
pub trait ChainData: Send + Sync {
    /// Static mint data for `token_id`. The returned token has empty series.
    async fn fetch_token_metadata(
        &self,
        token_id: &str,
        commitment: Commitment,
        pools: &PoolAccounts,
    ) -> Result<Token, ProcessorError>;

    /// Current quote-per-base price from the pool vault balances.
    async fn fetch_current_price(
        &self,
        token_id: &str,
        pools: &PoolAccounts,
    ) -> Result<Decimal, ProcessorError>;

    async fn fetch_top_holders(&self, token_id: &str) -> Result<HolderSnapshot, ProcessorError>;
}

// ==========================================
// JSON-RPC WIRE TYPES
// ==========================================

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct ParsedAccount {
    data: ParsedData,
}

#[derive(Debug, Deserialize)]
struct ParsedData {
    parsed: ParsedMint,
}

#[derive(Debug, Deserialize)]
struct ParsedMint {
    info: MintInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MintInfo {
    decimals: u8,
    supply: String,
    mint_authority: Option<String>,
    freeze_authority: Option<String>,
    is_initialized: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiTokenAmount {
    ui_amount: Option<f64>,
    ui_amount_string: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LargestAccount {
    address: String,
    ui_amount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Asset {
    #[serde(default)]
    content: AssetContent,
}

#[derive(Debug, Default, Deserialize)]
struct AssetContent {
    json_uri: Option<String>,
    #[serde(default)]
    metadata: AssetMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct AssetMetadata {
    name: Option<String>,
    symbol: Option<String>,
}

// ==========================================
// RPC CLIENT
// ==========================================

const MAX_RETRIES: u64 = 5;

/// [`ChainData`] backed by a Solana JSON-RPC endpoint.
///
/// Name, symbol and URI come from the DAS `getAsset` method when the
/// endpoint supports it (Helius does); a failure there leaves them unset.
#[derive(Debug, Clone)]
pub struct RpcChainData {
    client: reqwest::Client,
    rpc_url: String,
}

impl RpcChainData {
    pub fn new(rpc_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ProcessorError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ProcessorError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut attempt = 0;
        loop {
            attempt += 1;
            let resp = self.client.post(&self.rpc_url).json(&request).send().await?;

            if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_RETRIES {
                    return Err(ProcessorError::Rpc(format!("{method}: rate limited")));
                }
                warn!(method, attempt, "Rate limited, cooling down");
                sleep(Duration::from_millis(250 * attempt)).await;
                continue;
            }

            let body: RpcResponse<T> = resp.error_for_status()?.json().await?;
            if let Some(error) = body.error {
                return Err(ProcessorError::Rpc(format!("{method}: {error}")));
            }
            return body
                .result
                .ok_or_else(|| ProcessorError::Rpc(format!("{method}: empty result")));
        }
    }

    async fn vault_balance(&self, account: &str) -> Result<Decimal, ProcessorError> {
        let balance: WithContext<UiTokenAmount> = self
            .call("getTokenAccountBalance", json!([account]))
            .await?;
        Decimal::from_str(&balance.value.ui_amount_string)
            .map_err(|e| ProcessorError::Rpc(format!("bad balance for {account}: {e}")))
    }
}

#[async_trait]
impl ChainData for RpcChainData {
    async fn fetch_token_metadata(
        &self,
        token_id: &str,
        commitment: Commitment,
        pools: &PoolAccounts,
    ) -> Result<Token, ProcessorError> {
        let account: WithContext<Option<ParsedAccount>> = self
            .call(
                "getAccountInfo",
                json!([token_id, { "encoding": "jsonParsed", "commitment": commitment }]),
            )
            .await?;
        let mint = account
            .value
            .ok_or_else(|| ProcessorError::Rpc(format!("mint account {token_id} not found")))?
            .data
            .parsed
            .info;

        let supply: u64 = mint
            .supply
            .parse()
            .map_err(|e| ProcessorError::Rpc(format!("bad supply for {token_id}: {e}")))?;

        let asset = match self.call::<Asset>("getAsset", json!({ "id": token_id })).await {
            Ok(asset) => asset,
            Err(e) => {
                debug!(token = %token_id, error = %e, "No asset metadata");
                Asset::default()
            }
        };

        Ok(Token {
            id: token_id.to_string(),
            name: asset.content.metadata.name,
            symbol: asset.content.metadata.symbol,
            uri: asset.content.json_uri,
            decimals: mint.decimals,
            supply,
            real_supply: supply as f64 / 10f64.powi(i32::from(mint.decimals)),
            mint_authority: mint.mint_authority,
            freeze_authority: mint.freeze_authority,
            pools: pools.clone(),
            is_initialized: mint.is_initialized,
            ..Token::default()
        })
    }

    async fn fetch_current_price(
        &self,
        token_id: &str,
        pools: &PoolAccounts,
    ) -> Result<Decimal, ProcessorError> {
        let base = self.vault_balance(&pools.base_pool_account).await?;
        let quote = self.vault_balance(&pools.quote_pool_account).await?;

        if base.is_zero() {
            return Err(ProcessorError::Rpc(format!("empty base vault for {token_id}")));
        }
        Ok(quote / base)
    }

    async fn fetch_top_holders(&self, token_id: &str) -> Result<HolderSnapshot, ProcessorError> {
        let largest: WithContext<Vec<LargestAccount>> = self
            .call("getTokenLargestAccounts", json!([token_id]))
            .await?;
        let supply: WithContext<UiTokenAmount> =
            self.call("getTokenSupply", json!([token_id])).await?;

        let holders: Vec<LargestHolder> = largest
            .value
            .into_iter()
            .map(|account| LargestHolder {
                holder: account.address,
                amount: account.ui_amount.unwrap_or(0.0),
            })
            .collect();

        Ok(HolderSnapshot {
            top_ownership_percentage: ownership_percentage(&holders, supply.value.ui_amount),
            holders,
            time: chrono::Utc::now().timestamp(),
        })
    }
}

/// Share of `supply` held by `holders`, in percent. Zero when supply is unknown.
fn ownership_percentage(holders: &[LargestHolder], supply: Option<f64>) -> f64 {
    match supply {
        Some(supply) if supply > 0.0 => {
            holders.iter().map(|h| h.amount).sum::<f64>() / supply * 100.0
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_percentage_of_supply() {
        let holders = vec![
            LargestHolder {
                holder: "a".into(),
                amount: 150.0,
            },
            LargestHolder {
                holder: "b".into(),
                amount: 50.0,
            },
        ];
        assert_eq!(ownership_percentage(&holders, Some(1_000.0)), 20.0);
        assert_eq!(ownership_percentage(&holders, Some(0.0)), 0.0);
        assert_eq!(ownership_percentage(&holders, None), 0.0);
    }

    #[test]
    fn decodes_parsed_mint_account() {
        let raw = r#"{"context":{"slot":1},"value":{"data":{"parsed":{"info":{
            "decimals":6,"freezeAuthority":null,"isInitialized":true,
            "mintAuthority":"Auth111","supply":"1000000000000000"},"type":"mint"},
            "program":"spl-token","space":82},"executable":false,"lamports":1,"owner":"x"}}"#;
        let account: WithContext<Option<ParsedAccount>> = serde_json::from_str(raw).unwrap();
        let info = account.value.unwrap().data.parsed.info;

        assert_eq!(info.decimals, 6);
        assert_eq!(info.supply, "1000000000000000");
        assert_eq!(info.mint_authority.as_deref(), Some("Auth111"));
        assert!(info.freeze_authority.is_none());
    }

    #[test]
    fn rpc_error_body_is_kept() {
        let raw = r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid param"},"id":1}"#;
        let body: RpcResponse<Value> = serde_json::from_str(raw).unwrap();
        assert!(body.result.is_none());
        assert!(body.error.is_some());
    }

    #[test]
    fn commitment_serializes_lowercase() {
        assert_eq!(json!(Commitment::Finalized), json!("finalized"));
    }
}
