use super::util::with_retry;
use crate::core::amount;
use crate::core::config::PriceProviderConfig;
use crate::core::price::PriceProvider;
use crate::core::token::TokenInfo;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, instrument};

/// USD prices from the asset price endpoint of the Funkit API.
pub struct FunkitPriceProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retries: usize,
    retry_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetPriceResponse {
    unit_price: Option<Value>,
}

impl FunkitPriceProvider {
    pub fn new(config: &PriceProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("mockswap/1.0")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key(),
            retries: config.retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    fn price_url(&self, token: &TokenInfo) -> String {
        format!(
            "{}/asset/price/{}/{}",
            self.base_url, token.chain_id, token.address
        )
    }
}

/// `unitPrice` comes back as a JSON number or a numeric string.
fn parse_unit_price(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => amount::parse_decimal(&n.to_string()),
        Value::String(s) => amount::parse_decimal(s),
        _ => None,
    }
}

#[async_trait]
impl PriceProvider for FunkitPriceProvider {
    #[instrument(skip(self, token), fields(symbol = %token.symbol))]
    async fn fetch_price(&self, token: &TokenInfo) -> Result<Decimal> {
        let url = self.price_url(token);
        debug!("Requesting price data from {}", url);

        let response = with_retry(
            || async {
                self.client
                    .get(&url)
                    .header("X-Api-Key", &self.api_key)
                    .send()
                    .await?
                    .error_for_status()
            },
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .with_context(|| format!("Price request failed for {}", token.symbol))?;

        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for {}", token.symbol))?;

        if response_text.trim().is_empty() {
            return Err(anyhow!("Received empty price response for {}", token.symbol));
        }

        let parsed: AssetPriceResponse = match serde_json::from_str(&response_text) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    error = ?e,
                    response = %response_text,
                    "Failed to parse price response"
                );
                return Err(e)
                    .with_context(|| format!("Failed to parse price response for {}", token.symbol));
            }
        };

        let raw = parsed
            .unit_price
            .ok_or_else(|| anyhow!("Price response for {} has no unitPrice", token.symbol))?;
        let price = parse_unit_price(&raw)
            .ok_or_else(|| anyhow!("Invalid unitPrice for {}: {}", token.symbol, raw))?;
        if price.is_sign_negative() {
            bail!("Negative unitPrice for {}: {}", token.symbol, price);
        }

        debug!("Fetched price for {}: {}", token.symbol, price);
        Ok(price)
    }
}
