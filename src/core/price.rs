//! Pricing abstractions and core types

use crate::core::amount;
use crate::core::token::{TokenInfo, TokenSymbol};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fraction digits of a live quote.
pub const QUOTE_DECIMALS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub price_usd: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl TokenPrice {
    pub fn new(price_usd: Decimal) -> Self {
        Self {
            price_usd,
            observed_at: Utc::now(),
        }
    }

    /// The zero sentinel stored when a fetch fails.
    pub fn unavailable() -> Self {
        Self::new(Decimal::ZERO)
    }

    pub fn is_available(&self) -> bool {
        self.price_usd > Decimal::ZERO
    }
}

/// Immutable view of the latest price per token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceSnapshot {
    prices: HashMap<TokenSymbol, TokenPrice>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: TokenSymbol, price_usd: Decimal) -> Self {
        self.prices.insert(symbol, TokenPrice::new(price_usd));
        self
    }

    pub fn get(&self, symbol: TokenSymbol) -> Option<&TokenPrice> {
        self.prices.get(&symbol)
    }

    pub fn insert(&mut self, symbol: TokenSymbol, price: TokenPrice) {
        self.prices.insert(symbol, price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(TokenSymbol, TokenPrice)> for PriceSnapshot {
    fn from_iter<I: IntoIterator<Item = (TokenSymbol, TokenPrice)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// USD price of one whole token.
    async fn fetch_price(&self, token: &TokenInfo) -> Result<Decimal>;
}

/// Units of the `to` token one unit of the `from` token buys.
pub fn exchange_rate(from_price: Decimal, to_price: Decimal) -> Option<Decimal> {
    if from_price <= Decimal::ZERO || to_price <= Decimal::ZERO {
        return None;
    }
    from_price.checked_div(to_price)
}

/// Converts `amount` of one token into the other at the given USD prices.
///
/// Used for the live counter-amount while the user types. The result is
/// truncated to six fraction digits. Anything that cannot be priced gives
/// `"0"`.
pub fn convert_amount(amount: &str, from_price: Decimal, to_price: Decimal) -> String {
    let Some(value) = amount::parse_decimal(amount).filter(|v| !v.is_sign_negative()) else {
        return "0".to_string();
    };
    if from_price <= Decimal::ZERO || to_price <= Decimal::ZERO {
        return "0".to_string();
    }

    match value
        .checked_mul(from_price)
        .and_then(|usd| usd.checked_div(to_price))
    {
        Some(converted) => {
            let mut quoted =
                converted.round_dp_with_strategy(QUOTE_DECIMALS, RoundingStrategy::ToZero);
            quoted.rescale(QUOTE_DECIMALS);
            quoted.to_string()
        }
        None => "0".to_string(),
    }
}
