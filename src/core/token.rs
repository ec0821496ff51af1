//! Token symbols and the static token table

use crate::core::amount;
use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSymbol {
    Usdt,
    Usdc,
    Eth,
    Wbtc,
}

impl TokenSymbol {
    pub const ALL: [TokenSymbol; 4] = [
        TokenSymbol::Usdt,
        TokenSymbol::Usdc,
        TokenSymbol::Eth,
        TokenSymbol::Wbtc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSymbol::Usdt => "usdt",
            TokenSymbol::Usdc => "usdc",
            TokenSymbol::Eth => "eth",
            TokenSymbol::Wbtc => "wbtc",
        }
    }

    /// Upper-case ticker used in messages and tables.
    pub fn ticker(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl Display for TokenSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TokenSymbol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "usdt" => Ok(TokenSymbol::Usdt),
            "usdc" => Ok(TokenSymbol::Usdc),
            "eth" => Ok(TokenSymbol::Eth),
            "wbtc" => Ok(TokenSymbol::Wbtc),
            _ => Err(anyhow!("Unknown token symbol: {}", s)),
        }
    }
}

fn zero_balance() -> String {
    "0".to_string()
}

/// One row of the token table: where the token lives and how it is scaled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenInfo {
    pub symbol: TokenSymbol,
    pub address: String,
    pub chain_id: String,
    pub decimals: u32,
    /// Demo balance in major units, used until something is persisted.
    #[serde(default = "zero_balance")]
    pub seed_balance: String,
}

impl TokenInfo {
    fn new(symbol: TokenSymbol, chain_id: &str, address: &str, decimals: u32, seed: &str) -> Self {
        TokenInfo {
            symbol,
            address: address.to_string(),
            chain_id: chain_id.to_string(),
            decimals,
            seed_balance: seed.to_string(),
        }
    }
}

pub fn default_tokens() -> Vec<TokenInfo> {
    vec![
        TokenInfo::new(
            TokenSymbol::Usdc,
            "1",
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            6,
            "1000",
        ),
        TokenInfo::new(
            TokenSymbol::Usdt,
            "137",
            "0xc2132D05D31c914a87C6611C10748AEb04B58e8F",
            6,
            "1000",
        ),
        TokenInfo::new(
            TokenSymbol::Eth,
            "8453",
            "0x0000000000000000000000000000000000000000",
            18,
            "2",
        ),
        TokenInfo::new(
            TokenSymbol::Wbtc,
            "1",
            "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599",
            18,
            "0.01",
        ),
    ]
}

/// The configured set of tradable tokens, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUniverse {
    tokens: Vec<TokenInfo>,
}

impl TokenUniverse {
    pub fn new(tokens: Vec<TokenInfo>) -> Result<Self> {
        if tokens.is_empty() {
            bail!("Token universe must contain at least one token");
        }

        let mut seen = HashSet::new();
        for token in &tokens {
            if !seen.insert(token.symbol) {
                bail!("Token {} is configured more than once", token.symbol);
            }
            if amount::to_minor_units(&token.seed_balance, token.decimals).is_none() {
                bail!(
                    "Invalid seed balance '{}' for token {}",
                    token.seed_balance,
                    token.symbol
                );
            }
        }

        Ok(Self { tokens })
    }

    pub fn get(&self, symbol: TokenSymbol) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    pub fn contains(&self, symbol: TokenSymbol) -> bool {
        self.get(symbol).is_some()
    }

    pub fn symbols(&self) -> Vec<TokenSymbol> {
        self.tokens.iter().map(|t| t.symbol).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenInfo> {
        self.tokens.iter()
    }
}

impl Default for TokenUniverse {
    fn default() -> Self {
        Self {
            tokens: default_tokens(),
        }
    }
}
