//! Swap arithmetic and results.
//!
//! Minor-unit amounts are big integers and prices enter as exact
//! `mantissa / 10^scale` fractions, so the buy amount is one floor division
//! with no intermediate rounding.

use crate::core::amount::{self, pow10};
use num_bigint::BigUint;
use num_traits::{CheckedSub, Zero};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SwapError {
    #[error("Token does not exist")]
    UnknownToken,
    #[error("Cannot swap the same token")]
    SameToken,
    #[error("Invalid sell amount")]
    InvalidAmount,
    #[error("Cannot get token prices")]
    PricesUnavailable,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Error calculating swap amounts")]
    Calculation,
    #[error("Failed to save balances")]
    Persistence,
    #[error("Failed to load balances")]
    BalancesUnavailable,
}

/// What a caller gets back from a swap. Amounts are in major units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapResult {
    pub counter_amount: String,
    pub sell_amount: String,
    pub success: bool,
    pub message: Option<String>,
}

impl SwapResult {
    pub fn succeeded(sell_amount: String, counter_amount: String) -> Self {
        Self {
            counter_amount,
            sell_amount,
            success: true,
            message: None,
        }
    }
}

impl From<SwapError> for SwapResult {
    fn from(err: SwapError) -> Self {
        Self {
            counter_amount: "0".to_string(),
            sell_amount: "0".to_string(),
            success: false,
            message: Some(err.to_string()),
        }
    }
}

/// Minor-unit magnitudes of one side of a swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub magnitude: BigUint,
    pub decimals: u32,
}

/// The debit and credit a swap will apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    pub sell_minor: BigUint,
    pub buy_minor: BigUint,
    pub new_sell_balance: BigUint,
    pub new_buy_balance: BigUint,
}

fn price_fraction(price: Decimal) -> Option<(BigUint, u32)> {
    if price.is_sign_negative() {
        return None;
    }
    let mantissa = u128::try_from(price.mantissa()).ok()?;
    Some((BigUint::from(mantissa), price.scale()))
}

/// Buy-token minor units received for `sell_minor` sell-token minor units.
///
/// `floor(sell_minor * sell_price * 10^buy_decimals / (buy_price * 10^sell_decimals))`
pub fn buy_minor_units(
    sell_minor: &BigUint,
    sell_decimals: u32,
    buy_decimals: u32,
    sell_price: Decimal,
    buy_price: Decimal,
) -> Result<BigUint, SwapError> {
    let (sell_mantissa, sell_scale) = price_fraction(sell_price).ok_or(SwapError::Calculation)?;
    let (buy_mantissa, buy_scale) = price_fraction(buy_price).ok_or(SwapError::Calculation)?;
    if buy_mantissa.is_zero() {
        return Err(SwapError::Calculation);
    }

    let numerator = sell_minor * sell_mantissa * pow10(buy_scale + buy_decimals);
    let denominator = buy_mantissa * pow10(sell_scale + sell_decimals);
    let buy_minor = numerator / denominator;

    debug!(
        %sell_minor, sell_decimals, buy_decimals, %sell_price, %buy_price, %buy_minor,
        "Computed buy amount"
    );
    Ok(buy_minor)
}

/// Works out both new balances without touching either.
pub fn plan(
    sell: &Leg,
    buy: &Leg,
    sell_amount: &str,
    sell_price: Decimal,
    buy_price: Decimal,
) -> Result<SwapPlan, SwapError> {
    let sell_minor =
        amount::to_minor_units(sell_amount, sell.decimals).ok_or(SwapError::InvalidAmount)?;
    if sell_minor.is_zero() {
        return Err(SwapError::InvalidAmount);
    }

    let new_sell_balance = sell
        .magnitude
        .checked_sub(&sell_minor)
        .ok_or(SwapError::InsufficientBalance)?;
    let buy_minor = buy_minor_units(
        &sell_minor,
        sell.decimals,
        buy.decimals,
        sell_price,
        buy_price,
    )?;
    let new_buy_balance = &buy.magnitude + &buy_minor;

    Ok(SwapPlan {
        sell_minor,
        buy_minor,
        new_sell_balance,
        new_buy_balance,
    })
}
