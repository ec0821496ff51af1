//! Decimal-string helpers for token amounts.
//!
//! Amounts cross the ledger boundary as strings. Everything in here works on
//! exact decimal digits, either through `rust_decimal` or through big integers
//! for minor units. Malformed input degrades to `"0"` (or `None`) instead of
//! failing.

use num_bigint::BigUint;
use num_traits::Zero;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Fraction digits shown for regular amounts and balances.
pub const DISPLAY_DECIMALS: u32 = 6;

/// Fraction digits shown for amounts below 0.000001.
pub const DUST_DECIMALS: u32 = 10;

/// 0.000001
fn dust_threshold() -> Decimal {
    Decimal::new(1, 6)
}

/// A plain decimal string split into its sign, integer and fraction digits.
#[derive(Debug, PartialEq, Eq)]
struct DecimalParts {
    negative: bool,
    integer: String,
    fraction: String,
}

fn split_decimal(amount: &str) -> Option<DecimalParts> {
    let amount = amount.trim();
    if amount.is_empty() {
        return None;
    }

    if amount.contains(['e', 'E']) {
        let expanded = Decimal::from_scientific(amount).ok()?;
        return split_decimal(&expanded.to_string());
    }

    let (negative, unsigned) = match amount.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount.strip_prefix('+').unwrap_or(amount)),
    };

    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer) || !all_digits(fraction) || (integer.is_empty() && fraction.is_empty())
    {
        return None;
    }

    Some(DecimalParts {
        negative,
        integer: (if integer.is_empty() { "0" } else { integer }).to_string(),
        fraction: fraction.to_string(),
    })
}

pub(crate) fn pow10(exponent: u32) -> BigUint {
    BigUint::from(10u32).pow(exponent)
}

/// Truncates the fraction of `amount` to at most `max_decimals` digits.
///
/// Never rounds up. Trailing zeros are stripped and an empty fraction leaves
/// just the integer part. Empty or non-numeric input gives `"0"`.
pub fn ensure_correct_decimals(amount: &str, max_decimals: u32) -> String {
    let Some(parts) = split_decimal(amount) else {
        return "0".to_string();
    };

    let keep = parts.fraction.len().min(max_decimals as usize);
    let fraction = parts.fraction[..keep].trim_end_matches('0');
    let sign = if parts.negative { "-" } else { "" };

    if fraction.is_empty() {
        format!("{sign}{}", parts.integer)
    } else {
        format!("{sign}{}.{fraction}", parts.integer)
    }
}

/// Parses a decimal or scientific string. Surrounding whitespace is ignored.
pub fn parse_decimal(amount: &str) -> Option<Decimal> {
    let amount = amount.trim();
    if amount.is_empty() {
        return None;
    }
    if amount.contains(['e', 'E']) {
        Decimal::from_scientific(amount).ok()
    } else {
        Decimal::from_str(amount).ok()
    }
}

/// True when `amount` is a well-formed decimal strictly greater than zero.
pub fn is_positive(amount: &str) -> bool {
    split_decimal(amount).is_some_and(|parts| {
        !parts.negative
            && parts
                .integer
                .bytes()
                .chain(parts.fraction.bytes())
                .any(|b| b != b'0')
    })
}

fn group_thousands(rendered: &str) -> String {
    let (sign, unsigned) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Renders an amount for people.
///
/// Amounts below 0.000001 keep up to ten fraction digits, everything else gets
/// thousands separators and at most six fraction digits.
pub fn format_amount(amount: &str) -> String {
    let Some(value) = parse_decimal(amount) else {
        return "0".to_string();
    };
    if value.is_zero() {
        return "0".to_string();
    }

    if value.abs() < dust_threshold() {
        let dust = value
            .round_dp_with_strategy(DUST_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
            .normalize();
        if dust.is_zero() {
            return "0".to_string();
        }
        return dust.to_string();
    }

    let rounded = value
        .round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    group_thousands(&rounded.to_string())
}

fn render_major(magnitude: &BigUint, decimals: u32, max_fraction: u32) -> String {
    let digits = magnitude.to_string();
    let width = decimals as usize;

    let (integer, fraction) = if digits.len() > width {
        let (integer, fraction) = digits.split_at(digits.len() - width);
        (integer.to_string(), fraction.to_string())
    } else {
        ("0".to_string(), format!("{digits:0>width$}"))
    };

    ensure_correct_decimals(&format!("{integer}.{fraction}"), max_fraction)
}

/// Renders a minor-unit integer string in major units, truncated to six
/// fraction digits.
pub fn format_balance(magnitude: &str, decimals: u32) -> String {
    match BigUint::from_str(magnitude.trim()) {
        Ok(magnitude) => render_major(&magnitude, decimals, DISPLAY_DECIMALS),
        Err(_) => "0".to_string(),
    }
}

/// Renders a minor-unit magnitude in major units at full precision.
pub fn to_major_units(magnitude: &BigUint, decimals: u32) -> String {
    render_major(magnitude, decimals, decimals)
}

/// Scales a non-negative major-unit amount to minor units.
///
/// Fraction digits beyond `decimals` are dropped, so the result is the largest
/// whole number of minor units not exceeding `amount`.
pub fn to_minor_units(amount: &str, decimals: u32) -> Option<BigUint> {
    let parts = split_decimal(amount)?;
    if parts.negative {
        return None;
    }

    let keep = parts.fraction.len().min(decimals as usize);
    let mut digits = String::with_capacity(parts.integer.len() + decimals as usize);
    digits.push_str(&parts.integer);
    digits.push_str(&parts.fraction[..keep]);
    digits.push_str(&"0".repeat(decimals as usize - keep));

    BigUint::from_str(&digits).ok()
}

/// Compares a balance against a requested major-unit amount at the precision
/// the caller typed. Returns `Some(true)` when the balance covers it and `None`
/// when `requested` is not a non-negative decimal.
pub fn covers(balance: &BigUint, decimals: u32, requested: &str) -> Option<bool> {
    let parts = split_decimal(requested)?;
    if parts.negative {
        return None;
    }

    let scale = parts.fraction.len() as u32;
    let requested = BigUint::from_str(&format!("{}{}", parts.integer, parts.fraction)).ok()?;
    if requested.is_zero() {
        return Some(true);
    }

    // balance / 10^decimals >= requested / 10^scale
    Some(balance * pow10(scale) >= requested * pow10(decimals))
}
