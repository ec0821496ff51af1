use super::ui;
use crate::core::amount;
use crate::core::cache::PriceCache;
use crate::core::ledger::Ledger;
use crate::core::price::{self, PriceSnapshot};
use crate::core::swap::SwapResult;
use crate::core::token::TokenSymbol;
use anyhow::{Context, Result, bail};
use std::time::Duration;
use tracing::debug;

/// One-line live quote, e.g. `100 USDT ≈ 0.05 ETH (1 USDT = 0.0005 ETH)`.
pub fn quote_line(sell: TokenSymbol, buy: TokenSymbol, sell_amount: &str, prices: &PriceSnapshot) -> String {
    let sell_price = prices.get(sell).map(|p| p.price_usd).unwrap_or_default();
    let buy_price = prices.get(buy).map(|p| p.price_usd).unwrap_or_default();

    let counter = price::convert_amount(sell_amount, sell_price, buy_price);
    let rate = price::exchange_rate(sell_price, buy_price)
        .map_or("N/A".to_string(), |r| amount::format_amount(&r.to_string()));

    format!(
        "{} {} ≈ {} {} {}",
        amount::format_amount(sell_amount),
        sell.ticker(),
        ui::style_text(&amount::format_amount(&counter), ui::StyleType::TotalValue),
        buy.ticker(),
        ui::style_text(
            &format!("(1 {} = {} {})", sell.ticker(), rate, buy.ticker()),
            ui::StyleType::Subtle
        ),
    )
}

pub async fn quote(cache: &PriceCache, sell: TokenSymbol, buy: TokenSymbol, sell_amount: &str) -> Result<()> {
    let pb = ui::new_spinner("Fetching prices...");
    cache.refresh(&[sell, buy]).await;
    pb.finish_and_clear();

    println!("{}", quote_line(sell, buy, sell_amount, &cache.snapshot().await));
    Ok(())
}

/// True when both sides of the pair have a usable price.
pub fn is_priced(sell: TokenSymbol, buy: TokenSymbol, prices: &PriceSnapshot) -> bool {
    [sell, buy]
        .iter()
        .all(|symbol| prices.get(*symbol).is_some_and(|p| p.is_available()))
}

/// Reprints the quote after every price refresh until Ctrl-C.
///
/// A refresh that leaves the pair unpriced asks for one early retry instead of
/// waiting out the full interval.
pub async fn watch_quote(
    cache: &PriceCache,
    sell: TokenSymbol,
    buy: TokenSymbol,
    sell_amount: &str,
    interval: Duration,
    debounce: Duration,
) -> Result<()> {
    let mut revisions = cache.subscribe();
    let refresher = cache.spawn_refresher(interval, debounce);
    println!(
        "{}",
        ui::style_text("Watching prices, press Ctrl-C to stop", ui::StyleType::Subtle)
    );

    let mut retried = false;
    loop {
        tokio::select! {
            changed = revisions.changed() => {
                changed.context("Price refresher stopped")?;
                debug!(revision = *revisions.borrow_and_update(), "Prices refreshed");
                let prices = cache.snapshot().await;
                println!("{}", quote_line(sell, buy, sell_amount, &prices));

                if is_priced(sell, buy, &prices) {
                    retried = false;
                } else if !retried {
                    debug!("Quote unpriced, requesting an early refresh");
                    refresher.nudge();
                    retried = true;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    refresher.shutdown();
    Ok(())
}

pub fn display_result(sell: TokenSymbol, buy: TokenSymbol, result: &SwapResult) -> String {
    if result.success {
        format!(
            "{} Sold {} {} for {} {}",
            ui::style_text("Swap complete.", ui::StyleType::Success),
            amount::format_amount(&result.sell_amount),
            sell.ticker(),
            amount::format_amount(&result.counter_amount),
            buy.ticker()
        )
    } else {
        ui::style_text(
            &format!(
                "Swap failed: {}",
                result.message.as_deref().unwrap_or("unknown error")
            ),
            ui::StyleType::Error,
        )
    }
}

pub async fn swap(
    ledger: &Ledger,
    cache: &PriceCache,
    sell: TokenSymbol,
    buy: TokenSymbol,
    sell_amount: &str,
) -> Result<()> {
    let pb = ui::new_spinner("Fetching prices...");
    cache.refresh(&[sell, buy]).await;
    let prices = cache.snapshot().await;

    pb.set_message(format!("Swapping {} for {}...", sell.ticker(), buy.ticker()));
    let result = ledger.swap(sell, buy, sell_amount, &prices).await;
    pb.finish_and_clear();

    println!("{}", display_result(sell, buy, &result));
    if !result.success {
        bail!(
            "{}",
            result.message.unwrap_or_else(|| "Swap failed".to_string())
        );
    }

    for symbol in [sell, buy] {
        println!(
            "  {} balance: {}",
            symbol.ticker(),
            amount::format_amount(&ledger.get_balance(symbol))
        );
    }
    Ok(())
}

/// Overwrites one balance, given in major units.
pub async fn set_balance(ledger: &Ledger, symbol: TokenSymbol, major: &str) -> Result<()> {
    let decimals = ledger
        .balance(symbol)
        .map(|b| b.decimals)
        .with_context(|| format!("Token does not exist: {symbol}"))?;
    let minor = amount::to_minor_units(major, decimals)
        .with_context(|| format!("Invalid amount: '{major}'"))?;

    ledger.set_balance(symbol, &minor.to_string()).await?;
    println!(
        "{} balance set to {}",
        symbol.ticker(),
        amount::format_amount(&ledger.get_balance(symbol))
    );
    Ok(())
}
