use super::ui;
use crate::core::amount;
use crate::core::cache::PriceCache;
use crate::core::ledger::{Balance, Ledger};
use crate::core::price::PriceSnapshot;
use crate::core::token::TokenSymbol;
use anyhow::Result;
use comfy_table::Cell;
use rust_decimal::Decimal;

/// One line of the balances table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRow {
    pub symbol: TokenSymbol,
    pub balance: String,
    pub value_usd: Option<Decimal>,
}

pub fn balance_rows(balances: &[(TokenSymbol, Balance)], prices: &PriceSnapshot) -> Vec<BalanceRow> {
    balances
        .iter()
        .map(|(symbol, balance)| {
            let displayed = amount::format_balance(&balance.magnitude.to_string(), balance.decimals);
            let value_usd = prices
                .get(*symbol)
                .filter(|p| p.is_available())
                .and_then(|p| {
                    amount::parse_decimal(&balance.major())
                        .and_then(|units| units.checked_mul(p.price_usd))
                });
            BalanceRow {
                symbol: *symbol,
                balance: displayed,
                value_usd,
            }
        })
        .collect()
}

/// Sum of all row values, `None` if any token could not be priced.
pub fn total_value(rows: &[BalanceRow]) -> Option<Decimal> {
    rows.iter()
        .try_fold(Decimal::ZERO, |acc, row| acc.checked_add(row.value_usd?))
}

pub fn display_as_table(rows: &[BalanceRow]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Token"),
        ui::header_cell("Balance"),
        ui::header_cell("Value (USD)"),
    ]);

    for row in rows {
        let value = match row.value_usd {
            Some(v) => ui::amount_cell(&amount::format_amount(&v.to_string())),
            None => ui::na_cell(true),
        };
        table.add_row(vec![
            Cell::new(row.symbol.ticker()),
            ui::amount_cell(&row.balance),
            value,
        ]);
    }

    let (total, total_style) = match total_value(rows) {
        Some(total) => (
            amount::format_amount(&total.to_string()),
            ui::StyleType::TotalValue,
        ),
        None => ("N/A".to_string(), ui::StyleType::Error),
    };

    let mut output = table.to_string();
    output.push_str(&format!(
        "\n\nTotal Value ({}): {}",
        ui::style_text("USD", ui::StyleType::TotalLabel),
        ui::style_text(&total, total_style)
    ));
    output
}

pub async fn run(ledger: &Ledger, cache: &PriceCache) -> Result<()> {
    let pb = ui::new_spinner("Fetching prices...");
    cache.refresh_all().await;
    pb.finish_and_clear();

    let rows = balance_rows(&ledger.balances(), &cache.snapshot().await);
    println!("{}", display_as_table(&rows));
    Ok(())
}
