use super::ui;
use crate::core::amount;
use crate::core::cache::PriceCache;
use crate::core::price::PriceSnapshot;
use crate::core::token::TokenUniverse;
use anyhow::Result;
use comfy_table::Cell;

pub fn display_as_table(universe: &TokenUniverse, prices: &PriceSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Token"),
        ui::header_cell("Chain"),
        ui::header_cell("Price (USD)"),
        ui::header_cell("Updated"),
    ]);

    for token in universe.iter() {
        let (price, updated) = match prices.get(token.symbol) {
            Some(p) if p.is_available() => (
                ui::amount_cell(&amount::format_amount(&p.price_usd.to_string())),
                Cell::new(p.observed_at.format("%H:%M:%S").to_string()),
            ),
            Some(_) => (ui::na_cell(true), Cell::new("fetch failed")),
            None => (ui::na_cell(false), Cell::new("-")),
        };
        table.add_row(vec![
            Cell::new(token.symbol.ticker()),
            Cell::new(&token.chain_id),
            price,
            updated,
        ]);
    }

    table.to_string()
}

pub async fn run(universe: &TokenUniverse, cache: &PriceCache) -> Result<()> {
    let pb = ui::new_spinner("Fetching prices...");
    cache.refresh_all().await;
    pb.finish_and_clear();

    println!("{}", display_as_table(universe, &cache.snapshot().await));
    Ok(())
}
