pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::cache::PriceCache;
use crate::core::config::AppConfig;
use crate::core::ledger::Ledger;
use crate::core::token::{TokenSymbol, TokenUniverse};
use crate::providers::FunkitPriceProvider;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Commands that need a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Balances,
    Prices,
    Quote {
        sell: TokenSymbol,
        buy: TokenSymbol,
        amount: String,
        watch: bool,
    },
    Swap {
        sell: TokenSymbol,
        buy: TokenSymbol,
        amount: String,
    },
    SetBalance {
        token: TokenSymbol,
        amount: String,
    },
}

async fn open_ledger(config: &AppConfig, universe: Arc<TokenUniverse>) -> Result<Ledger> {
    let store = store::open_store(config)?;
    let ledger = Ledger::new(universe, store).with_settlement_delay(config.settlement_delay());
    ledger.hydrate().await?;
    Ok(ledger)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("mockswap starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let universe = Arc::new(config.universe()?);
    let provider = Arc::new(FunkitPriceProvider::new(&config.providers.price)?);
    let cache = PriceCache::new(provider, Arc::clone(&universe));

    match command {
        AppCommand::Balances => {
            let ledger = open_ledger(&config, universe).await?;
            cli::balances::run(&ledger, &cache).await
        }
        AppCommand::Prices => cli::prices::run(&universe, &cache).await,
        AppCommand::Quote {
            sell,
            buy,
            amount,
            watch: false,
        } => cli::swap::quote(&cache, sell, buy, &amount).await,
        AppCommand::Quote {
            sell,
            buy,
            amount,
            watch: true,
        } => {
            cli::swap::watch_quote(
                &cache,
                sell,
                buy,
                &amount,
                config.refresh_interval(),
                config.debounce(),
            )
            .await
        }
        AppCommand::Swap { sell, buy, amount } => {
            let ledger = open_ledger(&config, universe).await?;
            cli::swap::swap(&ledger, &cache, sell, buy, &amount).await
        }
        AppCommand::SetBalance { token, amount } => {
            let ledger = open_ledger(&config, universe).await?;
            cli::swap::set_balance(&ledger, token, &amount).await
        }
    }
}
