use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use mockswap::core::log::init_logging;
use mockswap::core::token::TokenSymbol;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for mockswap::AppCommand {
    fn from(cmd: Commands) -> mockswap::AppCommand {
        match cmd {
            Commands::Balances => mockswap::AppCommand::Balances,
            Commands::Prices => mockswap::AppCommand::Prices,
            Commands::Quote {
                sell,
                buy,
                amount,
                watch,
            } => mockswap::AppCommand::Quote {
                sell,
                buy,
                amount,
                watch,
            },
            Commands::Swap { sell, buy, amount } => {
                mockswap::AppCommand::Swap { sell, buy, amount }
            }
            Commands::SetBalance { token, amount } => {
                mockswap::AppCommand::SetBalance { token, amount }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show mock balances with their USD value
    Balances,
    /// Fetch and show current token prices
    Prices,
    /// Show how much BUY you would get for AMOUNT of SELL
    Quote {
        sell: TokenSymbol,
        buy: TokenSymbol,
        amount: String,
        /// Keep refreshing the quote until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Swap AMOUNT of SELL for BUY at current prices
    Swap {
        sell: TokenSymbol,
        buy: TokenSymbol,
        amount: String,
    },
    /// Overwrite a mock balance (in whole tokens)
    SetBalance { token: TokenSymbol, amount: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => mockswap::cli::setup::setup(),
        Some(cmd) => mockswap::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
