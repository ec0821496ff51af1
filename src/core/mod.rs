//! Core business logic abstractions

pub mod amount;
pub mod cache;
pub mod config;
pub mod ledger;
pub mod log;
pub mod price;
pub mod swap;
pub mod token;

// Re-export main types for cleaner imports
pub use cache::{PriceCache, RefreshHandle};
pub use ledger::{Balance, Ledger};
pub use price::{PriceProvider, PriceSnapshot, TokenPrice};
pub use swap::{SwapError, SwapResult};
pub use token::{TokenInfo, TokenSymbol, TokenUniverse};
