//! Terminal front end: tables, spinners and the command handlers.

pub mod balances;
pub mod prices;
pub mod setup;
pub mod swap;
pub mod ui;
