pub mod funkit;
pub mod util;

pub use funkit::FunkitPriceProvider;
