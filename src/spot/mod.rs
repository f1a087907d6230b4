pub mod cache;
pub mod feed;
pub mod provider;

pub use provider::{SpotPriceProvider, SpotQuote};
