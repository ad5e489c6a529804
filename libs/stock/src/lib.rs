mod price_cache;
mod price_client;
mod symbol_resolver;

pub mod indicators;
pub mod summary;

pub use price_cache::{DEFAULT_TTL, PriceCache};
pub use price_client::{
    Bar, DEFAULT_BASE_API, IssuerInfo, MarketData, Period, PriceClient, PriceHistory,
};
pub use symbol_resolver::{KOREAN_STOCKS, SymbolResolver};
