pub mod browser;
pub mod dom;
pub mod fetch;
pub mod geocoding;
pub mod housing;
pub mod nobroker;
pub mod pagination;
pub mod runner;
pub mod squareyards;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use browser::ChromeProvider;
pub use runner::scrapers;
pub use traits::ScraperTrait;
pub use types::SearchQuery;
