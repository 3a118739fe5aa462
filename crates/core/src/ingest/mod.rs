pub mod financials;
pub mod news;
pub mod types;

pub use financials::{FinancialDataProvider, HttpJsonFinancialProvider};
pub use news::{NewsApiClient, NewsProvider};
