pub mod domain;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod retry;
pub mod scoring;
pub mod sentiment;
pub mod storage;
pub mod time;

pub use error::CoreError;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:8081";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub financials_base_url: Option<String>,
        pub financials_api_key: Option<String>,
        pub news_api_key: Option<String>,
        pub news_api_base_url: Option<String>,
        pub sentiment_strategy: Option<String>,
        pub sentiment_model_path: Option<String>,
        pub cors_allowed_origin: String,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                financials_base_url: std::env::var("FINANCIALS_BASE_URL").ok(),
                financials_api_key: std::env::var("FINANCIALS_API_KEY").ok(),
                news_api_key: std::env::var("NEWS_API_KEY").ok(),
                news_api_base_url: std::env::var("NEWS_API_BASE_URL").ok(),
                sentiment_strategy: std::env::var("SENTIMENT_STRATEGY").ok(),
                sentiment_model_path: std::env::var("SENTIMENT_MODEL_PATH").ok(),
                cors_allowed_origin: std::env::var("CORS_ALLOWED_ORIGIN")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CORS_ALLOWED_ORIGIN.to_string()),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_financials_base_url(&self) -> anyhow::Result<&str> {
            self.financials_base_url
                .as_deref()
                .context("FINANCIALS_BASE_URL is required")
        }

        pub fn require_news_api_key(&self) -> anyhow::Result<&str> {
            self.news_api_key
                .as_deref()
                .context("NEWS_API_KEY is required")
        }
    }
}
