use crate::config::Settings;
use crate::domain::news::RawArticle;
use crate::ingest::types::{NewsApiArticle, NewsApiResponse};
use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://newsapi.org";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_PAGE_SIZE: u32 = 5;

#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Latest headlines mentioning `query`, newest first.
    async fn fetch_headlines(&self, query: &str) -> Result<Vec<RawArticle>>;
}

#[derive(Debug, Clone)]
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: u32,
}

impl NewsApiClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_news_api_key()?.to_string();
        let base_url = settings
            .news_api_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("NEWS_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let page_size = std::env::var("NEWS_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| (1..=100).contains(n))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build news http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            page_size,
        })
    }

    fn url(&self) -> String {
        format!("{}/v2/everything", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl NewsProvider for NewsApiClient {
    fn provider_name(&self) -> &'static str {
        "newsapi"
    }

    async fn fetch_headlines(&self, query: &str) -> Result<Vec<RawArticle>> {
        let res = self
            .http
            .get(self.url())
            .query(&[
                ("q", query.to_string()),
                ("sortBy", "publishedAt".to_string()),
                ("pageSize", self.page_size.to_string()),
            ])
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .context("news request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read news response")?;
        if !status.is_success() {
            anyhow::bail!("news API HTTP {status}: {text}");
        }

        let parsed = serde_json::from_str::<NewsApiResponse>(&text)
            .context("failed to parse news API response")?;
        if let Some(s) = parsed.status.as_deref() {
            anyhow::ensure!(s == "ok", "news API status {s}: {text}");
        }

        let articles: Vec<RawArticle> = parsed
            .articles
            .into_iter()
            .filter_map(NewsApiArticle::into_raw)
            .take(self.page_size as usize)
            .collect();

        tracing::info!(query, count = articles.len(), "fetched headlines");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_everything_endpoint() {
        let client = NewsApiClient {
            http: reqwest::Client::new(),
            base_url: "https://newsapi.org/".to_string(),
            api_key: "k".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        };
        assert_eq!(client.url(), "https://newsapi.org/v2/everything");
    }
}
