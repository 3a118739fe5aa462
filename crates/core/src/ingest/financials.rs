use crate::config::Settings;
use crate::ingest::types::{CompanyFundamentals, FundamentalsResponse};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/fundamentals";
const DEFAULT_RETRIES: u32 = 3;

#[async_trait::async_trait]
pub trait FinancialDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Company profile plus the most recent reporting period's figures.
    async fn fetch_fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonFinancialProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonFinancialProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_financials_base_url()?.to_string();
        let api_key = settings.financials_api_key.clone();

        let timeout_secs = std::env::var("FINANCIALS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("FINANCIALS_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let path = std::env::var("FINANCIALS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build financial data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self, ticker: &str) -> String {
        let path = self.path.trim_matches('/');
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), path, ticker)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, ticker: &str) -> Result<FundamentalsResponse> {
        let res = self
            .http
            .get(self.url(ticker))
            .headers(self.headers()?)
            .send()
            .await
            .context("financial data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read financial data response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("financial data response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("financial data HTTP {status}: {raw_json}");
        }

        serde_json::from_value::<FundamentalsResponse>(raw_json)
            .context("failed to parse financial data response into FundamentalsResponse")
    }
}

#[async_trait::async_trait]
impl FinancialDataProvider for HttpJsonFinancialProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(ticker).await {
                Ok(resp) => {
                    let fundamentals = resp.into_fundamentals();
                    anyhow::ensure!(
                        fundamentals.ticker == ticker,
                        "provider ticker mismatch: expected {ticker}, got {}",
                        fundamentals.ticker
                    );
                    tracing::info!(
                        ticker,
                        net_income = ?fundamentals.snapshot.net_income,
                        revenue = ?fundamentals.snapshot.revenue,
                        debt_ratio = ?fundamentals.snapshot.debt_ratio,
                        "fetched fundamentals"
                    );
                    return Ok(fundamentals);
                }
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(
                        ticker,
                        attempt,
                        ?backoff,
                        error = %err,
                        "financial data fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base_url: &str, path: &str) -> HttpJsonFinancialProvider {
        HttpJsonFinancialProvider {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            api_key: Some("secret".to_string()),
            path: path.to_string(),
            retries: 1,
        }
    }

    #[test]
    fn url_joins_without_double_slashes() {
        assert_eq!(
            provider("https://data.example.com/", "/v1/fundamentals/").url("MSFT"),
            "https://data.example.com/v1/fundamentals/MSFT"
        );
        assert_eq!(
            provider("https://data.example.com", "v2/fin").url("AAPL"),
            "https://data.example.com/v2/fin/AAPL"
        );
    }

    #[test]
    fn api_key_goes_in_header() {
        let headers = provider("https://x", DEFAULT_PATH).headers().unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
    }
}
