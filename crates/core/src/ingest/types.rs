use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::financials::FinancialSnapshot;
use crate::domain::news::RawArticle;

/// What the financial data provider knows about a ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyFundamentals {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub period: Option<NaiveDate>,
    pub snapshot: FinancialSnapshot,
}

/// Wire shape of the fundamentals endpoint. `financials` is kept loose so that a malformed
/// figure only drops that figure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalsResponse {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub financials: Value,
}

impl FundamentalsResponse {
    pub fn into_fundamentals(self) -> CompanyFundamentals {
        CompanyFundamentals {
            ticker: self.ticker.trim().to_ascii_uppercase(),
            name: self.name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            sector: self.sector.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            period: self.period.as_deref().and_then(parse_period),
            snapshot: FinancialSnapshot::from_json(&self.financials),
        }
    }
}

/// Accepts `YYYY-MM-DD` or a bare fiscal year, which maps to January 1st.
pub fn parse_period(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    s.parse::<i32>()
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
}

/// NewsAPI `/v2/everything` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

impl NewsApiArticle {
    /// `None` for articles without a usable title or link.
    pub fn into_raw(self) -> Option<RawArticle> {
        let title = self.title?.trim().to_string();
        let url = self.url?.trim().to_string();
        if title.is_empty() || url.is_empty() {
            return None;
        }
        Some(RawArticle {
            title,
            url,
            published_at: self.published_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fundamentals_tolerate_malformed_figures() {
        let resp: FundamentalsResponse = serde_json::from_value(json!({
            "ticker": "aapl",
            "name": "Apple Inc.",
            "sector": "",
            "period": "2025",
            "financials": {"net_income": 9.3e10, "revenue": "3.9e11", "debt_ratio": "?"}
        }))
        .unwrap();

        let f = resp.into_fundamentals();
        assert_eq!(f.ticker, "AAPL");
        assert_eq!(f.sector, None);
        assert_eq!(f.period, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(f.snapshot.net_income, Some(9.3e10));
        assert_eq!(f.snapshot.revenue, Some(3.9e11));
        assert_eq!(f.snapshot.debt_ratio, None);
    }

    #[test]
    fn fundamentals_without_financials_are_empty() {
        let resp: FundamentalsResponse =
            serde_json::from_value(json!({"ticker": "NEW"})).unwrap();
        let f = resp.into_fundamentals();
        assert!(f.snapshot.is_empty());
        assert_eq!(f.period, None);
    }

    #[test]
    fn parse_period_formats() {
        assert_eq!(parse_period("2024-09-28"), NaiveDate::from_ymd_opt(2024, 9, 28));
        assert_eq!(parse_period(" 2023 "), NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(parse_period("Unknown"), None);
    }

    #[test]
    fn news_api_articles_need_title_and_url() {
        let resp: NewsApiResponse = serde_json::from_value(json!({
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {"title": "Acme raises guidance", "url": "https://e.com/1", "publishedAt": "2026-01-02T03:04:05Z"},
                {"title": null, "url": "https://e.com/2"},
                {"title": "No link"}
            ]
        }))
        .unwrap();

        let raws: Vec<_> = resp.articles.into_iter().filter_map(NewsApiArticle::into_raw).collect();
        assert_eq!(raws.len(), 1);
        assert_eq!(raws[0].published_at.as_deref(), Some("2026-01-02T03:04:05Z"));
    }
}
