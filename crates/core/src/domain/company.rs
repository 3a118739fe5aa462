use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Company {
    /// Name to search headlines for. Falls back to the ticker when the provider had no name.
    pub fn news_query(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.ticker)
    }
}

/// Insert-or-update payload for a company.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyUpsert {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

/// A validated [`CompanyUpsert`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyProfile {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
}

impl CompanyUpsert {
    pub fn validate(self) -> Result<CompanyProfile, CoreError> {
        let ticker = self
            .ticker
            .as_deref()
            .map(normalize_ticker)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::InvalidInput("ticker is required".to_string()))?;

        Ok(CompanyProfile {
            ticker,
            name: non_blank(self.name),
            sector: non_blank(self.sector),
        })
    }
}

pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
