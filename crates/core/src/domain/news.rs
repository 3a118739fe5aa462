use crate::error::CoreError;
use crate::time::published::parse_published_at;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(CoreError::InvalidInput(format!(
                "unknown sentiment label: {other:?}"
            ))),
        }
    }
}

/// A headline as delivered by the news provider, before labelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: String,
    pub url: String,
    pub published_at: Option<String>,
}

/// A labelled headline. `published_at` is `None` when the provider's timestamp was missing
/// or unparseable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub sentiment: Sentiment,
}

impl NewsItem {
    pub fn from_raw(raw: RawArticle, sentiment: Sentiment) -> Self {
        let published_at = raw.published_at.as_deref().and_then(parse_published_at);
        Self {
            title: raw.title,
            url: raw.url,
            published_at,
            sentiment,
        }
    }
}
