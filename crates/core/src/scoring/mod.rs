//! Credit scoring and its explanation.
//!
//! [`engine::score`] and [`explain::explain`] are pure: the same snapshot, news and `now` always
//! give the same answer. [`assess`] runs both so callers never hold a score without its
//! breakdown.

pub mod config;
pub mod engine;
pub mod explain;
mod features;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::financials::FinancialSnapshot;
use crate::domain::news::NewsItem;
use crate::error::CoreError;

pub use config::{NewsPolicy, ScoringConfig};
pub use explain::Explanation;

/// Named inputs to the score. Ordering matches the order rationale lines are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    NetIncome,
    DebtRatio,
    Revenue,
    PositiveNews,
    NegativeNews,
    OtherAdjustments,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::NetIncome => "net_income",
            Feature::DebtRatio => "debt_ratio",
            Feature::Revenue => "revenue",
            Feature::PositiveNews => "positive_news",
            Feature::NegativeNews => "negative_news",
            Feature::OtherAdjustments => "other_adjustments",
        }
    }
}

/// A score together with the explanation that reconciles to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub score: u8,
    pub explanation: Explanation,
}

/// Scores `company` and explains the result in one step.
///
/// Fails with [`CoreError::NotFound`] when there is no snapshot at all. A snapshot whose fields
/// are all unknown is still scored.
pub fn assess(
    cfg: &ScoringConfig,
    company: &str,
    financials: Option<&FinancialSnapshot>,
    news: &[NewsItem],
    now: DateTime<Utc>,
) -> Result<Assessment, CoreError> {
    let financials = financials.ok_or_else(|| CoreError::financials_not_found(company))?;
    let score = engine::score(cfg, financials, news, now);
    let explanation = explain::explain(cfg, financials, news, score, now);
    Ok(Assessment { score, explanation })
}
