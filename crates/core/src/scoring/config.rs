//! Weights and thresholds shared by the score and its explanation.
//!
//! Both sides read the same [`ScoringConfig`] value, so a contribution shown to the user is the
//! exact number that moved the score.

pub const BASE_SCORE: f64 = 50.0;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Explanations reconcile with their score to within this many points.
pub const RECONCILIATION_TOLERANCE: f64 = 0.01;

/// Net income is expressed in points per billion before capping.
pub const NET_INCOME_UNIT: f64 = 1e9;
pub const NET_INCOME_POINTS_PER_UNIT: f64 = 10.0;
pub const NET_INCOME_MAX_BONUS: f64 = 20.0;
pub const NET_INCOME_LOSS_PENALTY: f64 = -15.0;

pub const REVENUE_TIERS: [Tier; 3] = [
    Tier {
        bound: 10e9,
        points: 10.0,
        label: "very large",
    },
    Tier {
        bound: 1e9,
        points: 7.0,
        label: "large",
    },
    Tier {
        bound: 100e6,
        points: 4.0,
        label: "moderate",
    },
];

pub const DEBT_RATIO_TIERS: [Tier; 3] = [
    Tier {
        bound: 0.3,
        points: 15.0,
        label: "low",
    },
    Tier {
        bound: 0.5,
        points: 8.0,
        label: "moderate",
    },
    Tier {
        bound: 0.8,
        points: -5.0,
        label: "high",
    },
];
pub const DEBT_RATIO_VERY_HIGH_PENALTY: f64 = -15.0;

pub const DEFAULT_HALF_LIFE_DAYS: f64 = 7.0;
pub const DECAYED_POSITIVE_UNIT: f64 = 4.0;
pub const DECAYED_NEGATIVE_UNIT: f64 = -8.0;

pub const FLAT_POSITIVE_UNIT: f64 = 5.0;
pub const FLAT_NEGATIVE_UNIT: f64 = -10.0;
pub const FLAT_POSITIVE_CAP: f64 = 15.0;
pub const FLAT_NEGATIVE_CAP: f64 = -30.0;

// Keeps a zero or negative half-life from dividing by zero.
const MIN_HALF_LIFE_DAYS: f64 = 1e-6;

/// A threshold step. Revenue tiers apply when the value is strictly above `bound`; debt ratio
/// tiers apply when the value is strictly below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub bound: f64,
    pub points: f64,
    pub label: &'static str,
}

/// How news sentiment turns into points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NewsPolicy {
    /// Every article counts the same; each side's total is capped.
    Flat {
        positive_unit: f64,
        negative_unit: f64,
        positive_cap: f64,
        negative_cap: f64,
    },
    /// Each article is weighted by `0.5^(age_days / half_life_days)`.
    HalfLife {
        half_life_days: f64,
        positive_unit: f64,
        negative_unit: f64,
    },
}

impl NewsPolicy {
    pub fn flat() -> Self {
        NewsPolicy::Flat {
            positive_unit: FLAT_POSITIVE_UNIT,
            negative_unit: FLAT_NEGATIVE_UNIT,
            positive_cap: FLAT_POSITIVE_CAP,
            negative_cap: FLAT_NEGATIVE_CAP,
        }
    }

    pub fn half_life(half_life_days: f64) -> Self {
        NewsPolicy::HalfLife {
            half_life_days: half_life_days.max(MIN_HALF_LIFE_DAYS),
            positive_unit: DECAYED_POSITIVE_UNIT,
            negative_unit: DECAYED_NEGATIVE_UNIT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NewsPolicy::Flat { .. } => "flat",
            NewsPolicy::HalfLife { .. } => "half_life",
        }
    }
}

impl Default for NewsPolicy {
    fn default() -> Self {
        NewsPolicy::half_life(DEFAULT_HALF_LIFE_DAYS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub base_score: f64,
    pub net_income_max_bonus: f64,
    pub net_income_loss_penalty: f64,
    pub revenue_tiers: [Tier; 3],
    pub debt_ratio_tiers: [Tier; 3],
    pub debt_ratio_very_high_penalty: f64,
    pub news: NewsPolicy,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: BASE_SCORE,
            net_income_max_bonus: NET_INCOME_MAX_BONUS,
            net_income_loss_penalty: NET_INCOME_LOSS_PENALTY,
            revenue_tiers: REVENUE_TIERS,
            debt_ratio_tiers: DEBT_RATIO_TIERS,
            debt_ratio_very_high_penalty: DEBT_RATIO_VERY_HIGH_PENALTY,
            news: NewsPolicy::default(),
        }
    }
}

impl ScoringConfig {
    pub fn with_news_policy(mut self, news: NewsPolicy) -> Self {
        self.news = news;
        self
    }

    /// Reads the news policy from `SCORING_NEWS_POLICY` (`half_life` or `flat`) and
    /// `SCORING_NEWS_HALF_LIFE_DAYS`. Weights stay fixed.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_raw(
            std::env::var("SCORING_NEWS_POLICY").ok().as_deref(),
            std::env::var("SCORING_NEWS_HALF_LIFE_DAYS").ok().as_deref(),
        )
    }

    /// Builds the config from the raw setting values. An unparseable half-life falls back to
    /// the default; an unknown policy name is an error.
    pub fn from_raw(policy: Option<&str>, half_life_days: Option<&str>) -> anyhow::Result<Self> {
        let half_life_days = half_life_days
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(DEFAULT_HALF_LIFE_DAYS);

        let policy = match policy {
            Some(s) => parse_news_policy(s, half_life_days)?,
            None => NewsPolicy::half_life(half_life_days),
        };

        Ok(Self::default().with_news_policy(policy))
    }
}

fn parse_news_policy(raw: &str, half_life_days: f64) -> anyhow::Result<NewsPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "half_life" | "decay" => Ok(NewsPolicy::half_life(half_life_days)),
        "flat" => Ok(NewsPolicy::flat()),
        other => anyhow::bail!("unknown SCORING_NEWS_POLICY: {other}"),
    }
}
