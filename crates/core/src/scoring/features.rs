use chrono::{DateTime, Utc};

use crate::domain::financials::FinancialSnapshot;
use crate::domain::news::{NewsItem, Sentiment};
use crate::scoring::config::{
    NewsPolicy, ScoringConfig, NET_INCOME_POINTS_PER_UNIT, NET_INCOME_UNIT,
};
use crate::scoring::Feature;
use crate::time::published::age_days;

/// One feature's effect on the score plus the sentence that justifies it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FeatureDecision {
    pub feature: Feature,
    pub contribution: f64,
    pub rationale: String,
}

/// Every feature decision, in explanation order.
pub(crate) fn decide_all(
    cfg: &ScoringConfig,
    financials: &FinancialSnapshot,
    news: &[NewsItem],
    now: DateTime<Utc>,
) -> Vec<FeatureDecision> {
    let (positive, negative) = news_sentiment(&cfg.news, news, now);
    vec![
        net_income(cfg, financials.net_income),
        debt_ratio(cfg, financials.debt_ratio),
        revenue(cfg, financials.revenue),
        positive,
        negative,
    ]
}

fn net_income(cfg: &ScoringConfig, value: Option<f64>) -> FeatureDecision {
    let feature = Feature::NetIncome;
    match value.filter(|v| v.is_finite()) {
        None => not_available(feature, "Net income"),
        Some(v) if v > 0.0 => {
            let points = round_cents(
                (v / NET_INCOME_UNIT * NET_INCOME_POINTS_PER_UNIT).min(cfg.net_income_max_bonus),
            );
            let capped = if points >= cfg.net_income_max_bonus {
                ", capped"
            } else {
                ""
            };
            FeatureDecision {
                feature,
                contribution: points,
                rationale: format!(
                    "Net income is positive ({}{capped}) -> {}",
                    format_amount(v),
                    format_points(points)
                ),
            }
        }
        Some(v) => FeatureDecision {
            feature,
            contribution: cfg.net_income_loss_penalty,
            rationale: format!(
                "Net income is negative or zero ({}) -> {}",
                format_amount(v),
                format_points(cfg.net_income_loss_penalty)
            ),
        },
    }
}

fn debt_ratio(cfg: &ScoringConfig, value: Option<f64>) -> FeatureDecision {
    let feature = Feature::DebtRatio;
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return not_available(feature, "Debt ratio");
    };

    match cfg.debt_ratio_tiers.iter().find(|t| v < t.bound) {
        Some(tier) => FeatureDecision {
            feature,
            contribution: tier.points,
            rationale: format!(
                "Debt ratio is {} ({v:.2} < {:.2}) -> {}",
                tier.label,
                tier.bound,
                format_points(tier.points)
            ),
        },
        None => {
            let highest = cfg
                .debt_ratio_tiers
                .last()
                .map(|t| t.bound)
                .unwrap_or_default();
            FeatureDecision {
                feature,
                contribution: cfg.debt_ratio_very_high_penalty,
                rationale: format!(
                    "Debt ratio is very high ({v:.2} >= {highest:.2}) -> {}",
                    format_points(cfg.debt_ratio_very_high_penalty)
                ),
            }
        }
    }
}

fn revenue(cfg: &ScoringConfig, value: Option<f64>) -> FeatureDecision {
    let feature = Feature::Revenue;
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return not_available(feature, "Revenue");
    };

    match cfg.revenue_tiers.iter().find(|t| v > t.bound) {
        Some(tier) => FeatureDecision {
            feature,
            contribution: tier.points,
            rationale: format!(
                "Revenue is {} ({} > {}) -> {}",
                tier.label,
                format_amount(v),
                format_amount(tier.bound),
                format_points(tier.points)
            ),
        },
        None => {
            let lowest = cfg
                .revenue_tiers
                .last()
                .map(|t| t.bound)
                .unwrap_or_default();
            FeatureDecision {
                feature,
                contribution: 0.0,
                rationale: format!(
                    "Revenue is below threshold ({} <= {}) -> +0",
                    format_amount(v),
                    format_amount(lowest)
                ),
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct SideImpact {
    count: usize,
    points: f64,
}

fn news_sentiment(
    policy: &NewsPolicy,
    news: &[NewsItem],
    now: DateTime<Utc>,
) -> (FeatureDecision, FeatureDecision) {
    let mut positive = SideImpact::default();
    let mut negative = SideImpact::default();

    let (mode, positive_unit, negative_unit) = match *policy {
        NewsPolicy::Flat {
            positive_unit,
            negative_unit,
            ..
        } => ("flat", positive_unit, negative_unit),
        NewsPolicy::HalfLife {
            positive_unit,
            negative_unit,
            ..
        } => ("time-decayed", positive_unit, negative_unit),
    };

    for item in news {
        let (side, unit) = match item.sentiment {
            Sentiment::Positive => (&mut positive, positive_unit),
            Sentiment::Negative => (&mut negative, negative_unit),
            Sentiment::Neutral => continue,
        };
        side.count += 1;
        side.points += unit * item_weight(policy, item.published_at, now);
    }

    if let NewsPolicy::Flat {
        positive_cap,
        negative_cap,
        ..
    } = *policy
    {
        positive.points = positive.points.min(positive_cap);
        negative.points = negative.points.max(negative_cap);
    }

    positive.points = round_cents(positive.points);
    negative.points = round_cents(negative.points);

    let positive_decision = FeatureDecision {
        feature: Feature::PositiveNews,
        contribution: positive.points,
        rationale: if positive.count > 0 {
            format!(
                "{} positive news ({mode}) -> {}",
                positive.count,
                format_points(positive.points)
            )
        } else {
            "No positive news articles -> +0".to_string()
        },
    };
    let negative_decision = FeatureDecision {
        feature: Feature::NegativeNews,
        contribution: negative.points,
        rationale: if negative.count > 0 {
            format!(
                "{} negative news ({mode}) -> {}",
                negative.count,
                format_points(negative.points)
            )
        } else {
            "No negative news articles -> +0".to_string()
        },
    };

    (positive_decision, negative_decision)
}

/// Scoring weight of a single article under `policy`.
pub(crate) fn item_weight(
    policy: &NewsPolicy,
    published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    match *policy {
        NewsPolicy::Flat { .. } => 1.0,
        NewsPolicy::HalfLife { half_life_days, .. } => published_at
            .and_then(|p| age_days(p, now))
            .map(|days| 0.5_f64.powf(days / half_life_days))
            .unwrap_or(0.0),
    }
}

fn not_available(feature: Feature, what: &str) -> FeatureDecision {
    FeatureDecision {
        feature,
        contribution: 0.0,
        rationale: format!("{what} data not available -> +0"),
    }
}

pub(crate) fn round_cents(v: f64) -> f64 {
    let r = (v * 100.0).round() / 100.0;
    // Avoid "-0.00" in rationale lines.
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

pub(crate) fn format_points(points: f64) -> String {
    if points == 0.0 {
        "+0".to_string()
    } else {
        format!("{points:+.2}")
    }
}

fn format_amount(v: f64) -> String {
    let abs = v.abs();
    if abs >= 1e9 {
        format!("{:.2}B", v / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", v / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2}K", v / 1e3)
    } else {
        format!("{v:.2}")
    }
}
