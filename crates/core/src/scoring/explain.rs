use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::financials::FinancialSnapshot;
use crate::domain::news::NewsItem;
use crate::scoring::config::{ScoringConfig, RECONCILIATION_TOLERANCE};
use crate::scoring::features::{decide_all, format_points, round_cents};
use crate::scoring::Feature;

/// Per-feature breakdown of a score.
///
/// `base_score + sum(feature_contributions)` equals the score it was built for, to within
/// [`RECONCILIATION_TOLERANCE`]. Whatever the features alone don't account for (rounding to an
/// integer, clamping to `[0, 100]`) is booked under [`Feature::OtherAdjustments`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub feature_contributions: BTreeMap<Feature, f64>,
    pub plain_summary: Vec<String>,
}

impl Explanation {
    pub fn total(&self) -> f64 {
        self.feature_contributions.values().sum()
    }

    pub fn reconciles(&self, base_score: f64, score: u8) -> bool {
        (base_score + self.total() - f64::from(score)).abs() < RECONCILIATION_TOLERANCE
    }

    /// Text form stored alongside each score in the history.
    pub fn render(&self, score: u8) -> String {
        format!(
            "Final Score: {score}\n\nBreakdown:\n{}",
            self.plain_summary.join("\n")
        )
    }
}

/// Justifies `score` feature by feature, using the same weights and news decay as the engine.
pub fn explain(
    cfg: &ScoringConfig,
    financials: &FinancialSnapshot,
    news: &[NewsItem],
    score: u8,
    now: DateTime<Utc>,
) -> Explanation {
    let decisions = decide_all(cfg, financials, news, now);

    let mut feature_contributions = BTreeMap::new();
    let mut plain_summary = Vec::with_capacity(decisions.len() + 1);
    for d in decisions {
        feature_contributions.insert(d.feature, d.contribution);
        plain_summary.push(d.rationale);
    }

    let total: f64 = feature_contributions.values().sum();
    let residual = f64::from(score) - (cfg.base_score + total);
    if residual.abs() >= RECONCILIATION_TOLERANCE {
        let residual = round_cents(residual);
        feature_contributions.insert(Feature::OtherAdjustments, residual);
        plain_summary.push(format!(
            "Other adjustments (rounding and 0-100 bounds) -> {}",
            format_points(residual)
        ));
    }

    Explanation {
        feature_contributions,
        plain_summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::news::Sentiment;
    use crate::scoring::config::NewsPolicy;
    use crate::scoring::engine;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()
    }

    fn item(sentiment: Sentiment, days_old: i64) -> NewsItem {
        NewsItem {
            title: "headline".to_string(),
            url: "https://example.com".to_string(),
            published_at: Some(now() - Duration::days(days_old)),
            sentiment,
        }
    }

    #[test]
    fn contributions_reconcile_with_engine_score() {
        let snapshots = [
            FinancialSnapshot::empty(),
            FinancialSnapshot::new(Some(2e9), Some(5e9), Some(0.2)),
            FinancialSnapshot::new(Some(-1e6), Some(5e7), Some(0.8)),
            FinancialSnapshot::new(Some(1.234e9), Some(1.5e8), None),
            FinancialSnapshot::new(Some(9e9), Some(9e10), Some(0.05)),
        ];
        let news_sets = [
            vec![],
            vec![item(Sentiment::Positive, 0), item(Sentiment::Positive, 3)],
            vec![
                item(Sentiment::Negative, 0),
                item(Sentiment::Negative, 0),
                item(Sentiment::Negative, 1),
            ],
            vec![item(Sentiment::Positive, 30), item(Sentiment::Negative, 9)],
        ];

        for policy in [NewsPolicy::default(), NewsPolicy::flat()] {
            let cfg = ScoringConfig::default().with_news_policy(policy);
            for f in &snapshots {
                for n in &news_sets {
                    let score = engine::score(&cfg, f, n, now());
                    let e = explain(&cfg, f, n, score, now());
                    assert!(
                        e.reconciles(cfg.base_score, score),
                        "{f:?} {n:?}: base + {} != {score}",
                        e.total()
                    );
                }
            }
        }
    }

    #[test]
    fn reconciles_even_with_an_arbitrary_score() {
        let cfg = ScoringConfig::default();
        let f = FinancialSnapshot::new(Some(2e9), Some(5e9), Some(0.2));
        for score in [0u8, 13, 50, 92, 100] {
            let e = explain(&cfg, &f, &[], score, now());
            assert!(e.reconciles(cfg.base_score, score));
        }
    }

    #[test]
    fn lines_follow_fixed_feature_order() {
        let cfg = ScoringConfig::default();
        let f = FinancialSnapshot::new(Some(-1e6), Some(5e7), Some(0.8));
        let n = vec![
            item(Sentiment::Negative, 0),
            item(Sentiment::Negative, 0),
            item(Sentiment::Negative, 0),
        ];
        let score = engine::score(&cfg, &f, &n, now());
        assert_eq!(score, 0);

        let e = explain(&cfg, &f, &n, score, now());
        assert_eq!(
            e.plain_summary,
            vec![
                "Net income is negative or zero (-1.00M) -> -15.00",
                "Debt ratio is very high (0.80 >= 0.80) -> -15.00",
                "Revenue is below threshold (50.00M <= 100.00M) -> +0",
                "No positive news articles -> +0",
                "3 negative news (time-decayed) -> -24.00",
                "Other adjustments (rounding and 0-100 bounds) -> +4.00",
            ]
        );
        assert_eq!(e.feature_contributions[&Feature::OtherAdjustments], 4.0);
        let keys: Vec<_> = e.feature_contributions.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                Feature::NetIncome,
                Feature::DebtRatio,
                Feature::Revenue,
                Feature::PositiveNews,
                Feature::NegativeNews,
                Feature::OtherAdjustments,
            ]
        );
    }

    #[test]
    fn no_residual_when_features_explain_everything() {
        let cfg = ScoringConfig::default();
        let f = FinancialSnapshot::new(Some(2e9), Some(5e9), Some(0.2));
        let e = explain(&cfg, &f, &[], 92, now());
        assert!(!e.feature_contributions.contains_key(&Feature::OtherAdjustments));
        assert_eq!(e.plain_summary.len(), 5);
        assert_eq!(e.feature_contributions[&Feature::NetIncome], 20.0);
        assert_eq!(e.feature_contributions[&Feature::Revenue], 7.0);
        assert_eq!(e.feature_contributions[&Feature::DebtRatio], 15.0);
    }

    #[test]
    fn rounding_residual_is_reported() {
        let cfg = ScoringConfig::default();
        // 50 + 12.35 -> 62
        let f = FinancialSnapshot::new(Some(1.2346e9), None, None);
        let score = engine::score(&cfg, &f, &[], now());
        assert_eq!(score, 62);
        let e = explain(&cfg, &f, &[], score, now());
        assert_eq!(e.feature_contributions[&Feature::OtherAdjustments], -0.35);
    }

    #[test]
    fn render_includes_score_and_lines() {
        let cfg = ScoringConfig::default();
        let e = explain(&cfg, &FinancialSnapshot::empty(), &[], 50, now());
        let text = e.render(50);
        assert!(text.starts_with("Final Score: 50\n\nBreakdown:\n"));
        assert!(text.contains("Revenue data not available -> +0"));
        assert_eq!(text.lines().count(), 3 + 5);
    }
}
