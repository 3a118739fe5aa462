use chrono::{DateTime, Utc};

use crate::domain::financials::FinancialSnapshot;
use crate::domain::news::NewsItem;
use crate::scoring::config::{ScoringConfig, MAX_SCORE, MIN_SCORE};
use crate::scoring::features::decide_all;

/// Unclamped, unrounded total: base score plus every feature contribution.
pub fn raw_total(
    cfg: &ScoringConfig,
    financials: &FinancialSnapshot,
    news: &[NewsItem],
    now: DateTime<Utc>,
) -> f64 {
    cfg.base_score
        + decide_all(cfg, financials, news, now)
            .iter()
            .map(|d| d.contribution)
            .sum::<f64>()
}

/// Credit score in `[0, 100]`.
///
/// `now` is the instant article ages are measured against.
pub fn score(
    cfg: &ScoringConfig,
    financials: &FinancialSnapshot,
    news: &[NewsItem],
    now: DateTime<Utc>,
) -> u8 {
    clamp_score(raw_total(cfg, financials, news, now))
}

fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return MIN_SCORE as u8;
    }
    raw.round().clamp(MIN_SCORE, MAX_SCORE) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::news::Sentiment;
    use crate::scoring::config::{NewsPolicy, BASE_SCORE};
    use crate::scoring::features::item_weight;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 18, 0, 0).unwrap()
    }

    fn news(sentiment: Sentiment, published_at: Option<DateTime<Utc>>) -> NewsItem {
        NewsItem {
            title: format!("{sentiment} headline"),
            url: "https://example.com/n".to_string(),
            published_at,
            sentiment,
        }
    }

    fn sample_snapshots() -> Vec<FinancialSnapshot> {
        let incomes = [None, Some(-5e9), Some(0.0), Some(4e8), Some(8e9)];
        let revenues = [None, Some(0.0), Some(2e8), Some(3e9), Some(4e10)];
        let debts = [None, Some(0.0), Some(0.4), Some(0.7), Some(3.0)];
        let mut out = Vec::new();
        for ni in incomes {
            for rev in revenues {
                for dr in debts {
                    out.push(FinancialSnapshot::new(ni, rev, dr));
                }
            }
        }
        out
    }

    fn sample_news() -> Vec<Vec<NewsItem>> {
        let fresh = Some(now());
        let old = Some(now() - Duration::days(20));
        vec![
            vec![],
            (0..5).map(|_| news(Sentiment::Positive, fresh)).collect(),
            (0..5).map(|_| news(Sentiment::Negative, fresh)).collect(),
            vec![
                news(Sentiment::Positive, old),
                news(Sentiment::Negative, None),
                news(Sentiment::Neutral, fresh),
            ],
        ]
    }

    #[test]
    fn score_stays_in_bounds() {
        for policy in [NewsPolicy::default(), NewsPolicy::flat()] {
            let cfg = ScoringConfig::default().with_news_policy(policy);
            for f in sample_snapshots() {
                for n in sample_news() {
                    let s = score(&cfg, &f, &n, now());
                    assert!(s <= 100, "score {s} out of range for {f:?}");
                }
            }
        }
    }

    #[test]
    fn all_unknown_and_no_news_is_base_score() {
        let cfg = ScoringConfig::default();
        assert_eq!(
            score(&cfg, &FinancialSnapshot::empty(), &[], now()),
            BASE_SCORE as u8
        );
    }

    #[test]
    fn same_inputs_same_score() {
        let cfg = ScoringConfig::default();
        let f = FinancialSnapshot::new(Some(1.7e9), Some(2.5e9), Some(0.35));
        let n = sample_news().remove(3);
        assert_eq!(score(&cfg, &f, &n, now()), score(&cfg, &f, &n, now()));
    }

    #[test]
    fn turning_profitable_never_lowers_the_score() {
        let cfg = ScoringConfig::default();
        let incomes = [-2e9, -1.0, 0.0, 1.0, 5e7, 9e8, 3e9];
        for rev in [None, Some(5e8)] {
            for dr in [None, Some(0.9)] {
                let scores: Vec<u8> = incomes
                    .iter()
                    .map(|ni| {
                        let f = FinancialSnapshot::new(Some(*ni), rev, dr);
                        score(&cfg, &f, &[], now())
                    })
                    .collect();
                assert!(
                    scores.windows(2).all(|w| w[0] <= w[1]),
                    "not monotonic: {scores:?}"
                );
            }
        }
    }

    #[test]
    fn profitable_large_low_debt_company() {
        let cfg = ScoringConfig::default();
        let f = FinancialSnapshot::new(Some(2e9), Some(5e9), Some(0.2));
        // 50 + 20 (net income, at cap) + 7 (revenue > 1B) + 15 (low debt)
        assert_eq!(score(&cfg, &f, &[], now()), 92);
    }

    #[test]
    fn loss_making_indebted_company_with_bad_press_floors_at_zero() {
        let cfg = ScoringConfig::default();
        let f = FinancialSnapshot::new(Some(-1e6), Some(5e7), Some(0.8));
        let n: Vec<_> = (0..3)
            .map(|_| news(Sentiment::Negative, Some(now())))
            .collect();
        // 50 - 15 - 15 - 24 = -4
        assert_eq!(raw_total(&cfg, &f, &n, now()), -4.0);
        assert_eq!(score(&cfg, &f, &n, now()), 0);
    }

    #[test]
    fn month_old_positive_article_is_mostly_decayed() {
        let cfg = ScoringConfig::default().with_news_policy(NewsPolicy::half_life(7.0));
        let fresh_weight = item_weight(&cfg.news, Some(now()), now());
        let old_weight = item_weight(&cfg.news, Some(now() - Duration::days(30)), now());
        let expected = 0.5_f64.powf(30.0 / 7.0);
        assert!((old_weight - expected).abs() < 1e-12);
        assert!(old_weight / fresh_weight < 0.06);

        let f = FinancialSnapshot::empty();
        let n = vec![news(Sentiment::Positive, Some(now() - Duration::days(30)))];
        let contribution = raw_total(&cfg, &f, &n, now()) - cfg.base_score;
        assert!((contribution - 0.21).abs() < 1e-9, "got {contribution}");
        assert_eq!(score(&cfg, &f, &n, now()), 50);
    }

    #[test]
    fn malformed_timestamp_contributes_nothing() {
        let cfg = ScoringConfig::default();
        let item = NewsItem::from_raw(
            crate::domain::news::RawArticle {
                title: "Acme fraud probe".to_string(),
                url: "https://example.com/x".to_string(),
                published_at: Some("not-a-date".to_string()),
            },
            Sentiment::Negative,
        );
        let f = FinancialSnapshot::empty();
        assert_eq!(raw_total(&cfg, &f, &[item], now()), cfg.base_score);
    }

    #[test]
    fn clamp_rounds_to_nearest() {
        assert_eq!(clamp_score(49.5), 50);
        assert_eq!(clamp_score(49.49), 49);
        assert_eq!(clamp_score(-0.4), 0);
        assert_eq!(clamp_score(130.0), 100);
        assert_eq!(clamp_score(f64::NAN), 0);
    }
}
