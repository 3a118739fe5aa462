use chrono::{DateTime, Utc};
use std::collections::HashSet;

use creditpulse_core::domain::company::normalize_ticker;
use creditpulse_core::pipeline::{self, RefreshOutcome, ScoreReport, Sources};
use creditpulse_core::scoring::ScoringConfig;
use creditpulse_core::storage::CreditStore;
use creditpulse_core::CoreError;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<ScoreReport>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Tickers given on the command line win; otherwise every stored company is refreshed.
pub async fn resolve_tickers(
    store: &dyn CreditStore,
    requested: &[String],
) -> anyhow::Result<Vec<String>> {
    let tickers: Vec<String> = if requested.is_empty() {
        store
            .list_companies()
            .await?
            .into_iter()
            .map(|c| c.ticker)
            .collect()
    } else {
        requested.iter().map(|t| normalize_ticker(t)).collect()
    };

    let mut seen = HashSet::new();
    Ok(tickers
        .into_iter()
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect())
}

/// Refreshes each ticker in turn. A failing ticker is recorded and the run moves on.
pub async fn refresh_all(
    store: &dyn CreditStore,
    sources: Sources<'_>,
    cfg: &ScoringConfig,
    tickers: &[String],
    now: DateTime<Utc>,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for ticker in tickers {
        match pipeline::refresh_company(store, sources, cfg, ticker, now).await {
            Ok(RefreshOutcome::Scored(report)) => {
                tracing::info!(%ticker, score = report.score, "refreshed");
                summary.reports.push(report);
            }
            Ok(RefreshOutcome::Skipped) => summary.skipped.push(ticker.clone()),
            Err(err) => {
                if let CoreError::Internal(e) = &err {
                    sentry_anyhow::capture_anyhow(e);
                }
                tracing::error!(%ticker, error = %err, "refresh failed");
                summary.failed.push(ticker.clone());
            }
        }
    }

    summary
}
