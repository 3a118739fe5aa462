//! Ingest, score and log flows shared by the API and the worker.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::company::{normalize_ticker, Company, CompanyProfile};
use crate::domain::financials::FinancialSnapshot;
use crate::domain::score::ScoreRecord;
use crate::error::{CoreError, CoreResult};
use crate::ingest::{FinancialDataProvider, NewsProvider};
use crate::retry::{poll_until_available, RetryPolicy};
use crate::scoring::{assess, Explanation, Feature, ScoringConfig};
use crate::sentiment::SentimentLabeler;
use crate::storage::{CreditStore, UpsertOutcome, RECENT_NEWS_LIMIT};

/// Upstream data sources for a single ingest.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub financials: &'a dyn FinancialDataProvider,
    pub news: &'a dyn NewsProvider,
    pub labeler: &'a dyn SentimentLabeler,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub company: Company,
    pub outcome: UpsertOutcome,
    pub news_inserted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub ticker: String,
    pub company_id: Uuid,
    pub scored_at: DateTime<Utc>,
    pub score: u8,
    pub explanation: Explanation,
}

impl ScoreReport {
    pub fn explanation_text(&self) -> String {
        self.explanation.render(self.score)
    }

    pub fn feature_contributions(&self) -> &BTreeMap<Feature, f64> {
        &self.explanation.feature_contributions
    }

    fn to_record(&self) -> ScoreRecord {
        ScoreRecord {
            company_id: self.company_id,
            scored_at: self.scored_at,
            score: self.score,
            explanation: self.explanation_text(),
            feature_contributions: self.explanation.feature_contributions.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AddCompanyOutcome {
    AlreadyExists { company_id: Uuid },
    Added(ScoreReport),
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Scored(ScoreReport),
    /// Another refresh holds the ticker's lock.
    Skipped,
}

/// Pulls fundamentals and headlines for `ticker` and stores them.
///
/// The financial provider is required; a failing news provider only costs the headlines.
pub async fn ingest_company(
    store: &dyn CreditStore,
    sources: Sources<'_>,
    ticker: &str,
) -> CoreResult<IngestSummary> {
    let ticker = normalize_ticker(ticker);
    if ticker.is_empty() {
        return Err(CoreError::InvalidInput("ticker is required".to_string()));
    }

    let fundamentals = sources
        .financials
        .fetch_fundamentals(&ticker)
        .await
        .map_err(|e| {
            CoreError::DependencyUnavailable(format!(
                "{} fundamentals for {ticker}: {e:#}",
                sources.financials.provider_name()
            ))
        })?;

    let (company, outcome) = store
        .upsert_company(&CompanyProfile {
            ticker: ticker.clone(),
            name: fundamentals.name.clone(),
            sector: fundamentals.sector.clone(),
        })
        .await?;

    store
        .insert_financials(company.id, fundamentals.period, &fundamentals.snapshot)
        .await?;

    let news_inserted = match sources.news.fetch_headlines(company.news_query()).await {
        Ok(raw) => {
            let items: Vec<_> = raw
                .into_iter()
                .map(|a| sources.labeler.label_article(a))
                .collect();
            store.insert_news(company.id, &items).await?
        }
        Err(err) => {
            tracing::warn!(
                %ticker,
                provider = sources.news.provider_name(),
                error = %format!("{err:#}"),
                "news fetch failed; continuing without headlines"
            );
            0
        }
    };

    tracing::info!(
        %ticker,
        company_id = %company.id,
        ?outcome,
        news_inserted,
        "ingested company"
    );

    Ok(IngestSummary {
        company,
        outcome,
        news_inserted,
    })
}

/// Scores a stored company from its latest financials and most recent headlines.
pub async fn score_company(
    store: &dyn CreditStore,
    cfg: &ScoringConfig,
    ticker: &str,
    now: DateTime<Utc>,
) -> CoreResult<ScoreReport> {
    let ticker = normalize_ticker(ticker);
    let company = store
        .find_company(&ticker)
        .await?
        .ok_or_else(|| CoreError::company_not_found(&ticker))?;

    let financials = store.latest_financials(company.id).await?;
    let news = store.recent_news(company.id, RECENT_NEWS_LIMIT).await?;

    let assessment = assess(
        cfg,
        &ticker,
        financials.as_ref().map(|r| &r.snapshot),
        &news,
        now,
    )?;

    Ok(ScoreReport {
        ticker,
        company_id: company.id,
        scored_at: now,
        score: assessment.score,
        explanation: assessment.explanation,
    })
}

/// Appends `report` to the company's score history.
pub async fn log_score(store: &dyn CreditStore, report: &ScoreReport) -> CoreResult<Uuid> {
    let id = store.log_score(&report.to_record()).await?;
    tracing::info!(
        ticker = %report.ticker,
        company_id = %report.company_id,
        score = report.score,
        "logged score"
    );
    Ok(id)
}

/// Onboards a new company: ingest, wait for the writes to become readable, score, log.
///
/// A ticker that is already stored is left untouched. The work runs under the ticker lock, so
/// concurrent calls for the same ticker onboard it once; the losers wait for the winner's
/// company row and report it as existing. When the financials never show up the company is
/// scored on an empty snapshot, which lands on the base score.
pub async fn add_company(
    store: &dyn CreditStore,
    sources: Sources<'_>,
    cfg: &ScoringConfig,
    retry: RetryPolicy,
    ticker: &str,
    now: DateTime<Utc>,
) -> CoreResult<AddCompanyOutcome> {
    let ticker = normalize_ticker(ticker);
    if let Some(existing) = store.find_company(&ticker).await? {
        return Ok(AddCompanyOutcome::AlreadyExists {
            company_id: existing.id,
        });
    }

    if !store.try_lock_company(&ticker).await? {
        tracing::info!(%ticker, "ticker lock held; waiting for the other onboarding");
        let ticker_ref = ticker.as_str();
        return match poll_until_available(retry, "company", || async move {
            store.find_company(ticker_ref).await
        })
        .await?
        .ready()
        {
            Some(company) => Ok(AddCompanyOutcome::AlreadyExists {
                company_id: company.id,
            }),
            None => Err(CoreError::DependencyUnavailable(format!(
                "company {ticker} is being added by another request"
            ))),
        };
    }

    // The previous lock holder may have finished between the lookup and the lock.
    let result = match store.find_company(&ticker).await {
        Ok(Some(existing)) => Ok(AddCompanyOutcome::AlreadyExists {
            company_id: existing.id,
        }),
        Ok(None) => onboard(store, sources, cfg, retry, &ticker, now)
            .await
            .map(AddCompanyOutcome::Added),
        Err(err) => Err(CoreError::from(err)),
    };

    if let Err(err) = store.unlock_company(&ticker).await {
        tracing::warn!(%ticker, error = %format!("{err:#}"), "failed to release ticker lock");
    }

    result
}

async fn onboard(
    store: &dyn CreditStore,
    sources: Sources<'_>,
    cfg: &ScoringConfig,
    retry: RetryPolicy,
    ticker: &str,
    now: DateTime<Utc>,
) -> CoreResult<ScoreReport> {
    let summary = ingest_company(store, sources, ticker).await?;
    let company_id = summary.company.id;

    let financials = poll_until_available(retry, "financials", || async move {
        store.latest_financials(company_id).await
    })
    .await?
    .ready()
    .map(|r| r.snapshot)
    .unwrap_or_else(|| {
        tracing::warn!(%ticker, "financials not readable yet; scoring on an empty snapshot");
        FinancialSnapshot::empty()
    });

    let news = if summary.news_inserted > 0 {
        poll_until_available(retry, "news", || async move {
            let items = store.recent_news(company_id, RECENT_NEWS_LIMIT).await?;
            anyhow::Ok((!items.is_empty()).then_some(items))
        })
        .await?
        .ready()
        .unwrap_or_default()
    } else {
        Vec::new()
    };

    let assessment = assess(cfg, ticker, Some(&financials), &news, now)?;
    let report = ScoreReport {
        ticker: ticker.to_string(),
        company_id,
        scored_at: now,
        score: assessment.score,
        explanation: assessment.explanation,
    };
    log_score(store, &report).await?;

    Ok(report)
}

/// Re-ingests and re-scores one company under its ticker lock.
pub async fn refresh_company(
    store: &dyn CreditStore,
    sources: Sources<'_>,
    cfg: &ScoringConfig,
    ticker: &str,
    now: DateTime<Utc>,
) -> CoreResult<RefreshOutcome> {
    let ticker = normalize_ticker(ticker);
    if !store.try_lock_company(&ticker).await? {
        tracing::warn!(%ticker, "ticker lock not acquired; another refresh in progress");
        return Ok(RefreshOutcome::Skipped);
    }

    let result = async {
        ingest_company(store, sources, &ticker).await?;
        let report = score_company(store, cfg, &ticker, now).await?;
        log_score(store, &report).await?;
        Ok::<_, CoreError>(report)
    }
    .await;

    if let Err(err) = store.unlock_company(&ticker).await {
        tracing::warn!(%ticker, error = %format!("{err:#}"), "failed to release ticker lock");
    }

    result.map(RefreshOutcome::Scored)
}
