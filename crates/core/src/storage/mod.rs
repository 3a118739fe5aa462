//! Persistence for companies, financials, news and score history.
//!
//! Callers receive a [`CreditStore`] explicitly; there is no process-wide client. The scoring
//! functions themselves never see a store.

pub mod lock;
pub mod memory;
pub mod postgres;

use anyhow::Context;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::company::{Company, CompanyProfile};
use crate::domain::financials::{FinancialRecord, FinancialSnapshot};
use crate::domain::news::NewsItem;
use crate::domain::score::{ScoreHistoryEntry, ScoreRecord};

pub use memory::MemoryStore;
pub use postgres::PgCreditStore;

/// How many headlines feed a score.
pub const RECENT_NEWS_LIMIT: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[async_trait::async_trait]
pub trait CreditStore: Send + Sync {
    async fn list_companies(&self) -> anyhow::Result<Vec<Company>>;

    async fn find_company(&self, ticker: &str) -> anyhow::Result<Option<Company>>;

    /// Inserts a company or updates the one with the same ticker. Absent fields keep their
    /// stored value on update.
    async fn upsert_company(
        &self,
        profile: &CompanyProfile,
    ) -> anyhow::Result<(Company, UpsertOutcome)>;

    async fn insert_financials(
        &self,
        company_id: Uuid,
        period: Option<NaiveDate>,
        snapshot: &FinancialSnapshot,
    ) -> anyhow::Result<()>;

    /// Most recent period first; rows without a period sort last.
    async fn latest_financials(&self, company_id: Uuid) -> anyhow::Result<Option<FinancialRecord>>;

    /// Stores labelled headlines, skipping URLs already stored for the company. Returns the
    /// number of new rows.
    async fn insert_news(&self, company_id: Uuid, items: &[NewsItem]) -> anyhow::Result<u64>;

    /// Newest first.
    async fn recent_news(&self, company_id: Uuid, limit: i64) -> anyhow::Result<Vec<NewsItem>>;

    async fn log_score(&self, record: &ScoreRecord) -> anyhow::Result<Uuid>;

    /// Oldest first.
    async fn score_history(&self, company_id: Uuid) -> anyhow::Result<Vec<ScoreHistoryEntry>>;

    /// Best-effort guard against two refreshes of the same ticker running at once.
    async fn try_lock_company(&self, ticker: &str) -> anyhow::Result<bool>;

    async fn unlock_company(&self, ticker: &str) -> anyhow::Result<()>;
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
