use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::company::{Company, CompanyProfile};
use crate::domain::financials::{FinancialRecord, FinancialSnapshot};
use crate::domain::news::NewsItem;
use crate::domain::score::{ScoreHistoryEntry, ScoreRecord};
use crate::storage::{CreditStore, UpsertOutcome};

/// Process-local store for dry runs and tests. Mirrors the ordering rules of the Postgres
/// store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    companies: BTreeMap<String, Company>,
    // (insertion sequence, record)
    financials: Vec<(u64, FinancialRecord)>,
    news: Vec<(u64, Uuid, NewsItem)>,
    scores: Vec<ScoreRecord>,
    locks: HashSet<String>,
    seq: u64,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CreditStore for MemoryStore {
    async fn list_companies(&self) -> anyhow::Result<Vec<Company>> {
        Ok(self.inner.lock().await.companies.values().cloned().collect())
    }

    async fn find_company(&self, ticker: &str) -> anyhow::Result<Option<Company>> {
        Ok(self.inner.lock().await.companies.get(ticker).cloned())
    }

    async fn upsert_company(
        &self,
        profile: &CompanyProfile,
    ) -> anyhow::Result<(Company, UpsertOutcome)> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.companies.get_mut(&profile.ticker) {
            if profile.name.is_some() {
                existing.name = profile.name.clone();
            }
            if profile.sector.is_some() {
                existing.sector = profile.sector.clone();
            }
            return Ok((existing.clone(), UpsertOutcome::Updated));
        }

        let company = Company {
            id: Uuid::new_v4(),
            ticker: profile.ticker.clone(),
            name: profile.name.clone(),
            sector: profile.sector.clone(),
            created_at: Utc::now(),
        };
        inner
            .companies
            .insert(company.ticker.clone(), company.clone());
        Ok((company, UpsertOutcome::Created))
    }

    async fn insert_financials(
        &self,
        company_id: Uuid,
        period: Option<NaiveDate>,
        snapshot: &FinancialSnapshot,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq();
        inner.financials.push((
            seq,
            FinancialRecord {
                company_id,
                period,
                snapshot: *snapshot,
            },
        ));
        Ok(())
    }

    async fn latest_financials(&self, company_id: Uuid) -> anyhow::Result<Option<FinancialRecord>> {
        let inner = self.inner.lock().await;
        // Option<NaiveDate> orders None first, which puts undated rows last under max_by_key.
        Ok(inner
            .financials
            .iter()
            .filter(|(_, r)| r.company_id == company_id)
            .max_by_key(|(seq, r)| (r.period, *seq))
            .map(|(_, r)| r.clone()))
    }

    async fn insert_news(&self, company_id: Uuid, items: &[NewsItem]) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut inserted = 0;
        for item in items {
            let duplicate = inner
                .news
                .iter()
                .any(|(_, id, n)| *id == company_id && n.url.trim() == item.url.trim());
            if duplicate {
                continue;
            }
            let seq = inner.next_seq();
            inner.news.push((seq, company_id, item.clone()));
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn recent_news(&self, company_id: Uuid, limit: i64) -> anyhow::Result<Vec<NewsItem>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .news
            .iter()
            .filter(|(_, id, _)| *id == company_id)
            .collect();
        rows.sort_by(|(seq_a, _, a), (seq_b, _, b)| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| seq_b.cmp(seq_a))
        });
        Ok(rows
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(_, _, n)| n.clone())
            .collect())
    }

    async fn log_score(&self, record: &ScoreRecord) -> anyhow::Result<Uuid> {
        self.inner.lock().await.scores.push(record.clone());
        Ok(Uuid::new_v4())
    }

    async fn score_history(&self, company_id: Uuid) -> anyhow::Result<Vec<ScoreHistoryEntry>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .scores
            .iter()
            .filter(|s| s.company_id == company_id)
            .map(|s| ScoreHistoryEntry {
                date: s.scored_at,
                score: i32::from(s.score),
                explanation: s.explanation.clone(),
            })
            .collect();
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    async fn try_lock_company(&self, ticker: &str) -> anyhow::Result<bool> {
        Ok(self.inner.lock().await.locks.insert(ticker.to_string()))
    }

    async fn unlock_company(&self, ticker: &str) -> anyhow::Result<()> {
        self.inner.lock().await.locks.remove(ticker);
        Ok(())
    }
}
