use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::company::{Company, CompanyProfile};
use crate::domain::financials::{FinancialRecord, FinancialSnapshot};
use crate::domain::news::{NewsItem, Sentiment};
use crate::domain::score::{ScoreHistoryEntry, ScoreRecord};
use crate::storage::lock::{release_ticker_lock, try_acquire_ticker_lock};
use crate::storage::{CreditStore, UpsertOutcome};

type CompanyRow = (Uuid, String, Option<String>, Option<String>, DateTime<Utc>);

pub struct PgCreditStore {
    pool: PgPool,
    // Connections currently holding a ticker's advisory lock.
    held_locks: tokio::sync::Mutex<HashMap<String, PoolConnection<Postgres>>>,
}

impl PgCreditStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn company_from_row((id, ticker, name, sector, created_at): CompanyRow) -> Company {
    Company {
        id,
        ticker,
        name,
        sector,
        created_at,
    }
}

#[async_trait::async_trait]
impl CreditStore for PgCreditStore {
    async fn list_companies(&self) -> anyhow::Result<Vec<Company>> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, ticker, name, sector, created_at FROM companies ORDER BY ticker ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("select companies failed")?;
        Ok(rows.into_iter().map(company_from_row).collect())
    }

    async fn find_company(&self, ticker: &str) -> anyhow::Result<Option<Company>> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, ticker, name, sector, created_at FROM companies WHERE ticker = $1",
        )
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select company {ticker} failed"))?;
        Ok(row.map(company_from_row))
    }

    async fn upsert_company(
        &self,
        profile: &CompanyProfile,
    ) -> anyhow::Result<(Company, UpsertOutcome)> {
        // xmax = 0 only for freshly inserted tuples.
        let (id, ticker, name, sector, created_at, inserted) = sqlx::query_as::<
            _,
            (Uuid, String, Option<String>, Option<String>, DateTime<Utc>, bool),
        >(
            "INSERT INTO companies (id, ticker, name, sector) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (ticker) DO UPDATE \
               SET name = COALESCE(EXCLUDED.name, companies.name), \
                   sector = COALESCE(EXCLUDED.sector, companies.sector) \
             RETURNING id, ticker, name, sector, created_at, (xmax = 0) AS inserted",
        )
        .bind(Uuid::new_v4())
        .bind(&profile.ticker)
        .bind(&profile.name)
        .bind(&profile.sector)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("upsert company {} failed", profile.ticker))?;

        let outcome = if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        };
        Ok((
            company_from_row((id, ticker, name, sector, created_at)),
            outcome,
        ))
    }

    async fn insert_financials(
        &self,
        company_id: Uuid,
        period: Option<NaiveDate>,
        snapshot: &FinancialSnapshot,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO financials (id, company_id, period, net_income, revenue, debt_ratio) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(period)
        .bind(snapshot.net_income)
        .bind(snapshot.revenue)
        .bind(snapshot.debt_ratio)
        .execute(&self.pool)
        .await
        .context("insert financials failed")?;
        Ok(())
    }

    async fn latest_financials(&self, company_id: Uuid) -> anyhow::Result<Option<FinancialRecord>> {
        let row = sqlx::query_as::<_, (Option<NaiveDate>, Option<f64>, Option<f64>, Option<f64>)>(
            "SELECT period, net_income, revenue, debt_ratio \
             FROM financials \
             WHERE company_id = $1 \
             ORDER BY period DESC NULLS LAST, created_at DESC \
             LIMIT 1",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .context("select latest financials failed")?;

        Ok(row.map(|(period, net_income, revenue, debt_ratio)| FinancialRecord {
            company_id,
            period,
            snapshot: FinancialSnapshot::new(net_income, revenue, debt_ratio),
        }))
    }

    async fn insert_news(&self, company_id: Uuid, items: &[NewsItem]) -> anyhow::Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.context("begin transaction failed")?;
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO news (id, company_id, title, url, published_at, sentiment) ",
        );
        qb.push_values(items, |mut b, item| {
            b.push_bind(Uuid::new_v4())
                .push_bind(company_id)
                .push_bind(item.title.trim())
                .push_bind(item.url.trim())
                .push_bind(item.published_at)
                .push_bind(item.sentiment.as_str());
        });
        qb.push(" ON CONFLICT (company_id, url) DO NOTHING");

        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch insert news failed")?;

        tx.commit().await.context("commit transaction failed")?;
        Ok(res.rows_affected())
    }

    async fn recent_news(&self, company_id: Uuid, limit: i64) -> anyhow::Result<Vec<NewsItem>> {
        let rows = sqlx::query_as::<_, (String, String, Option<DateTime<Utc>>, String)>(
            "SELECT title, url, published_at, sentiment \
             FROM news \
             WHERE company_id = $1 \
             ORDER BY published_at DESC NULLS LAST, created_at DESC \
             LIMIT $2",
        )
        .bind(company_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("select recent news failed")?;

        Ok(rows
            .into_iter()
            .map(|(title, url, published_at, sentiment)| {
                let sentiment = Sentiment::from_str(&sentiment).unwrap_or_else(|e| {
                    tracing::warn!(
                        %company_id,
                        %url,
                        error = %e,
                        "stored sentiment unreadable; treating as neutral"
                    );
                    Sentiment::Neutral
                });
                NewsItem {
                    title,
                    url,
                    published_at,
                    sentiment,
                }
            })
            .collect())
    }

    async fn log_score(&self, record: &ScoreRecord) -> anyhow::Result<Uuid> {
        let contributions = serde_json::to_value(&record.feature_contributions)
            .context("serialize feature contributions failed")?;

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO scores \
               (id, company_id, scored_at, score, explanation, feature_contributions) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(record.company_id)
        .bind(record.scored_at)
        .bind(i32::from(record.score))
        .bind(&record.explanation)
        .bind(contributions)
        .fetch_one(&self.pool)
        .await
        .context("insert scores failed")?;
        Ok(id)
    }

    async fn score_history(&self, company_id: Uuid) -> anyhow::Result<Vec<ScoreHistoryEntry>> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>, i32, String)>(
            "SELECT scored_at, score, explanation \
             FROM scores \
             WHERE company_id = $1 \
             ORDER BY scored_at ASC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .context("select score history failed")?;

        Ok(rows
            .into_iter()
            .map(|(date, score, explanation)| ScoreHistoryEntry {
                date,
                score,
                explanation,
            })
            .collect())
    }

    async fn try_lock_company(&self, ticker: &str) -> anyhow::Result<bool> {
        let mut held = self.held_locks.lock().await;
        if held.contains_key(ticker) {
            return Ok(false);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .context("acquire lock connection failed")?;
        let acquired = try_acquire_ticker_lock(&mut conn, ticker).await?;
        if acquired {
            held.insert(ticker.to_string(), conn);
        }
        Ok(acquired)
    }

    async fn unlock_company(&self, ticker: &str) -> anyhow::Result<()> {
        let conn = self.held_locks.lock().await.remove(ticker);
        let Some(mut conn) = conn else {
            return Ok(());
        };

        if let Err(err) = release_ticker_lock(&mut conn, ticker).await {
            // The session still holds the lock; end it instead of handing it back to the pool.
            if let Err(close_err) = conn.detach().close().await {
                tracing::warn!(%ticker, error = %close_err, "closing lock connection failed");
            }
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // Runs only when DATABASE_URL points at a disposable Postgres.
    async fn test_store() -> Option<PgCreditStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(3)
            .connect(&url)
            .await
            .ok()?;
        Some(PgCreditStore::new(pool))
    }

    async fn lock_is_free(pool: &PgPool, ticker: &str) -> bool {
        let mut conn = pool.acquire().await.unwrap();
        let acquired = try_acquire_ticker_lock(&mut conn, ticker).await.unwrap();
        if acquired {
            release_ticker_lock(&mut conn, ticker).await.unwrap();
        }
        acquired
    }

    #[tokio::test]
    async fn failed_release_does_not_leave_the_ticker_locked() {
        let Some(store) = test_store().await else {
            return;
        };
        let ticker = format!("LOCKTEST{}", Uuid::new_v4().simple());

        assert!(store.try_lock_company(&ticker).await.unwrap());
        assert!(!lock_is_free(store.pool(), &ticker).await);

        // An aborted transaction makes pg_advisory_unlock fail on the holding session.
        {
            let mut held = store.held_locks.lock().await;
            let conn = held.get_mut(&ticker).unwrap();
            sqlx::query("BEGIN").execute(&mut **conn).await.unwrap();
            assert!(sqlx::query("SELECT 1/0").execute(&mut **conn).await.is_err());
        }

        assert!(store.unlock_company(&ticker).await.is_err());
        assert!(store.held_locks.lock().await.is_empty());

        let mut freed = false;
        for _ in 0..20 {
            if lock_is_free(store.pool(), &ticker).await {
                freed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(freed, "advisory lock outlived its failed release");
    }

    #[tokio::test]
    async fn released_lock_can_be_taken_again() {
        let Some(store) = test_store().await else {
            return;
        };
        let ticker = format!("LOCKTEST{}", Uuid::new_v4().simple());

        assert!(store.try_lock_company(&ticker).await.unwrap());
        assert!(!store.try_lock_company(&ticker).await.unwrap());
        store.unlock_company(&ticker).await.unwrap();
        assert!(lock_is_free(store.pool(), &ticker).await);
    }
}
