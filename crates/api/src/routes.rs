use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use creditpulse_core::domain::company::{normalize_ticker, Company, CompanyUpsert};
use creditpulse_core::domain::news::NewsItem;
use creditpulse_core::domain::score::ScoreHistoryEntry;
use creditpulse_core::ingest::{FinancialDataProvider, NewsProvider};
use creditpulse_core::pipeline::{self, AddCompanyOutcome, Sources};
use creditpulse_core::retry::RetryPolicy;
use creditpulse_core::scoring::{Feature, ScoringConfig};
use creditpulse_core::sentiment::SentimentLabeler;
use creditpulse_core::storage::{CreditStore, UpsertOutcome, RECENT_NEWS_LIMIT};
use creditpulse_core::CoreError;

use crate::error::ApiError;

/// Providers needed to onboard a company. Absent when the API runs without upstream
/// credentials; read-only routes keep working.
#[derive(Clone)]
pub struct Ingestion {
    pub financials: Arc<dyn FinancialDataProvider>,
    pub news: Arc<dyn NewsProvider>,
    pub labeler: Arc<dyn SentimentLabeler>,
}

impl Ingestion {
    fn sources(&self) -> Sources<'_> {
        Sources {
            financials: self.financials.as_ref(),
            news: self.news.as_ref(),
            labeler: self.labeler.as_ref(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Option<Arc<dyn CreditStore>>,
    pub ingestion: Option<Ingestion>,
    pub scoring: Arc<ScoringConfig>,
    pub retry: RetryPolicy,
}

impl AppState {
    fn store(&self) -> Result<&dyn CreditStore, ApiError> {
        self.store
            .as_deref()
            .ok_or_else(ApiError::database_unavailable)
    }
}

pub fn router(state: AppState, cors_allowed_origin: &str) -> anyhow::Result<Router> {
    let origin = HeaderValue::from_str(cors_allowed_origin)
        .with_context(|| format!("invalid CORS_ALLOWED_ORIGIN: {cors_allowed_origin}"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/companies", get(list_companies))
        .route("/company", post(upsert_company))
        .route("/company/:ticker", get(get_company))
        .route("/add_company/:ticker", post(add_company))
        .route("/news/:ticker", get(get_news))
        .route("/score/:ticker", get(get_score))
        .route("/score_history/:ticker", get(get_score_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_companies(State(state): State<AppState>) -> Result<Json<Vec<Company>>, ApiError> {
    Ok(Json(state.store()?.list_companies().await?))
}

async fn find_company(store: &dyn CreditStore, ticker: &str) -> Result<Company, ApiError> {
    let ticker = normalize_ticker(ticker);
    store
        .find_company(&ticker)
        .await?
        .ok_or_else(|| CoreError::company_not_found(&ticker).into())
}

async fn get_company(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(find_company(state.store()?, &ticker).await?))
}

#[derive(Debug, Serialize)]
struct UpsertResponse {
    message: &'static str,
    id: Uuid,
}

async fn upsert_company(
    State(state): State<AppState>,
    Json(body): Json<CompanyUpsert>,
) -> Result<Json<UpsertResponse>, ApiError> {
    let store = state.store()?;
    let profile = body.validate()?;
    let (company, outcome) = store.upsert_company(&profile).await?;

    let message = match outcome {
        UpsertOutcome::Created => "Company created",
        UpsertOutcome::Updated => "Company updated",
    };
    tracing::info!(
        ticker = %company.ticker,
        company_id = %company.id,
        message,
        "upserted company"
    );
    Ok(Json(UpsertResponse {
        message,
        id: company.id,
    }))
}

#[derive(Debug, Serialize)]
struct AddCompanyResponse {
    message: &'static str,
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feature_contributions: Option<BTreeMap<Feature, f64>>,
}

async fn add_company(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<AddCompanyResponse>, ApiError> {
    let store = state.store()?;
    let ingestion = state
        .ingestion
        .as_ref()
        .ok_or_else(ApiError::ingestion_unavailable)?;

    let outcome = pipeline::add_company(
        store,
        ingestion.sources(),
        &state.scoring,
        state.retry,
        &ticker,
        Utc::now(),
    )
    .await?;

    let response = match outcome {
        AddCompanyOutcome::AlreadyExists { company_id } => AddCompanyResponse {
            message: "Company already exists",
            id: company_id,
            score: None,
            explanation: None,
            feature_contributions: None,
        },
        AddCompanyOutcome::Added(report) => AddCompanyResponse {
            message: "Company created and scored",
            id: report.company_id,
            score: Some(report.score),
            explanation: Some(report.explanation.plain_summary),
            feature_contributions: Some(report.explanation.feature_contributions),
        },
    };
    Ok(Json(response))
}

async fn get_news(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Vec<NewsItem>>, ApiError> {
    let store = state.store()?;
    let company = find_company(store, &ticker).await?;
    Ok(Json(store.recent_news(company.id, RECENT_NEWS_LIMIT).await?))
}

#[derive(Debug, Serialize)]
struct ScoreResponse {
    ticker: String,
    score: u8,
    scored_at: DateTime<Utc>,
    explanation: Vec<String>,
    feature_contributions: BTreeMap<Feature, f64>,
}

async fn get_score(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let report =
        pipeline::score_company(state.store()?, &state.scoring, &ticker, Utc::now()).await?;
    Ok(Json(ScoreResponse {
        ticker: report.ticker,
        score: report.score,
        scored_at: report.scored_at,
        explanation: report.explanation.plain_summary,
        feature_contributions: report.explanation.feature_contributions,
    }))
}

async fn get_score_history(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Vec<ScoreHistoryEntry>>, ApiError> {
    let store = state.store()?;
    let company = find_company(store, &ticker).await?;
    Ok(Json(store.score_history(company.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use creditpulse_core::domain::financials::FinancialSnapshot;
    use creditpulse_core::domain::news::RawArticle;
    use creditpulse_core::ingest::types::CompanyFundamentals;
    use creditpulse_core::sentiment::KeywordLabeler;
    use creditpulse_core::storage::MemoryStore;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    struct StubFinancials;

    #[async_trait::async_trait]
    impl FinancialDataProvider for StubFinancials {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn fetch_fundamentals(&self, ticker: &str) -> anyhow::Result<CompanyFundamentals> {
            Ok(CompanyFundamentals {
                ticker: ticker.to_string(),
                name: Some("Acme Corp".to_string()),
                sector: Some("Industrials".to_string()),
                period: NaiveDate::from_ymd_opt(2025, 12, 31),
                snapshot: FinancialSnapshot::new(Some(2e9), Some(5e9), Some(0.2)),
            })
        }
    }

    struct NoNews;

    #[async_trait::async_trait]
    impl NewsProvider for NoNews {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn fetch_headlines(&self, _query: &str) -> anyhow::Result<Vec<RawArticle>> {
            Ok(Vec::new())
        }
    }

    fn state(store: Option<Arc<dyn CreditStore>>) -> AppState {
        AppState {
            store,
            ingestion: Some(Ingestion {
                financials: Arc::new(StubFinancials),
                news: Arc::new(NoNews),
                labeler: Arc::new(KeywordLabeler::default()),
            }),
            scoring: Arc::new(ScoringConfig::default()),
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            },
        }
    }

    fn app(store: Option<Arc<dyn CreditStore>>) -> Router {
        router(state(store), "http://localhost:8081").unwrap()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn healthz_answers_without_a_database() {
        let app = app(None);
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn data_routes_are_unavailable_in_degraded_mode() {
        let app = app(None);
        let (status, body) = send(&app, "GET", "/companies", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["detail"].as_str().unwrap().contains("database"));
    }

    #[tokio::test]
    async fn add_company_then_read_it_back() {
        let app = app(Some(Arc::new(MemoryStore::new())));

        let (status, added) = send(&app, "POST", "/add_company/acme", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(added["message"], "Company created and scored");
        assert_eq!(added["score"], 92);
        assert_eq!(added["feature_contributions"]["net_income"], 20.0);
        assert_eq!(
            added["explanation"][0],
            "Net income is positive (2.00B, capped) -> +20.00"
        );

        let (status, again) = send(&app, "POST", "/add_company/ACME", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["message"], "Company already exists");
        assert_eq!(again["id"], added["id"]);
        assert!(again.get("score").is_none());

        let (status, company) = send(&app, "GET", "/company/ACME", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(company["name"], "Acme Corp");

        let (status, score) = send(&app, "GET", "/score/ACME", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(score["score"], 92);

        let (status, news) = send(&app, "GET", "/news/ACME", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(news, json!([]));

        let (status, history) = send(&app, "GET", "/score_history/ACME", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert!(history[0]["explanation"]
            .as_str()
            .unwrap()
            .starts_with("Final Score: 92"));
    }

    #[tokio::test]
    async fn upsert_requires_ticker_and_reports_created_then_updated() {
        let app = app(Some(Arc::new(MemoryStore::new())));

        let (status, _) = send(&app, "POST", "/company", Some(json!({"name": "Nameless"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, created) = send(
            &app,
            "POST",
            "/company",
            Some(json!({"ticker": "init", "name": "Initech"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["message"], "Company created");

        let (_, updated) = send(
            &app,
            "POST",
            "/company",
            Some(json!({"ticker": "INIT", "sector": "Software"})),
        )
        .await;
        assert_eq!(updated["message"], "Company updated");
        assert_eq!(updated["id"], created["id"]);

        let (_, companies) = send(&app, "GET", "/companies", None).await;
        assert_eq!(companies[0]["name"], "Initech");
        assert_eq!(companies[0]["sector"], "Software");
    }

    #[tokio::test]
    async fn score_is_404_for_unknown_company_or_missing_financials() {
        let app = app(Some(Arc::new(MemoryStore::new())));

        let (status, _) = send(&app, "GET", "/score/NOPE", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(&app, "POST", "/company", Some(json!({"ticker": "BARE"}))).await;
        let (status, body) = send(&app, "GET", "/score/BARE", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().starts_with("financials"));
    }
}
