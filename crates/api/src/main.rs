use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use creditpulse_core::config::Settings;
use creditpulse_core::ingest::{HttpJsonFinancialProvider, NewsApiClient};
use creditpulse_core::retry::RetryPolicy;
use creditpulse_core::scoring::ScoringConfig;
use creditpulse_core::storage::{CreditStore, PgCreditStore};

mod error;
mod routes;

use routes::{AppState, Ingestion};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let store: Option<Arc<dyn CreditStore>> = match connect_store(&settings).await {
        Ok(pool) => Some(Arc::new(PgCreditStore::new(pool))),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(
                error = %format!("{e:#}"),
                "database unavailable; starting API in degraded mode"
            );
            None
        }
    };

    let ingestion = match build_ingestion(&settings) {
        Ok(ingestion) => Some(ingestion),
        Err(e) => {
            tracing::warn!(
                error = %format!("{e:#}"),
                "data providers not configured; /add_company disabled"
            );
            None
        }
    };

    let scoring = ScoringConfig::from_env()?;
    tracing::info!(news_policy = scoring.news.name(), "scoring configured");

    let state = AppState {
        store,
        ingestion,
        scoring: Arc::new(scoring),
        retry: RetryPolicy::from_env(),
    };
    let app = routes::router(state, &settings.cors_allowed_origin)?;

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, cors_allowed_origin = %settings.cors_allowed_origin, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn connect_store(settings: &Settings) -> anyhow::Result<PgPool> {
    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    creditpulse_core::storage::migrate(&pool).await?;
    Ok(pool)
}

fn build_ingestion(settings: &Settings) -> anyhow::Result<Ingestion> {
    let financials = HttpJsonFinancialProvider::from_settings(settings)?;
    let news = NewsApiClient::from_settings(settings)?;
    let labeler = creditpulse_core::sentiment::from_settings(settings)?;
    tracing::info!(
        sentiment = labeler.name(),
        emits_neutral = labeler.emits_neutral(),
        "sentiment labeler ready"
    );

    Ok(Ingestion {
        financials: Arc::new(financials),
        news: Arc::new(news),
        labeler: Arc::from(labeler),
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
