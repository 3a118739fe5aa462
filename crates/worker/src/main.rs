use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use creditpulse_core::config::Settings;
use creditpulse_core::ingest::{HttpJsonFinancialProvider, NewsApiClient};
use creditpulse_core::pipeline::Sources;
use creditpulse_core::scoring::ScoringConfig;
use creditpulse_core::storage::{CreditStore, MemoryStore, PgCreditStore};

mod refresh;

#[derive(Debug, Parser)]
#[command(name = "creditpulse_worker")]
struct Args {
    /// Ticker to refresh. Repeatable; defaults to every stored company.
    #[arg(long = "ticker")]
    tickers: Vec<String>,

    /// Fetch and score into an in-memory store; nothing is written to the database.
    #[arg(long)]
    dry_run: bool,
}

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

    let args = Args::parse();

    let store: Arc<dyn CreditStore> = if args.dry_run {
        anyhow::ensure!(
            !args.tickers.is_empty(),
            "--dry-run starts from an empty store; pass at least one --ticker"
        );
        Arc::new(MemoryStore::new())
    } else {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        creditpulse_core::storage::migrate(&pool).await?;
        Arc::new(PgCreditStore::new(pool))
    };

    let financials = HttpJsonFinancialProvider::from_settings(&settings)?;
    let news = NewsApiClient::from_settings(&settings)?;
    let labeler = creditpulse_core::sentiment::from_settings(&settings)?;
    let sources = Sources {
        financials: &financials,
        news: &news,
        labeler: labeler.as_ref(),
    };
    let cfg = ScoringConfig::from_env()?;

    let tickers = refresh::resolve_tickers(store.as_ref(), &args.tickers).await?;
    if tickers.is_empty() {
        tracing::warn!("no companies to refresh");
        return Ok(());
    }

    let now = chrono::Utc::now();
    tracing::info!(
        tickers_len = tickers.len(),
        dry_run = args.dry_run,
        news_policy = cfg.news.name(),
        sentiment = labeler.name(),
        "refresh run starting"
    );

    let summary = refresh::refresh_all(store.as_ref(), sources, &cfg, &tickers, now).await;

    if args.dry_run {
        for report in &summary.reports {
            let rendered = serde_json::to_string_pretty(report).context("serialize report failed")?;
            tracing::info!(ticker = %report.ticker, report = %rendered, "dry-run score");
        }
    }

    tracing::info!(
        scored = summary.reports.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "refresh run finished"
    );

    anyhow::ensure!(
        summary.failed.is_empty(),
        "refresh failed for: {}",
        summary.failed.join(", ")
    );
    Ok(())
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
