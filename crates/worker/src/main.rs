use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod universe;

#[derive(Debug, Parser)]
#[command(name = "crush_worker")]
struct Args {
    /// Scan date (YYYY-MM-DD). Defaults to today's US-Eastern date.
    #[arg(long)]
    date: Option<String>,

    /// Earnings look-ahead window in days.
    #[arg(long)]
    days_ahead: Option<i64>,

    /// Run the full scan but write nothing.
    #[arg(long)]
    dry_run: bool,

    /// Where report JSON files land. Overrides REPORTS_DIR.
    #[arg(long)]
    reports_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = crush_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let scan_date =
        crush_core::time::us_market::resolve_scan_date(args.date.as_deref(), chrono::Utc::now())?;

    let mut cfg = crush_core::scan::config::ScanConfig::from_env();
    if let Some(days_ahead) = args.days_ahead {
        cfg.days_ahead = days_ahead;
    }

    let tickers = universe::scan_universe(universe::UniverseOptions::from_env())?;

    tracing::info!(
        %scan_date,
        days_ahead = cfg.days_ahead,
        universe_len = tickers.len(),
        dry_run = args.dry_run,
        "starting earnings crush scan"
    );

    let calendar = crush_core::providers::finnhub::FinnhubCalendar::from_settings(&settings)?;
    let market = crush_core::providers::market::HttpJsonMarketData::from_settings(&settings)?;

    let report =
        match crush_core::scan::aggregator::scan(&calendar, &market, &tickers, &cfg, scan_date)
            .await
        {
            Ok(report) => report,
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "scan run failed");
                return Err(err);
            }
        };

    tracing::info!(
        run_id = %report.run_id,
        earnings_found = report.earnings_found,
        opportunities = report.opportunities.len(),
        skipped = report.skipped.len(),
        recommended = report.summary.total_recommended,
        marginal = report.summary.total_marginal,
        "scan complete"
    );

    if args.dry_run {
        tracing::info!(dry_run = true, "skipping report write");
        return Ok(());
    }

    let reports_dir = args
        .reports_dir
        .or_else(|| settings.reports_dir.as_deref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./reports"));

    let latest = crush_core::report::emitter::write_report(&report, &reports_dir)
        .context("writing scan report failed")?;
    tracing::info!(path = %latest.display(), "report written");

    if let Some(web_dir) = settings.web_public_dir.as_deref() {
        match crush_core::report::emitter::copy_to_web_dir(&report, Path::new(web_dir)) {
            Ok(Some(path)) => tracing::info!(path = %path.display(), "report copied to web dir"),
            Ok(None) => tracing::debug!(web_dir, "web dir absent; copy skipped"),
            Err(err) => {
                // Publication is best-effort; the canonical report is already on disk.
                sentry_anyhow::capture_anyhow(&err);
                tracing::warn!(error = %err, "web dir copy failed");
            }
        }
    }

    Ok(())
}

fn init_sentry(settings: &crush_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
