use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use std::path::PathBuf;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crush_core::domain::opportunity::Opportunity;
use crush_core::report::emitter::LATEST_FILE;
use crush_core::report::ScanReport;

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

    let reports_dir = settings
        .reports_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./reports"));

    let state = AppState { reports_dir };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/reports/latest", get(get_latest_report))
        .route("/reports/:date", get(get_report_by_date))
        .route("/reports/:date/:ticker", get(get_opportunity))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    reports_dir: PathBuf,
}

async fn get_latest_report(State(state): State<AppState>) -> Result<Json<ScanReport>, StatusCode> {
    let report = read_report(&state, LATEST_FILE).await?;
    Ok(Json(report))
}

async fn get_report_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<ScanReport>, StatusCode> {
    let date = parse_date(&date)?;
    let report = read_report(&state, &report_file_name(date)).await?;
    Ok(Json(report))
}

async fn get_opportunity(
    State(state): State<AppState>,
    Path((date, ticker)): Path<(String, String)>,
) -> Result<Json<Opportunity>, StatusCode> {
    let date = parse_date(&date)?;
    let report = read_report(&state, &report_file_name(date)).await?;

    let ticker = ticker.to_ascii_uppercase();
    let opportunity = report
        .opportunities
        .into_iter()
        .find(|o| o.ticker == ticker)
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(opportunity))
}

fn parse_date(raw: &str) -> Result<NaiveDate, StatusCode> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)
}

fn report_file_name(date: NaiveDate) -> String {
    format!("earnings_crush_{date}.json")
}

async fn read_report(state: &AppState, file_name: &str) -> Result<ScanReport, StatusCode> {
    let path = state.reports_dir.join(file_name);

    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(StatusCode::NOT_FOUND)
        }
        Err(err) => {
            let err = anyhow::Error::new(err)
                .context(format!("reading report {} failed", path.display()));
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "report read failed");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    serde_json::from_str::<ScanReport>(&text).map_err(|err| {
        let err = anyhow::Error::new(err)
            .context(format!("report {} is not valid JSON", path.display()));
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "report parse failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
