use crate::config::Settings;
use crate::domain::chain::{MarketSnapshot, OptionChain, OptionContract};
use crate::providers::MarketDataProvider;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;

/// Generic HTTP/JSON market-data gateway. Expects three endpoints under the
/// configured base URL:
///   GET /healthz
///   GET /v1/expirations?ticker=SYM
///   GET /v1/chain?ticker=SYM&expiration=YYYY-MM-DD
/// Auth (when configured) is an `x-api-key` header.
#[derive(Debug, Clone)]
pub struct HttpJsonMarketData {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retries: u32,
}

impl HttpJsonMarketData {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_market_data_base_url()?.to_string();
        let api_key = settings.market_data_api_key.clone();

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("MARKET_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn get_once(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;
        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }
        Ok(text)
    }

    async fn get_with_retries(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(path, query).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = backoff_delay(attempt);
                    tracing::warn!(attempt, ?backoff, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn fetch_chain(&self, ticker: &str, expiration: NaiveDate) -> Result<ChainResponse> {
        let text = self
            .get_with_retries(
                "/v1/chain",
                &[
                    ("ticker", ticker.to_string()),
                    ("expiration", expiration.to_string()),
                ],
            )
            .await?;

        let parsed = serde_json::from_str::<ChainResponse>(&text)
            .context("failed to parse option chain response")?;
        validate_chain(&parsed, ticker, expiration)?;
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for HttpJsonMarketData {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn health_check(&self) -> Result<()> {
        // One shot, no retries: the point is a fast universal-outage signal.
        self.get_once("/healthz", &[]).await.map(|_| ())
    }

    async fn list_expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>> {
        let text = self
            .get_with_retries("/v1/expirations", &[("ticker", ticker.to_string())])
            .await?;
        let parsed = serde_json::from_str::<ExpirationsResponse>(&text)
            .context("failed to parse expirations response")?;
        anyhow::ensure!(
            parsed.ticker.eq_ignore_ascii_case(ticker),
            "expirations ticker mismatch: asked {ticker}, got {}",
            parsed.ticker
        );

        let mut expirations = parsed.expirations;
        expirations.sort();
        expirations.dedup();
        Ok(expirations)
    }

    async fn fetch_snapshot(
        &self,
        ticker: &str,
        near_expiration: NaiveDate,
        back_expiration: NaiveDate,
    ) -> Result<MarketSnapshot> {
        let near = self.fetch_chain(ticker, near_expiration).await?;
        let back = self.fetch_chain(ticker, back_expiration).await?;

        Ok(MarketSnapshot {
            ticker: ticker.to_string(),
            // Both responses carry spot; the near chain is fetched first and wins.
            spot_price: near.spot,
            near_chain: Some(into_chain(near)),
            back_chain: Some(into_chain(back)),
            fetched_at: Utc::now(),
        })
    }
}

/// Exponential backoff, doubling per attempt and plateauing at 64s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(6))
}

fn into_chain(resp: ChainResponse) -> OptionChain {
    let expiration = resp.expiration;
    let mut contracts: Vec<OptionContract> = resp
        .contracts
        .into_iter()
        .map(|c| OptionContract {
            strike: c.strike,
            expiration,
            bid: c.bid,
            ask: c.ask,
            implied_volatility: c.implied_volatility,
        })
        .collect();
    contracts.sort_by(|a, b| {
        a.strike
            .partial_cmp(&b.strike)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    OptionChain {
        expiration,
        contracts,
    }
}

fn validate_chain(resp: &ChainResponse, ticker: &str, expiration: NaiveDate) -> Result<()> {
    anyhow::ensure!(
        resp.ticker.eq_ignore_ascii_case(ticker),
        "chain ticker mismatch: asked {ticker}, got {}",
        resp.ticker
    );
    anyhow::ensure!(
        resp.expiration == expiration,
        "chain expiration mismatch: asked {expiration}, got {}",
        resp.expiration
    );
    anyhow::ensure!(
        resp.spot.is_finite() && resp.spot > 0.0,
        "invalid spot price {} for {ticker}",
        resp.spot
    );
    for contract in &resp.contracts {
        anyhow::ensure!(
            contract.strike.is_finite() && contract.strike > 0.0,
            "invalid strike {} for {ticker} {expiration}",
            contract.strike
        );
        for side in [contract.bid, contract.ask] {
            if let Some(px) = side {
                anyhow::ensure!(
                    px.is_finite() && px >= 0.0,
                    "invalid quote {px} at strike {} for {ticker} {expiration}",
                    contract.strike
                );
            }
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ExpirationsResponse {
    ticker: String,
    #[serde(default)]
    expirations: Vec<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ChainResponse {
    ticker: String,
    expiration: NaiveDate,
    spot: f64,
    #[serde(default)]
    contracts: Vec<WireContract>,
}

#[derive(Debug, Deserialize)]
struct WireContract {
    strike: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    implied_volatility: Option<f64>,
}
