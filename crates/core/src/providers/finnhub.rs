use crate::config::Settings;
use crate::providers::EarningsCalendar;
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CACHE_TTL_SECS: i64 = 21_600; // 6 hours

const CACHE_MAX_ENTRIES: usize = 4000;
const CACHE_PRUNE_COUNT: usize = 500;

/// Finnhub earnings-calendar client with a file-backed cache. Both positive
/// and negative lookups are cached under a TTL so repeated daily runs do not
/// hammer the calendar endpoint.
#[derive(Debug)]
pub struct FinnhubCalendar {
    http: reqwest::Client,
    base_url: String,
    token: String,
    cache_file: PathBuf,
    cache_ttl_secs: i64,
}

impl FinnhubCalendar {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let token = settings.require_finnhub_api_key()?.to_string();

        let base_url =
            std::env::var("FINNHUB_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("FINNHUB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let cache_ttl_secs = std::env::var("EARNINGS_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build finnhub http client")?;

        Ok(Self {
            http,
            base_url,
            token,
            cache_file: default_cache_file(),
            cache_ttl_secs,
        })
    }

    pub fn with_cache_file(mut self, path: PathBuf) -> Self {
        self.cache_file = path;
        self
    }

    async fn fetch_calendar(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let url = format!("{}/calendar/earnings", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .get(url)
            .query(&[
                ("from", from.to_string()),
                ("to", to.to_string()),
                ("symbol", ticker.to_string()),
                ("token", self.token.clone()),
            ])
            .send()
            .await
            .context("finnhub earnings calendar request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read finnhub response")?;
        if !status.is_success() {
            anyhow::bail!("finnhub earnings calendar HTTP {status}: {text}");
        }

        let body = serde_json::from_str::<EarningsCalendarResponse>(&text)
            .context("failed to parse finnhub earnings calendar response")?;

        let mut dates: Vec<NaiveDate> = body
            .earnings_calendar
            .into_iter()
            .filter_map(|e| e.date)
            .collect();
        dates.sort();
        Ok(dates)
    }
}

#[async_trait::async_trait]
impl EarningsCalendar for FinnhubCalendar {
    fn provider_name(&self) -> &'static str {
        "finnhub"
    }

    async fn next_earnings_date(
        &self,
        ticker: &str,
        today: NaiveDate,
        days_ahead: i64,
    ) -> Result<Option<NaiveDate>> {
        let to = today + Duration::days(days_ahead);
        let key = cache_key(ticker, today, to);
        let now = unix_now();

        let mut cache = CacheFile::load(&self.cache_file);
        if let Some(entry) = cache.entries.get(&key) {
            if now - entry.checked_at <= self.cache_ttl_secs {
                return Ok(entry.date);
            }
        }

        let dates = self.fetch_calendar(ticker, today, to).await?;
        let next = dates.into_iter().find(|d| *d >= today);

        cache.entries.insert(
            key,
            CacheEntry {
                checked_at: now,
                date: next,
            },
        );
        cache.prune();
        if let Err(err) = cache.save(&self.cache_file) {
            tracing::warn!(error = %err, "failed to persist earnings calendar cache");
        }

        Ok(next)
    }
}

fn cache_key(ticker: &str, from: NaiveDate, to: NaiveDate) -> String {
    format!("{}|{from}|{to}", ticker.to_ascii_uppercase())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn default_cache_file() -> PathBuf {
    if let Ok(path) = std::env::var("EARNINGS_CACHE_FILE") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    let base = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".earnings-crush");
    base.join("finnhub_earnings_calendar_cache.json")
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    checked_at: i64,
    /// `None` is a cached negative: the calendar had nothing in the window.
    date: Option<NaiveDate>,
}

impl CacheFile {
    fn load(path: &PathBuf) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&text).unwrap_or_default()
    }

    fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create cache dir {} failed", parent.display()))?;
        }
        let text = serde_json::to_string(self).context("serialize cache failed")?;
        std::fs::write(path, text)
            .with_context(|| format!("write cache {} failed", path.display()))?;
        Ok(())
    }

    fn prune(&mut self) {
        if self.entries.len() <= CACHE_MAX_ENTRIES {
            return;
        }
        let mut by_age: Vec<(i64, String)> = self
            .entries
            .iter()
            .map(|(k, v)| (v.checked_at, k.clone()))
            .collect();
        by_age.sort();
        for (_, key) in by_age.into_iter().take(CACHE_PRUNE_COUNT) {
            self.entries.remove(&key);
        }
    }
}

#[derive(Debug, Deserialize)]
struct EarningsCalendarResponse {
    #[serde(rename = "earningsCalendar", default)]
    earnings_calendar: Vec<EarningsCalendarEntry>,
}

#[derive(Debug, Deserialize)]
struct EarningsCalendarEntry {
    date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_finnhub_calendar_shape() {
        let v = json!({
            "earningsCalendar": [
                {"date": "2025-11-19", "epsEstimate": 1.56, "symbol": "PANW"},
                {"date": null, "symbol": "PANW"}
            ]
        });
        let parsed: EarningsCalendarResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.earnings_calendar.len(), 2);
        assert_eq!(
            parsed.earnings_calendar[0].date,
            NaiveDate::from_ymd_opt(2025, 11, 19)
        );
        assert_eq!(parsed.earnings_calendar[1].date, None);
    }

    #[test]
    fn missing_calendar_field_parses_as_empty() {
        let parsed: EarningsCalendarResponse = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.earnings_calendar.is_empty());
    }

    #[test]
    fn cache_roundtrip_and_prune() {
        let path = std::env::temp_dir().join(format!(
            "crush_finnhub_cache_{}.json",
            uuid::Uuid::new_v4()
        ));

        let mut cache = CacheFile::default();
        for i in 0..(CACHE_MAX_ENTRIES + 1) {
            cache.entries.insert(
                format!("T{i:05}|2025-11-17|2025-12-17"),
                CacheEntry {
                    checked_at: i as i64,
                    date: None,
                },
            );
        }
        cache.prune();
        assert_eq!(cache.entries.len(), CACHE_MAX_ENTRIES + 1 - CACHE_PRUNE_COUNT);
        // Oldest entries go first.
        assert!(!cache.entries.contains_key("T00000|2025-11-17|2025-12-17"));

        cache.save(&path).unwrap();
        let loaded = CacheFile::load(&path);
        assert_eq!(loaded.entries.len(), cache.entries.len());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unreadable_cache_loads_as_empty() {
        let missing = std::env::temp_dir().join(format!("crush_missing_{}", uuid::Uuid::new_v4()));
        assert!(CacheFile::load(&missing).entries.is_empty());
    }
}
