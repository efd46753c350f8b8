pub mod finnhub;
pub mod market;

use crate::domain::chain::MarketSnapshot;
use anyhow::Result;
use chrono::NaiveDate;

/// Capability interface for earnings dates. Implementations own auth,
/// rate limits, and retries; the scan core only sees dates.
#[async_trait::async_trait]
pub trait EarningsCalendar: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// The ticker's next confirmed earnings date within `days_ahead` days of
    /// `today`, or `None` when the calendar has nothing in the window.
    async fn next_earnings_date(
        &self,
        ticker: &str,
        today: NaiveDate,
        days_ahead: i64,
    ) -> Result<Option<NaiveDate>>;
}

/// Capability interface for spot and option-chain data.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Up-front reachability probe. A failure here means the whole universe
    /// would fail, so the scan aborts with one top-level error instead of a
    /// skip per ticker.
    async fn health_check(&self) -> Result<()>;

    async fn list_expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>>;

    async fn fetch_snapshot(
        &self,
        ticker: &str,
        near_expiration: NaiveDate,
        back_expiration: NaiveDate,
    ) -> Result<MarketSnapshot>;
}
