use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of recommendation tiers. Serialized exactly as the report
/// consumers expect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "RECOMMENDED")]
    Recommended,
    #[serde(rename = "MARGINAL")]
    Marginal,
    #[serde(rename = "NOT_RECOMMENDED")]
    NotRecommended,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Recommended => "RECOMMENDED",
            Recommendation::Marginal => "MARGINAL",
            Recommendation::NotRecommended => "NOT_RECOMMENDED",
        };
        f.write_str(s)
    }
}

/// Two-leg calendar spread: sell the near expiration, buy the back month at
/// the same strike. `net_credit = sell_price - buy_price` at cent precision;
/// a negative value is a net debit, which is expected when the back leg costs
/// more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedTrade {
    pub strike: f64,
    pub sell_expiration: NaiveDate,
    pub buy_expiration: NaiveDate,
    pub sell_dte: i64,
    pub buy_dte: i64,
    pub sell_price: f64,
    pub buy_price: f64,
    pub net_credit: f64,
}

/// One ticker's scan result. Constructed once per run, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub ticker: String,
    pub price: f64,
    pub earnings_date: NaiveDate,
    pub days_to_earnings: i64,
    /// Near-term ATM implied volatility, percent.
    pub iv: f64,
    /// ATM straddle approximation of the implied earnings move, dollars.
    pub expected_move: f64,
    pub expected_move_pct: f64,
    /// Back-month ATM implied volatility, percent, when the provider had it.
    pub back_iv: Option<f64>,
    /// Front-over-back IV premium, percent. Present whenever `back_iv` is.
    pub iv_slope_pct: Option<f64>,
    pub recommendation: Recommendation,
    pub suggested_trade: SuggestedTrade,
}

/// Why a ticker dropped out of the scan. Per-ticker and non-fatal; the run
/// records the skip and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoQualifyingExpiration,
    StrikeMismatch,
    IncompleteChain,
    ProviderTimeout,
    ProviderError,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NoQualifyingExpiration => "no_qualifying_expiration",
            SkipReason::StrikeMismatch => "strike_mismatch",
            SkipReason::IncompleteChain => "incomplete_chain",
            SkipReason::ProviderTimeout => "provider_timeout",
            SkipReason::ProviderError => "provider_error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub ticker: String,
    pub reason: SkipReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
