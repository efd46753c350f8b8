use crate::domain::chain::OptionContract;
use crate::domain::opportunity::SuggestedTrade;
use crate::time::us_market::days_between;
use anyhow::{Context, Result};
use chrono::NaiveDate;

/// Round to cent precision. All leg prices and the net credit go through
/// this, so `net_credit == sell_price - buy_price` holds exactly.
pub fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn round_tenth(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Build the calendar-spread legs from two already-selected ATM contracts.
/// Pricing convention: midpoint on both legs. No market judgment here; a
/// missing price is an error, never a fabricated value.
pub fn synthesize(
    near: &OptionContract,
    back: &OptionContract,
    today: NaiveDate,
) -> Result<SuggestedTrade> {
    anyhow::ensure!(
        near.expiration <= back.expiration,
        "sell expiration {} is after buy expiration {}",
        near.expiration,
        back.expiration
    );

    let sell_dte = days_between(today, near.expiration);
    let buy_dte = days_between(today, back.expiration);
    anyhow::ensure!(
        sell_dte >= 0,
        "sell expiration {} is in the past (today {today})",
        near.expiration
    );

    let sell_price = round_cents(
        near.mid()
            .with_context(|| format!("no usable quote on sell leg (strike {})", near.strike))?,
    );
    let buy_price = round_cents(
        back.mid()
            .with_context(|| format!("no usable quote on buy leg (strike {})", back.strike))?,
    );

    Ok(SuggestedTrade {
        strike: near.strike,
        sell_expiration: near.expiration,
        buy_expiration: back.expiration,
        sell_dte,
        buy_dte,
        sell_price,
        buy_price,
        net_credit: round_cents(sell_price - buy_price),
    })
}
