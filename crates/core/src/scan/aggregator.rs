use crate::domain::chain::EarningsEvent;
use crate::domain::opportunity::{Opportunity, SkipReason, SkipRecord};
use crate::providers::{EarningsCalendar, MarketDataProvider};
use crate::report::ScanReport;
use crate::scan::config::ScanConfig;
use crate::scan::evaluator::{
    self, select_back_expiration, select_near_expiration, Evaluation,
};
use crate::scan::trade::{round_cents, round_tenth, synthesize};
use crate::time::us_market::days_between;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::time::Duration;

/// Drive one scan over the ticker universe. Per-ticker failures become skip
/// records; only a universal provider outage aborts the run.
pub async fn scan(
    calendar: &dyn EarningsCalendar,
    market: &dyn MarketDataProvider,
    universe: &[String],
    cfg: &ScanConfig,
    today: NaiveDate,
) -> Result<ScanReport> {
    cfg.validate()?;

    market.health_check().await.with_context(|| {
        format!(
            "market data provider '{}' unreachable; aborting scan",
            market.provider_name()
        )
    })?;

    let mut skipped: Vec<SkipRecord> = Vec::new();
    let mut upcoming: Vec<EarningsEvent> = Vec::new();

    for ticker in universe {
        match calendar.next_earnings_date(ticker, today, cfg.days_ahead).await {
            Ok(Some(earnings_date)) => {
                let days = days_between(today, earnings_date);
                if (0..=cfg.days_ahead).contains(&days) {
                    tracing::info!(%ticker, %earnings_date, days_to_earnings = days, "earnings in window");
                    upcoming.push(EarningsEvent {
                        ticker: ticker.clone(),
                        earnings_date,
                        days_to_earnings: days,
                    });
                }
            }
            Ok(None) => {
                tracing::debug!(%ticker, "no earnings in window");
            }
            Err(err) => {
                tracing::warn!(%ticker, error = %err, "earnings lookup failed; skipping ticker");
                skipped.push(SkipRecord {
                    ticker: ticker.clone(),
                    reason: SkipReason::ProviderError,
                    detail: Some(format!("{err:#}")),
                });
            }
        }
    }

    // Fetch nearest events first; the final report order is re-sorted below.
    upcoming.sort_by(|a, b| {
        a.days_to_earnings
            .cmp(&b.days_to_earnings)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    let earnings_found = upcoming.len();

    let delay = Duration::from_millis(cfg.request_delay_ms);
    let budget = Duration::from_secs(cfg.fetch_timeout_secs);

    let mut opportunities: Vec<Opportunity> = Vec::new();
    for (idx, event) in upcoming.iter().enumerate() {
        if idx != 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match scan_one(market, event, cfg, today, budget).await {
            Ok(opp) => {
                tracing::info!(
                    ticker = %opp.ticker,
                    recommendation = %opp.recommendation,
                    iv = opp.iv,
                    net_credit = opp.suggested_trade.net_credit,
                    "opportunity evaluated"
                );
                opportunities.push(opp);
            }
            Err(skip) => {
                tracing::warn!(
                    ticker = %skip.ticker,
                    reason = %skip.reason,
                    detail = skip.detail.as_deref().unwrap_or(""),
                    "ticker skipped"
                );
                skipped.push(skip);
            }
        }
    }

    Ok(ScanReport::build(
        today,
        universe.len(),
        earnings_found,
        opportunities,
        skipped,
    ))
}

async fn scan_one(
    market: &dyn MarketDataProvider,
    event: &EarningsEvent,
    cfg: &ScanConfig,
    today: NaiveDate,
    budget: Duration,
) -> Result<Opportunity, SkipRecord> {
    let skip = |reason: SkipReason, detail: Option<String>| SkipRecord {
        ticker: event.ticker.clone(),
        reason,
        detail,
    };

    let expirations = match tokio::time::timeout(budget, market.list_expirations(&event.ticker))
        .await
    {
        Err(_) => {
            return Err(skip(
                SkipReason::ProviderTimeout,
                Some("listing expirations timed out".to_string()),
            ))
        }
        Ok(Err(err)) => return Err(skip(SkipReason::ProviderError, Some(format!("{err:#}")))),
        Ok(Ok(expirations)) => expirations,
    };

    let Some(near) = select_near_expiration(&expirations, event.earnings_date, cfg.near_max_lag_days)
    else {
        return Err(skip(
            SkipReason::NoQualifyingExpiration,
            Some(format!(
                "no expiration within {} days after earnings {}",
                cfg.near_max_lag_days, event.earnings_date
            )),
        ));
    };
    let Some(back) = select_back_expiration(&expirations, today, cfg.back_target_days, near) else {
        return Err(skip(
            SkipReason::NoQualifyingExpiration,
            Some(format!("no back-month expiration after {near}")),
        ));
    };

    let snapshot = match tokio::time::timeout(budget, market.fetch_snapshot(&event.ticker, near, back))
        .await
    {
        Err(_) => {
            return Err(skip(
                SkipReason::ProviderTimeout,
                Some("snapshot fetch timed out".to_string()),
            ))
        }
        Ok(Err(err)) => return Err(skip(SkipReason::ProviderError, Some(format!("{err:#}")))),
        Ok(Ok(snapshot)) => snapshot,
    };

    let candidate = match evaluator::evaluate(event, &snapshot, cfg, today) {
        Evaluation::Skipped(reason) => return Err(skip(reason, None)),
        Evaluation::Candidate(candidate) => candidate,
    };

    let trade = synthesize(&candidate.near, &candidate.back, today)
        .map_err(|err| skip(SkipReason::IncompleteChain, Some(format!("{err:#}"))))?;

    // Implied earnings move from the ATM straddle approximation.
    let expected_move = round_cents(trade.sell_price * 2.0);
    let expected_move_pct = round_tenth(expected_move / snapshot.spot_price * 100.0);

    Ok(Opportunity {
        ticker: event.ticker.clone(),
        price: round_cents(snapshot.spot_price),
        earnings_date: event.earnings_date,
        days_to_earnings: event.days_to_earnings,
        iv: round_tenth(candidate.iv_pct),
        expected_move,
        expected_move_pct,
        back_iv: candidate.back_iv_pct.map(round_tenth),
        iv_slope_pct: candidate.iv_slope_pct.map(round_tenth),
        recommendation: candidate.recommendation,
        suggested_trade: trade,
    })
}
