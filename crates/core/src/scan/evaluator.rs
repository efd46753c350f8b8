use crate::domain::chain::{EarningsEvent, MarketSnapshot, OptionContract};
use crate::domain::opportunity::{Recommendation, SkipReason};
use crate::scan::config::ScanConfig;
use crate::time::us_market::days_between;
use chrono::{Duration, NaiveDate};

/// Outcome of evaluating one snapshot: either a classified candidate with the
/// two chosen legs, or a typed skip. Pure function of its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Candidate(Candidate),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub near: OptionContract,
    pub back: OptionContract,
    pub iv_pct: f64,
    pub back_iv_pct: Option<f64>,
    /// Front-over-back IV premium, percent: `(front / back - 1) * 100`.
    pub iv_slope_pct: Option<f64>,
    pub recommendation: Recommendation,
}

/// First expiration on or after the earnings date, no more than
/// `max_lag_days` past it. Earliest wins.
pub fn select_near_expiration(
    expirations: &[NaiveDate],
    earnings_date: NaiveDate,
    max_lag_days: i64,
) -> Option<NaiveDate> {
    let latest = earnings_date + Duration::days(max_lag_days);
    expirations
        .iter()
        .copied()
        .filter(|e| *e >= earnings_date && *e <= latest)
        .min()
}

/// Expiration after the near leg nearest to `today + target_days`. Ties go to
/// the smaller absolute distance, then to the later date.
pub fn select_back_expiration(
    expirations: &[NaiveDate],
    today: NaiveDate,
    target_days: i64,
    near: NaiveDate,
) -> Option<NaiveDate> {
    let target = today + Duration::days(target_days);
    let mut best: Option<NaiveDate> = None;
    for exp in expirations.iter().copied().filter(|e| *e > near) {
        match best {
            None => best = Some(exp),
            Some(current) => {
                let dist = (exp - target).num_days().abs();
                let current_dist = (current - target).num_days().abs();
                if dist < current_dist || (dist == current_dist && exp > current) {
                    best = Some(exp);
                }
            }
        }
    }
    best
}

/// ATM IV approximation (Brenner-Subrahmanyam): iv = mid / (0.398 * spot * sqrt(T)).
/// Only used when the provider reported no IV but the quote itself is usable.
fn approximate_iv(contract: &OptionContract, spot: f64, today: NaiveDate) -> Option<f64> {
    let mid = contract.mid()?;
    let dte = days_between(today, contract.expiration).max(1);
    let years = dte as f64 / 365.0;
    if spot <= 0.0 {
        return None;
    }
    Some(mid / (0.398 * spot * years.sqrt()))
}

/// Tier assignment. Monotonic in IV: raising near IV with everything else
/// held fixed never lowers the tier (the slope rises with it, back IV fixed).
///
/// The crush needs the front month richer than the back month. A flat or
/// inverted term structure is NOT_RECOMMENDED outright; above that, each
/// tier demands its own minimum front-over-back premium. When back-month IV
/// is unknown the slope gate does not apply.
pub fn classify(
    days_to_earnings: i64,
    iv_pct: f64,
    iv_slope_pct: Option<f64>,
    liquidity_ok: bool,
    cfg: &ScanConfig,
) -> Recommendation {
    if matches!(iv_slope_pct, Some(slope) if slope <= 0.0) {
        return Recommendation::NotRecommended;
    }
    let slope_clears = |min: f64| iv_slope_pct.map_or(true, |slope| slope > min);

    if days_to_earnings <= cfg.recommend_days_max
        && iv_pct >= cfg.iv_threshold_pct
        && liquidity_ok
        && slope_clears(cfg.slope_recommend_min_pct)
    {
        Recommendation::Recommended
    } else if days_to_earnings <= cfg.marginal_days_max
        && iv_pct >= cfg.iv_floor_pct
        && slope_clears(cfg.slope_marginal_min_pct)
    {
        Recommendation::Marginal
    } else {
        Recommendation::NotRecommended
    }
}

/// Evaluate one snapshot against the earnings event: validate the chosen
/// expirations, pick the common ATM strike, extract IV, classify.
pub fn evaluate(
    event: &EarningsEvent,
    snapshot: &MarketSnapshot,
    cfg: &ScanConfig,
    today: NaiveDate,
) -> Evaluation {
    let Some(near_chain) = snapshot.near_chain.as_ref() else {
        return Evaluation::Skipped(SkipReason::NoQualifyingExpiration);
    };
    let Some(back_chain) = snapshot.back_chain.as_ref() else {
        return Evaluation::Skipped(SkipReason::NoQualifyingExpiration);
    };

    let near_ok = near_chain.expiration >= event.earnings_date
        && near_chain.expiration <= event.earnings_date + Duration::days(cfg.near_max_lag_days);
    if !near_ok || back_chain.expiration < near_chain.expiration {
        return Evaluation::Skipped(SkipReason::NoQualifyingExpiration);
    }

    let (Some(near_atm), Some(back_atm)) = (
        near_chain.atm_contract(snapshot.spot_price),
        back_chain.atm_contract(snapshot.spot_price),
    ) else {
        return Evaluation::Skipped(SkipReason::IncompleteChain);
    };

    if (near_atm.strike - back_atm.strike).abs() > cfg.strike_tolerance {
        return Evaluation::Skipped(SkipReason::StrikeMismatch);
    }

    // Both legs must price; a missing or crossed quote is never defaulted.
    if !near_atm.has_usable_quote() || !back_atm.has_usable_quote() {
        return Evaluation::Skipped(SkipReason::IncompleteChain);
    }

    let iv = match near_atm.implied_volatility {
        Some(iv) => iv,
        None => match approximate_iv(near_atm, snapshot.spot_price, today) {
            Some(iv) => iv,
            None => return Evaluation::Skipped(SkipReason::IncompleteChain),
        },
    };
    let iv_pct = iv * 100.0;

    let back_iv = back_atm.implied_volatility.filter(|b| *b > 0.0);
    let iv_slope_pct = back_iv.map(|b| (iv / b - 1.0) * 100.0);

    let liquidity_ok = matches!(
        (near_atm.relative_spread(), back_atm.relative_spread()),
        (Some(near_spread), Some(back_spread))
            if near_spread <= cfg.max_relative_spread && back_spread <= cfg.max_relative_spread
    );

    let recommendation = classify(event.days_to_earnings, iv_pct, iv_slope_pct, liquidity_ok, cfg);

    Evaluation::Candidate(Candidate {
        near: near_atm.clone(),
        back: back_atm.clone(),
        iv_pct,
        back_iv_pct: back_iv.map(|b| b * 100.0),
        iv_slope_pct,
        recommendation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::OptionChain;
    use chrono::{TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn contract(strike: f64, expiration: NaiveDate, iv: Option<f64>) -> OptionContract {
        OptionContract {
            strike,
            expiration,
            bid: Some(8.3),
            ask: Some(8.7),
            implied_volatility: iv,
        }
    }

    fn snapshot(
        spot: f64,
        near: Option<OptionChain>,
        back: Option<OptionChain>,
    ) -> MarketSnapshot {
        MarketSnapshot {
            ticker: "PANW".to_string(),
            spot_price: spot,
            near_chain: near,
            back_chain: back,
            fetched_at: Utc.with_ymd_and_hms(2025, 11, 17, 15, 0, 0).unwrap(),
        }
    }

    fn event(days: i64) -> EarningsEvent {
        EarningsEvent {
            ticker: "PANW".to_string(),
            earnings_date: d(2025, 11, 19),
            days_to_earnings: days,
        }
    }

    fn chain_with_iv(expiration: NaiveDate, strikes: &[f64], iv: Option<f64>) -> OptionChain {
        OptionChain {
            expiration,
            contracts: strikes
                .iter()
                .map(|s| contract(*s, expiration, iv))
                .collect(),
        }
    }

    fn chain(expiration: NaiveDate, strikes: &[f64]) -> OptionChain {
        chain_with_iv(expiration, strikes, Some(0.815))
    }

    fn back(expiration: NaiveDate, strikes: &[f64]) -> OptionChain {
        chain_with_iv(expiration, strikes, Some(0.62))
    }

    #[test]
    fn near_expiration_is_first_on_or_after_earnings() {
        let exps = [d(2025, 11, 14), d(2025, 11, 22), d(2025, 11, 28)];
        assert_eq!(
            select_near_expiration(&exps, d(2025, 11, 19), 7),
            Some(d(2025, 11, 22))
        );
    }

    #[test]
    fn near_expiration_respects_max_lag() {
        let exps = [d(2025, 11, 14), d(2025, 12, 19)];
        assert_eq!(select_near_expiration(&exps, d(2025, 11, 19), 7), None);
    }

    #[test]
    fn back_expiration_nearest_to_target() {
        let today = d(2025, 11, 17);
        let exps = [d(2025, 11, 22), d(2025, 12, 5), d(2025, 12, 19), d(2026, 1, 16)];
        // Target is 2025-12-17; 12-19 is 2 days off, 12-05 is 12 days off.
        assert_eq!(
            select_back_expiration(&exps, today, 30, d(2025, 11, 22)),
            Some(d(2025, 12, 19))
        );
    }

    #[test]
    fn back_expiration_exact_tie_takes_later_date() {
        let today = d(2025, 11, 17);
        // Both 2 days from the 2025-12-17 target.
        let exps = [d(2025, 11, 22), d(2025, 12, 15), d(2025, 12, 19)];
        assert_eq!(
            select_back_expiration(&exps, today, 30, d(2025, 11, 22)),
            Some(d(2025, 12, 19))
        );
    }

    #[test]
    fn back_expiration_must_follow_near() {
        let today = d(2025, 11, 17);
        let exps = [d(2025, 11, 22)];
        assert_eq!(select_back_expiration(&exps, today, 30, d(2025, 11, 22)), None);
    }

    #[test]
    fn classification_is_monotonic_in_iv() {
        let cfg = ScanConfig::default();
        let back_iv_pct = 50.0;
        let mut last_rank = 0;
        for iv in [30.0, 45.0, 50.0, 59.9, 60.0, 81.5, 120.0] {
            let slope = (iv / back_iv_pct - 1.0) * 100.0;
            let tier = classify(2, iv, Some(slope), true, &cfg);
            let rank = match tier {
                Recommendation::NotRecommended => 0,
                Recommendation::Marginal => 1,
                Recommendation::Recommended => 2,
            };
            assert!(rank >= last_rank, "tier dropped at iv={iv}");
            last_rank = rank;
        }
    }

    #[test]
    fn wide_spread_caps_tier_at_marginal() {
        let cfg = ScanConfig::default();
        let slope = Some(31.5);
        assert_eq!(classify(2, 81.5, slope, false, &cfg), Recommendation::Marginal);
        assert_eq!(classify(2, 81.5, slope, true, &cfg), Recommendation::Recommended);
    }

    #[test]
    fn far_out_earnings_are_not_recommended() {
        let cfg = ScanConfig::default();
        assert_eq!(
            classify(20, 81.5, Some(31.5), true, &cfg),
            Recommendation::NotRecommended
        );
    }

    #[test]
    fn nonpositive_slope_is_not_recommended_regardless_of_iv() {
        let cfg = ScanConfig::default();
        for slope in [0.0, -5.0, -27.8] {
            assert_eq!(
                classify(2, 120.0, Some(slope), true, &cfg),
                Recommendation::NotRecommended,
                "slope={slope}"
            );
        }
    }

    #[test]
    fn shallow_slope_demotes_tier() {
        let cfg = ScanConfig::default();
        // Above the marginal slope floor but not the recommend one.
        assert_eq!(classify(2, 65.0, Some(8.3), true, &cfg), Recommendation::Marginal);
        // Positive but below the marginal floor.
        assert_eq!(
            classify(2, 65.0, Some(3.0), true, &cfg),
            Recommendation::NotRecommended
        );
    }

    #[test]
    fn unknown_back_iv_skips_the_slope_gate() {
        let cfg = ScanConfig::default();
        assert_eq!(classify(2, 81.5, None, true, &cfg), Recommendation::Recommended);
    }

    #[test]
    fn missing_back_chain_skips_with_no_qualifying_expiration() {
        let cfg = ScanConfig::default();
        let snap = snapshot(202.9, Some(chain(d(2025, 11, 22), &[200.0, 205.0])), None);
        assert_eq!(
            evaluate(&event(2), &snap, &cfg, d(2025, 11, 17)),
            Evaluation::Skipped(SkipReason::NoQualifyingExpiration)
        );
    }

    #[test]
    fn strike_sets_that_do_not_overlap_skip_with_mismatch() {
        let cfg = ScanConfig::default();
        let snap = snapshot(
            202.9,
            Some(chain(d(2025, 11, 22), &[200.0, 205.0])),
            Some(chain(d(2025, 12, 19), &[190.0, 210.0])),
        );
        assert_eq!(
            evaluate(&event(2), &snap, &cfg, d(2025, 11, 17)),
            Evaluation::Skipped(SkipReason::StrikeMismatch)
        );
    }

    #[test]
    fn missing_quotes_skip_with_incomplete_chain() {
        let cfg = ScanConfig::default();
        let mut near = chain(d(2025, 11, 22), &[205.0]);
        near.contracts[0].bid = None;
        let snap = snapshot(202.9, Some(near), Some(chain(d(2025, 12, 19), &[205.0])));
        assert_eq!(
            evaluate(&event(2), &snap, &cfg, d(2025, 11, 17)),
            Evaluation::Skipped(SkipReason::IncompleteChain)
        );
    }

    #[test]
    fn missing_iv_falls_back_to_approximation() {
        let cfg = ScanConfig::default();
        let mut near = chain(d(2025, 11, 22), &[205.0]);
        near.contracts[0].implied_volatility = None;
        let snap = snapshot(202.9, Some(near), Some(chain(d(2025, 12, 19), &[205.0])));
        match evaluate(&event(2), &snap, &cfg, d(2025, 11, 17)) {
            Evaluation::Candidate(c) => assert!(c.iv_pct > 0.0),
            other => panic!("expected candidate, got {other:?}"),
        }
    }

    #[test]
    fn evaluation_is_idempotent_for_identical_snapshots() {
        let cfg = ScanConfig::default();
        let snap = snapshot(
            202.9,
            Some(chain(d(2025, 11, 22), &[200.0, 205.0, 210.0])),
            Some(chain(d(2025, 12, 19), &[200.0, 205.0, 210.0])),
        );
        let today = d(2025, 11, 17);
        let first = evaluate(&event(2), &snap, &cfg, today);
        let second = evaluate(&event(2), &snap, &cfg, today);
        assert_eq!(first, second);
    }

    #[test]
    fn qualifying_snapshot_is_recommended() {
        let cfg = ScanConfig::default();
        let snap = snapshot(
            202.9,
            Some(chain(d(2025, 11, 22), &[200.0, 205.0, 210.0])),
            Some(back(d(2025, 12, 19), &[200.0, 205.0, 210.0])),
        );
        match evaluate(&event(2), &snap, &cfg, d(2025, 11, 17)) {
            Evaluation::Candidate(c) => {
                assert_eq!(c.near.strike, 205.0);
                assert_eq!(c.back.strike, 205.0);
                assert_eq!(c.recommendation, Recommendation::Recommended);
                assert!((c.iv_pct - 81.5).abs() < 1e-9);
                // (0.815 / 0.62 - 1) * 100
                let slope = c.iv_slope_pct.unwrap();
                assert!((slope - 31.451612903225808).abs() < 1e-9);
            }
            other => panic!("expected candidate, got {other:?}"),
        }
    }

    #[test]
    fn inverted_term_structure_is_not_recommended() {
        // High front IV with an even richer back month has no crush edge.
        let cfg = ScanConfig::default();
        let snap = snapshot(
            202.9,
            Some(chain_with_iv(d(2025, 11, 22), &[205.0], Some(0.65))),
            Some(chain_with_iv(d(2025, 12, 19), &[205.0], Some(0.90))),
        );
        match evaluate(&event(2), &snap, &cfg, d(2025, 11, 17)) {
            Evaluation::Candidate(c) => {
                assert!(c.iv_slope_pct.unwrap() < 0.0);
                assert_eq!(c.recommendation, Recommendation::NotRecommended);
            }
            other => panic!("expected candidate, got {other:?}"),
        }
    }
}
