use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single listed option quote. Missing bid/ask/IV stays `None`; nothing in
/// the pipeline is allowed to substitute a zero for an absent quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    pub expiration: NaiveDate,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub implied_volatility: Option<f64>,
}

impl OptionContract {
    /// Midpoint price. `None` when either side is missing, non-positive, or
    /// the quote is crossed.
    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask > 0.0 && bid <= ask => {
                Some((bid + ask) / 2.0)
            }
            _ => None,
        }
    }

    pub fn is_crossed(&self) -> bool {
        matches!((self.bid, self.ask), (Some(bid), Some(ask)) if bid > ask)
    }

    pub fn has_usable_quote(&self) -> bool {
        self.mid().is_some()
    }

    /// (ask - bid) / mid, the liquidity measure used for classification.
    pub fn relative_spread(&self) -> Option<f64> {
        let mid = self.mid()?;
        let (bid, ask) = (self.bid?, self.ask?);
        Some((ask - bid) / mid)
    }
}

/// One expiration's contracts, ordered by strike ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub expiration: NaiveDate,
    pub contracts: Vec<OptionContract>,
}

impl OptionChain {
    /// The contract whose strike is closest to `spot`; ties go to the lower
    /// strike.
    pub fn atm_contract(&self, spot: f64) -> Option<&OptionContract> {
        let mut best: Option<&OptionContract> = None;
        for contract in &self.contracts {
            let dist = (contract.strike - spot).abs();
            match best {
                None => best = Some(contract),
                Some(current) => {
                    let current_dist = (current.strike - spot).abs();
                    if dist < current_dist
                        || (dist == current_dist && contract.strike < current.strike)
                    {
                        best = Some(contract);
                    }
                }
            }
        }
        best
    }
}

/// Immutable per-ticker market state for one scan iteration. A chain that the
/// provider could not produce at all is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub spot_price: f64,
    pub near_chain: Option<OptionChain>,
    pub back_chain: Option<OptionChain>,
    pub fetched_at: DateTime<Utc>,
}

/// A ticker's next earnings announcement, resolved fresh each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsEvent {
    pub ticker: String,
    pub earnings_date: NaiveDate,
    pub days_to_earnings: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(strike: f64, bid: Option<f64>, ask: Option<f64>) -> OptionContract {
        OptionContract {
            strike,
            expiration: NaiveDate::from_ymd_opt(2025, 11, 22).unwrap(),
            bid,
            ask,
            implied_volatility: None,
        }
    }

    #[test]
    fn mid_requires_both_sides_positive_and_uncrossed() {
        assert_eq!(contract(100.0, Some(1.0), Some(2.0)).mid(), Some(1.5));
        assert_eq!(contract(100.0, Some(1.0), None).mid(), None);
        assert_eq!(contract(100.0, None, Some(2.0)).mid(), None);
        assert_eq!(contract(100.0, Some(0.0), Some(2.0)).mid(), None);
        // Crossed quote.
        assert_eq!(contract(100.0, Some(2.5), Some(2.0)).mid(), None);
        assert!(contract(100.0, Some(2.5), Some(2.0)).is_crossed());
    }

    #[test]
    fn relative_spread_is_spread_over_mid() {
        let c = contract(100.0, Some(9.0), Some(11.0));
        let spread = c.relative_spread().unwrap();
        assert!((spread - 0.2).abs() < 1e-12);
    }

    #[test]
    fn atm_picks_strike_closest_to_spot() {
        let chain = OptionChain {
            expiration: NaiveDate::from_ymd_opt(2025, 11, 22).unwrap(),
            contracts: vec![
                contract(95.0, Some(1.0), Some(1.2)),
                contract(100.0, Some(1.0), Some(1.2)),
                contract(105.0, Some(1.0), Some(1.2)),
            ],
        };
        assert_eq!(chain.atm_contract(101.0).unwrap().strike, 100.0);
    }

    #[test]
    fn atm_tie_breaks_to_lower_strike() {
        let chain = OptionChain {
            expiration: NaiveDate::from_ymd_opt(2025, 11, 22).unwrap(),
            contracts: vec![
                contract(95.0, None, None),
                contract(100.0, None, None),
                contract(110.0, None, None),
            ],
        };
        // 105 is equidistant from 100 and 110.
        assert_eq!(chain.atm_contract(105.0).unwrap().strike, 100.0);
    }

    #[test]
    fn atm_on_empty_chain_is_none() {
        let chain = OptionChain {
            expiration: NaiveDate::from_ymd_opt(2025, 11, 22).unwrap(),
            contracts: vec![],
        };
        assert!(chain.atm_contract(100.0).is_none());
    }
}
