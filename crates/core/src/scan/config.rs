use anyhow::Result;

/// Thresholds and windows for one scan run. Passed by value into the
/// aggregator; there is no process-wide configuration state.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Look-ahead window for earnings, calendar days.
    pub days_ahead: i64,

    /// Max days-to-earnings for the RECOMMENDED tier.
    pub recommend_days_max: i64,

    /// Max days-to-earnings for the MARGINAL tier.
    pub marginal_days_max: i64,

    /// Near-term ATM IV (percent) at or above which a setup is RECOMMENDED.
    pub iv_threshold_pct: f64,

    /// Secondary IV floor (percent); below this the setup is NOT_RECOMMENDED.
    pub iv_floor_pct: f64,

    /// Min front-over-back IV premium (percent) for the RECOMMENDED tier.
    pub slope_recommend_min_pct: f64,

    /// Min front-over-back IV premium (percent) for the MARGINAL tier.
    pub slope_marginal_min_pct: f64,

    /// Max (ask - bid) / mid on either leg before liquidity is unacceptable.
    pub max_relative_spread: f64,

    /// Target horizon for the back-month expiration, calendar days from today.
    pub back_target_days: i64,

    /// Latest acceptable near expiration, calendar days after the earnings date.
    pub near_max_lag_days: i64,

    /// Max strike distance between the two legs' ATM contracts.
    pub strike_tolerance: f64,

    /// Per-ticker provider call budget.
    pub fetch_timeout_secs: u64,

    /// Politeness delay between per-ticker fetches.
    pub request_delay_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            days_ahead: 30,
            recommend_days_max: 5,
            marginal_days_max: 7,
            iv_threshold_pct: 60.0,
            iv_floor_pct: 50.0,
            slope_recommend_min_pct: 10.0,
            slope_marginal_min_pct: 5.0,
            max_relative_spread: 0.35,
            back_target_days: 30,
            near_max_lag_days: 7,
            strike_tolerance: 0.01,
            fetch_timeout_secs: 30,
            request_delay_ms: 150,
        }
    }
}

impl ScanConfig {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("SCAN_DAYS_AHEAD") {
            if let Ok(n) = s.parse::<i64>() {
                out.days_ahead = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_RECOMMEND_DAYS_MAX") {
            if let Ok(n) = s.parse::<i64>() {
                out.recommend_days_max = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_MARGINAL_DAYS_MAX") {
            if let Ok(n) = s.parse::<i64>() {
                out.marginal_days_max = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_IV_THRESHOLD_PCT") {
            if let Ok(n) = s.parse::<f64>() {
                out.iv_threshold_pct = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_IV_FLOOR_PCT") {
            if let Ok(n) = s.parse::<f64>() {
                out.iv_floor_pct = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_SLOPE_RECOMMEND_MIN_PCT") {
            if let Ok(n) = s.parse::<f64>() {
                out.slope_recommend_min_pct = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_SLOPE_MARGINAL_MIN_PCT") {
            if let Ok(n) = s.parse::<f64>() {
                out.slope_marginal_min_pct = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_MAX_REL_SPREAD") {
            if let Ok(n) = s.parse::<f64>() {
                out.max_relative_spread = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_BACK_TARGET_DAYS") {
            if let Ok(n) = s.parse::<i64>() {
                out.back_target_days = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_NEAR_MAX_LAG_DAYS") {
            if let Ok(n) = s.parse::<i64>() {
                out.near_max_lag_days = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_FETCH_TIMEOUT_SECS") {
            if let Ok(n) = s.parse::<u64>() {
                out.fetch_timeout_secs = n;
            }
        }
        if let Ok(s) = std::env::var("SCAN_REQ_DELAY_MS") {
            if let Ok(n) = s.parse::<u64>() {
                out.request_delay_ms = n;
            }
        }

        out
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (1..=120).contains(&self.days_ahead),
            "SCAN_DAYS_AHEAD must be 1..=120 (got {})",
            self.days_ahead
        );
        anyhow::ensure!(
            self.recommend_days_max <= self.marginal_days_max,
            "recommend window ({}) must not exceed marginal window ({})",
            self.recommend_days_max,
            self.marginal_days_max
        );
        anyhow::ensure!(
            self.iv_floor_pct <= self.iv_threshold_pct,
            "IV floor ({}) must not exceed IV threshold ({})",
            self.iv_floor_pct,
            self.iv_threshold_pct
        );
        anyhow::ensure!(
            self.slope_marginal_min_pct >= 0.0
                && self.slope_marginal_min_pct <= self.slope_recommend_min_pct,
            "slope floor ({}) must be >= 0 and not exceed the recommend slope ({})",
            self.slope_marginal_min_pct,
            self.slope_recommend_min_pct
        );
        anyhow::ensure!(
            self.max_relative_spread > 0.0,
            "SCAN_MAX_REL_SPREAD must be positive"
        );
        anyhow::ensure!(
            self.back_target_days >= 1,
            "SCAN_BACK_TARGET_DAYS must be >= 1"
        );
        anyhow::ensure!(
            self.near_max_lag_days >= 0,
            "SCAN_NEAR_MAX_LAG_DAYS must be >= 0"
        );
        anyhow::ensure!(self.strike_tolerance >= 0.0, "strike tolerance must be >= 0");
        anyhow::ensure!(
            self.fetch_timeout_secs >= 1,
            "SCAN_FETCH_TIMEOUT_SECS must be >= 1"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ScanConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_inverted_iv_bands() {
        let cfg = ScanConfig {
            iv_floor_pct: 70.0,
            iv_threshold_pct: 60.0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_slope_bands() {
        let cfg = ScanConfig {
            slope_marginal_min_pct: 12.0,
            slope_recommend_min_pct: 10.0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ScanConfig {
            slope_marginal_min_pct: -1.0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_day_windows() {
        let cfg = ScanConfig {
            recommend_days_max: 10,
            marginal_days_max: 7,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
