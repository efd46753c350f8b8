pub mod emitter;

use crate::domain::opportunity::{Opportunity, Recommendation, SkipRecord};
use crate::scan::trade::round_tenth;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The scan's sole output artifact: opportunities plus separately observable
/// skips and summary counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub total_scanned: usize,
    pub earnings_found: usize,
    pub opportunities: Vec<Opportunity>,
    pub skipped: Vec<SkipRecord>,
    pub summary: ScanSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total_recommended: usize,
    pub total_marginal: usize,
    pub total_not_recommended: usize,
    pub avg_iv: f64,
    /// Mean of `expected_move_pct`, not the dollar figure. Keeps the
    /// `avg_expected_move` key the report consumers already read.
    #[serde(rename = "avg_expected_move")]
    pub avg_expected_move_pct: f64,
}

impl ScanReport {
    pub fn build(
        date: NaiveDate,
        total_scanned: usize,
        earnings_found: usize,
        mut opportunities: Vec<Opportunity>,
        skipped: Vec<SkipRecord>,
    ) -> Self {
        sort_opportunities(&mut opportunities);
        let summary = summarize(&opportunities);
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            date,
            total_scanned,
            earnings_found,
            opportunities,
            skipped,
            summary,
        }
    }
}

/// Report ordering: IV descending, then days-to-earnings ascending, then
/// ticker. Total and stable across runs with identical input.
pub fn sort_opportunities(opportunities: &mut [Opportunity]) {
    opportunities.sort_by(|a, b| {
        b.iv
            .partial_cmp(&a.iv)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.days_to_earnings.cmp(&b.days_to_earnings))
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
}

fn summarize(opportunities: &[Opportunity]) -> ScanSummary {
    let mut recommended = 0;
    let mut marginal = 0;
    let mut not_recommended = 0;
    for opp in opportunities {
        match opp.recommendation {
            Recommendation::Recommended => recommended += 1,
            Recommendation::Marginal => marginal += 1,
            Recommendation::NotRecommended => not_recommended += 1,
        }
    }

    let (avg_iv, avg_expected_move_pct) = if opportunities.is_empty() {
        (0.0, 0.0)
    } else {
        let n = opportunities.len() as f64;
        (
            round_tenth(opportunities.iter().map(|o| o.iv).sum::<f64>() / n),
            round_tenth(opportunities.iter().map(|o| o.expected_move_pct).sum::<f64>() / n),
        )
    };

    ScanSummary {
        total_recommended: recommended,
        total_marginal: marginal,
        total_not_recommended: not_recommended,
        avg_iv,
        avg_expected_move_pct,
    }
}
