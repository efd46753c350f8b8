use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct UniverseOptions {
    /// Raw SCAN_TICKERS override ("PANW,CRWD AAPL"); replaces the built-in list.
    pub tickers_override: Option<String>,

    /// Cap after normalization, for smoke runs against live providers.
    pub max_tickers: Option<usize>,
}

impl UniverseOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("SCAN_TICKERS") {
            if !s.trim().is_empty() {
                out.tickers_override = Some(s);
            }
        }
        if let Ok(s) = std::env::var("SCAN_MAX_TICKERS") {
            if let Ok(n) = s.parse::<usize>() {
                out.max_tickers = Some(n);
            }
        }

        out
    }
}

pub fn scan_universe(opts: UniverseOptions) -> anyhow::Result<Vec<String>> {
    let mut tickers = match opts.tickers_override.as_deref() {
        Some(raw) => {
            let parsed = parse_ticker_list(raw);
            anyhow::ensure!(!parsed.is_empty(), "SCAN_TICKERS is set but empty after parsing");
            parsed
        }
        None => default_universe(),
    };

    if let Some(max) = opts.max_tickers {
        anyhow::ensure!(max >= 1, "SCAN_MAX_TICKERS must be >= 1");
        tickers.truncate(max);
    }

    Ok(tickers)
}

/// Comma- or whitespace-separated symbols, upper-cased, deduplicated, sorted.
fn parse_ticker_list(raw: &str) -> Vec<String> {
    let set: BTreeSet<String> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    set.into_iter().collect()
}

/// Liquid large-cap default universe: the Mag-7 plus a Nasdaq-100 subset with
/// active options markets.
fn default_universe() -> Vec<String> {
    let mag7 = ["AAPL", "MSFT", "GOOGL", "AMZN", "META", "TSLA", "NVDA"];

    let nasdaq100 = [
        "ADBE", "AMD", "ABNB", "AVGO", "BKNG", "CMCSA", "COST", "CSCO", "CRWD", "DDOG", "DIS",
        "EA", "GILD", "INTC", "INTU", "ISRG", "KLAC", "LRCX", "MELI", "MRNA", "NFLX", "NOW",
        "PANW", "PYPL", "QCOM", "SBUX", "SHOP", "SNOW", "TEAM", "TTWO", "UBER", "WDAY", "ZS",
    ];

    let set: BTreeSet<String> = mag7
        .iter()
        .chain(nasdaq100.iter())
        .map(|s| s.to_string())
        .collect();
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_universe_is_sorted_and_deduplicated() {
        let u = default_universe();
        assert!(!u.is_empty());
        let mut sorted = u.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(u, sorted);
        assert!(u.contains(&"PANW".to_string()));
        assert!(u.contains(&"NVDA".to_string()));
    }

    #[test]
    fn override_list_is_normalized() {
        let parsed = parse_ticker_list("panw, crwd  ddog,,panw\n nvda");
        assert_eq!(parsed, vec!["CRWD", "DDOG", "NVDA", "PANW"]);
    }

    #[test]
    fn empty_override_is_rejected() {
        let opts = UniverseOptions {
            tickers_override: Some(" , ".to_string()),
            max_tickers: None,
        };
        assert!(scan_universe(opts).is_err());
    }

    #[test]
    fn max_tickers_truncates() {
        let opts = UniverseOptions {
            tickers_override: Some("AAPL,MSFT,NVDA".to_string()),
            max_tickers: Some(2),
        };
        let u = scan_universe(opts).unwrap();
        assert_eq!(u.len(), 2);
    }
}
