pub mod domain;
pub mod providers;
pub mod report;
pub mod scan;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub finnhub_api_key: Option<String>,
        pub market_data_base_url: Option<String>,
        pub market_data_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub reports_dir: Option<String>,
        pub web_public_dir: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                finnhub_api_key: std::env::var("FINNHUB_API_KEY").ok(),
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                market_data_api_key: std::env::var("MARKET_DATA_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                reports_dir: std::env::var("REPORTS_DIR").ok(),
                web_public_dir: std::env::var("WEB_PUBLIC_DIR").ok(),
            })
        }

        pub fn require_finnhub_api_key(&self) -> anyhow::Result<&str> {
            self.finnhub_api_key
                .as_deref()
                .context("FINNHUB_API_KEY is required")
        }

        pub fn require_market_data_base_url(&self) -> anyhow::Result<&str> {
            self.market_data_base_url
                .as_deref()
                .context("MARKET_DATA_BASE_URL is required")
        }
    }
}
