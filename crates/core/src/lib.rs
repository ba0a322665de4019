pub mod domain;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod storage;

pub mod config {
    use crate::error::ConfigError;
    use std::path::PathBuf;
    use std::time::Duration;

    const DEFAULT_DATA_DIR: &str = "data";
    const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_KTC_PAGE_DELAY_MS: u64 = 1000;
    pub const MAX_KTC_PAGES: u32 = 50;
    pub const DEFAULT_HISTORY_RETENTION: usize = 10;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum UnderdogLayout {
        /// `rank, name, position, team` in fixed order.
        Fixed,
        /// Header-driven column detection with round.pick ADP conversion.
        #[default]
        Adaptive,
    }

    impl UnderdogLayout {
        pub fn parse(s: &str) -> Option<Self> {
            match s.trim().to_ascii_lowercase().as_str() {
                "fixed" => Some(Self::Fixed),
                "adaptive" => Some(Self::Adaptive),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum KtcStrategyKind {
        /// Bracket-counted extraction of the embedded `playersArray`.
        #[default]
        Embedded,
        /// Regex scan of paginated player cards.
        Cards,
    }

    impl KtcStrategyKind {
        pub fn parse(s: &str) -> Option<Self> {
            match s.trim().to_ascii_lowercase().as_str() {
                "embedded" => Some(Self::Embedded),
                "cards" => Some(Self::Cards),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub underdog_csv_url: Option<String>,
        pub underdog_layout: UnderdogLayout,
        pub underdog_slate: Option<String>,
        pub data_dir: PathBuf,
        pub ktc_strategy: KtcStrategyKind,
        pub ktc_page_delay: Duration,
        pub ktc_max_pages: u32,
        pub http_timeout: Duration,
        pub history_retention: usize,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                underdog_csv_url: None,
                underdog_layout: UnderdogLayout::default(),
                underdog_slate: None,
                data_dir: PathBuf::from(DEFAULT_DATA_DIR),
                ktc_strategy: KtcStrategyKind::default(),
                ktc_page_delay: Duration::from_millis(DEFAULT_KTC_PAGE_DELAY_MS),
                ktc_max_pages: MAX_KTC_PAGES,
                http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
                history_retention: DEFAULT_HISTORY_RETENTION,
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self::from_lookup(|key| std::env::var(key).ok()))
        }

        /// Reads settings through `lookup`; blank, unparseable or out-of-range values fall back
        /// to the defaults.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
            let defaults = Self::default();
            let var = |key: &str| non_empty(lookup(key));
            let parsed = |key: &str| var(key).and_then(|s| s.parse::<u64>().ok());

            Self {
                underdog_csv_url: var("UNDERDOG_CSV_URL"),
                underdog_layout: var("UNDERDOG_LAYOUT")
                    .and_then(|s| UnderdogLayout::parse(&s))
                    .unwrap_or(defaults.underdog_layout),
                underdog_slate: var("UNDERDOG_SLATE"),
                data_dir: var("RANKINGS_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.data_dir),
                ktc_strategy: var("KTC_STRATEGY")
                    .and_then(|s| KtcStrategyKind::parse(&s))
                    .unwrap_or(defaults.ktc_strategy),
                ktc_page_delay: parsed("KTC_PAGE_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.ktc_page_delay),
                ktc_max_pages: parsed("KTC_MAX_PAGES")
                    .map(|n| n.clamp(1, u64::from(MAX_KTC_PAGES)) as u32)
                    .unwrap_or(defaults.ktc_max_pages),
                http_timeout: parsed("HTTP_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.http_timeout),
                history_retention: parsed("HISTORY_RETENTION")
                    .filter(|n| *n >= 1)
                    .map(|n| n as usize)
                    .unwrap_or(defaults.history_retention),
                sentry_dsn: var("SENTRY_DSN"),
            }
        }

        pub fn require_underdog_csv_url(&self) -> Result<&str, ConfigError> {
            self.underdog_csv_url
                .as_deref()
                .ok_or(ConfigError::missing("UNDERDOG_CSV_URL"))
        }
    }

    fn non_empty(value: Option<String>) -> Option<String> {
        value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

}
