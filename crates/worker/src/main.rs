use clap::{Parser, ValueEnum};
use rankings_core::config::{KtcStrategyKind, Settings};
use rankings_core::ingest::fantasycalc::FantasyCalcFormat;
use rankings_core::ingest::ktc::{self, KtcFormat};
use rankings_core::ingest::{HttpFetcher, SourceFetcher};
use rankings_core::pipeline::{Pipeline, RunSummary, UnderdogJob};
use rankings_core::storage::SnapshotStore;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    Underdog,
    Ktc,
    Fantasycalc,
    All,
}

impl SourceArg {
    fn includes(self, other: SourceArg) -> bool {
        self == SourceArg::All || self == other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Embedded,
    Cards,
}

#[derive(Debug, Parser)]
#[command(name = "rankings_worker")]
struct Args {
    /// Which source to fetch.
    #[arg(long, value_enum, default_value_t = SourceArg::All)]
    source: SourceArg,

    /// Output root. Overrides RANKINGS_DATA_DIR.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// KTC extraction strategy. Overrides KTC_STRATEGY.
    #[arg(long, value_enum)]
    ktc_strategy: Option<StrategyArg>,

    /// Fetch and normalize, but write nothing.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to read settings: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    apply_overrides(&mut settings, &args);

    match run(&settings, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "rankings run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: &Settings, args: &Args) -> anyhow::Result<()> {
    // Resolve required configuration before any network traffic.
    let underdog_job = if args.source.includes(SourceArg::Underdog) {
        Some(UnderdogJob::from_settings(settings)?)
    } else {
        None
    };

    let fetcher = HttpFetcher::from_settings(settings)?;
    run_sources(settings, args, underdog_job.as_ref(), &fetcher).await
}

/// Runs every selected source. An Underdog failure does not stop KTC or FantasyCalc, but it is
/// still returned once they finish.
async fn run_sources(
    settings: &Settings,
    args: &Args,
    underdog_job: Option<&UnderdogJob>,
    fetcher: &dyn SourceFetcher,
) -> anyhow::Result<()> {
    let store = SnapshotStore::with_retention(&settings.data_dir, settings.history_retention);
    let pipeline = Pipeline::new(fetcher, &store).dry_run(args.dry_run);

    tracing::info!(
        source = ?args.source,
        data_dir = %settings.data_dir.display(),
        dry_run = args.dry_run,
        "rankings run starting"
    );

    let mut summaries: Vec<RunSummary> = Vec::new();
    let mut underdog_error: Option<anyhow::Error> = None;

    if let Some(job) = underdog_job {
        match pipeline.run_underdog(job).await {
            Ok(outcome) => tracing::info!(%outcome, "underdog complete"),
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "underdog run failed");
                underdog_error = Some(err);
            }
        }
    }

    if args.source.includes(SourceArg::Ktc) {
        let extractor = ktc::extractor_from_settings(settings);
        let formats = KtcFormat::registry();
        summaries.push(pipeline.run_ktc(extractor.as_ref(), &formats).await);
    }

    if args.source.includes(SourceArg::Fantasycalc) {
        let formats = FantasyCalcFormat::registry();
        summaries.push(pipeline.run_fantasycalc(&formats).await);
    }

    for summary in &summaries {
        summary.log();
    }
    let failures: usize = summaries.iter().map(RunSummary::failures).sum();
    tracing::info!(failures, "rankings run finished");

    match underdog_error {
        Some(err) => Err(err.context("underdog run failed")),
        None => Ok(()),
    }
}

fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(dir) = &args.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(strategy) = args.ktc_strategy {
        settings.ktc_strategy = match strategy {
            StrategyArg::Embedded => KtcStrategyKind::Embedded,
            StrategyArg::Cards => KtcStrategyKind::Cards,
        };
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn parses_source_and_overrides() {
        let args = Args::try_parse_from([
            "rankings_worker",
            "--source",
            "ktc",
            "--ktc-strategy",
            "cards",
            "--data-dir",
            "/tmp/out",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.source, SourceArg::Ktc);
        assert!(args.dry_run);

        let mut settings = Settings::default();
        apply_overrides(&mut settings, &args);
        assert_eq!(settings.ktc_strategy, KtcStrategyKind::Cards);
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn all_includes_every_source() {
        let args = Args::try_parse_from(["rankings_worker"]).unwrap();
        assert_eq!(args.source, SourceArg::All);
        assert!(args.source.includes(SourceArg::Underdog));
        assert!(args.source.includes(SourceArg::Fantasycalc));
        assert!(!SourceArg::Ktc.includes(SourceArg::Underdog));
    }

    #[tokio::test]
    async fn missing_underdog_url_fails_before_fetching() {
        let args = Args::try_parse_from(["rankings_worker", "--source", "underdog"]).unwrap();
        let err = run(&Settings::default(), &args).await.unwrap_err();
        let config = err
            .downcast_ref::<rankings_core::error::ConfigError>()
            .expect("config error");
        assert_eq!(config.variable, "UNDERDOG_CSV_URL");
    }

    /// Serves FantasyCalc bodies and fails everything else.
    #[derive(Default)]
    struct FantasyCalcOnly {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl SourceFetcher for FantasyCalcOnly {
        async fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            if url.contains("fantasycalc") {
                Ok(r#"[{"player":{"name":"A","position":"WR"},"value":10,"overallRank":1}]"#
                    .to_string())
            } else {
                anyhow::bail!("HTTP 503 from {url}")
            }
        }
    }

    #[tokio::test]
    async fn underdog_failure_still_runs_other_sources() {
        let args = Args::try_parse_from(["rankings_worker", "--dry-run"]).unwrap();
        let settings = Settings {
            underdog_csv_url: Some("https://example.test/adp.csv".to_string()),
            ..Settings::default()
        };
        let job = UnderdogJob::from_settings(&settings).unwrap();
        let fetcher = FantasyCalcOnly::default();

        let err = run_sources(&settings, &args, Some(&job), &fetcher)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("HTTP 503"));

        let requested = fetcher.requested.lock().unwrap();
        assert_eq!(requested[0], "https://example.test/adp.csv");
        for format in KtcFormat::registry() {
            assert!(requested.contains(&format.page_url(0)));
        }
        for format in FantasyCalcFormat::registry() {
            assert!(requested.contains(&format.url()));
        }
    }
}
