//! Fetch -> normalize -> persist, one source or format at a time.

use crate::config::{Settings, UnderdogLayout};
use crate::domain::{NormalizedResult, Source};
use crate::error::{ConfigError, ExtractionError};
use crate::ingest::fantasycalc::{self, FantasyCalcFormat};
use crate::ingest::ktc::{self, KtcExtractor, KtcFormat, KtcPlayers};
use crate::ingest::underdog;
use crate::ingest::SourceFetcher;
use crate::storage::{CsvTable, RawPayload, SnapshotKey, SnapshotStore};
use anyhow::Context;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Written { players: usize },
    DryRun { players: usize },
    Failed { error: String },
}

impl FormatOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FormatOutcome::Failed { .. })
    }
}

impl fmt::Display for FormatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatOutcome::Written { players } => write!(f, "ok ({players} players)"),
            FormatOutcome::DryRun { players } => write!(f, "dry-run ({players} players)"),
            FormatOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Per-format results for one source, in the order the formats ran.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: Source,
    pub outcomes: Vec<(String, FormatOutcome)>,
}

impl RunSummary {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, format: impl Into<String>, outcome: FormatOutcome) {
        self.outcomes.push((format.into(), outcome));
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn outcome(&self, format: &str) -> Option<&FormatOutcome> {
        self.outcomes
            .iter()
            .find(|(f, _)| f == format)
            .map(|(_, o)| o)
    }

    pub fn log(&self) {
        for (format, outcome) in &self.outcomes {
            if outcome.is_failure() {
                tracing::warn!(source = %self.source, format, %outcome, "run summary");
            } else {
                tracing::info!(source = %self.source, format, %outcome, "run summary");
            }
        }
    }
}

/// Everything the Underdog run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct UnderdogJob {
    pub url: String,
    pub layout: UnderdogLayout,
    pub slate: Option<String>,
}

impl UnderdogJob {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            url: settings.require_underdog_csv_url()?.to_string(),
            layout: settings.underdog_layout,
            slate: settings.underdog_slate.clone(),
        })
    }
}

pub struct Pipeline<'a> {
    fetcher: &'a dyn SourceFetcher,
    store: &'a SnapshotStore,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(fetcher: &'a dyn SourceFetcher, store: &'a SnapshotStore) -> Self {
        Self {
            fetcher,
            store,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Any failure here is fatal to the Underdog run; the caller owns the exit policy.
    pub async fn run_underdog(&self, job: &UnderdogJob) -> anyhow::Result<FormatOutcome> {
        tracing::info!(layout = ?job.layout, "fetching underdog export");
        let csv_text = self
            .fetcher
            .fetch_text(&job.url)
            .await
            .context("fetch underdog export failed")?;

        let players = underdog::normalize(&csv_text, job.layout);
        if players.is_empty() {
            return Err(ExtractionError::new(
                Source::Underdog,
                "rows",
                "export contained no usable rows",
            )
            .into());
        }

        let result = NormalizedResult::new(Source::Underdog, players).with_slate(job.slate.clone());
        let table = underdog::to_csv_table(result.players());
        self.persist(
            &SnapshotKey::source(Source::Underdog),
            &RawPayload::csv(csv_text),
            &result,
            &table,
        )
    }

    pub async fn run_ktc(&self, extractor: &dyn KtcExtractor, formats: &[KtcFormat]) -> RunSummary {
        let mut summary = RunSummary::new(Source::Ktc);
        for format in formats {
            tracing::info!(
                format = format.key,
                strategy = extractor.strategy_name(),
                "fetching KTC rankings"
            );
            let outcome = self.ktc_format(extractor, format).await;
            summary.record(format.key, settle(Source::Ktc, format.key, outcome));
        }
        summary
    }

    async fn ktc_format(
        &self,
        extractor: &dyn KtcExtractor,
        format: &KtcFormat,
    ) -> anyhow::Result<FormatOutcome> {
        let extraction = extractor.extract(self.fetcher, format).await?;
        let key = SnapshotKey::with_format(Source::Ktc, format.key);

        match extraction.players {
            KtcPlayers::Embedded(players) => {
                let result = NormalizedResult::new(Source::Ktc, players)
                    .with_format(format.key, format.name);
                let table = ktc::embedded_csv_table(result.players());
                self.persist(&key, &extraction.raw, &result, &table)
            }
            KtcPlayers::Cards(players) => {
                let result = NormalizedResult::new(Source::Ktc, players)
                    .with_format(format.key, format.name);
                let table = ktc::cards_csv_table(result.players());
                self.persist(&key, &extraction.raw, &result, &table)
            }
        }
    }

    pub async fn run_fantasycalc(&self, formats: &[FantasyCalcFormat]) -> RunSummary {
        let mut summary = RunSummary::new(Source::Fantasycalc);
        for format in formats {
            tracing::info!(format = format.key, "fetching FantasyCalc values");
            let outcome = self.fantasycalc_format(format).await;
            summary.record(format.key, settle(Source::Fantasycalc, format.key, outcome));
        }
        summary
    }

    async fn fantasycalc_format(&self, format: &FantasyCalcFormat) -> anyhow::Result<FormatOutcome> {
        let body = self
            .fetcher
            .fetch_text(&format.url())
            .await
            .with_context(|| format!("fetch FantasyCalc {} failed", format.key))?;

        let payload: serde_json::Value = serde_json::from_str(&body).map_err(|err| {
            ExtractionError::new(Source::Fantasycalc, "parse", err.to_string())
        })?;
        let players = fantasycalc::normalize(&payload)?;
        if players.is_empty() {
            return Err(ExtractionError::new(
                Source::Fantasycalc,
                "rows",
                format!("no usable players for {}", format.key),
            )
            .into());
        }

        let result = NormalizedResult::new(Source::Fantasycalc, players)
            .with_format(format.key, format.name);
        let table = fantasycalc::to_csv_table(result.players());
        self.persist(
            &SnapshotKey::with_format(Source::Fantasycalc, format.key),
            &RawPayload::json(body),
            &result,
            &table,
        )
    }

    fn persist<P: Serialize>(
        &self,
        key: &SnapshotKey,
        raw: &RawPayload,
        result: &NormalizedResult<P>,
        table: &CsvTable,
    ) -> anyhow::Result<FormatOutcome> {
        let players = result.total_players();
        if self.dry_run {
            tracing::info!(
                source = %key.source,
                format = key.format.unwrap_or("-"),
                players,
                "dry run; skipping snapshot write"
            );
            return Ok(FormatOutcome::DryRun { players });
        }

        self.store.write(key, raw, result, table)?;
        Ok(FormatOutcome::Written { players })
    }
}

/// Turns a per-format error into a recorded failure so sibling formats keep running.
fn settle(
    source: Source,
    format: &str,
    outcome: anyhow::Result<FormatOutcome>,
) -> FormatOutcome {
    match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(%source, format, error = %format!("{err:#}"), "format run failed");
            FormatOutcome::Failed {
                error: format!("{err:#}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fetch::testing::StaticFetcher;
    use crate::ingest::ktc::embedded::EmbeddedArrayExtractor;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn fc_body(names: &[&str]) -> String {
        let entries: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                json!({
                    "player": { "name": name, "position": "WR", "maybeTeam": "KC" },
                    "value": 1000 - i as i64,
                    "overallRank": i + 1,
                })
            })
            .collect();
        serde_json::to_string(&entries).unwrap()
    }

    fn ktc_html(name: &str) -> String {
        let array = json!([{
            "playerName": name,
            "position": "RB",
            "team": "DET",
            "oneQBValues": { "value": 7000, "rank": 4 },
            "superflexValues": { "value": 6500, "rank": 8 }
        }]);
        format!("<script>var playersArray = {array};</script>")
    }

    #[tokio::test]
    async fn failed_fetch_leaves_latest_untouched() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let format = FantasyCalcFormat::registry().remove(0);
        let key = SnapshotKey::with_format(Source::Fantasycalc, format.key);

        let ok = StaticFetcher::default().with_body(&format.url(), &fc_body(&["A", "B"]));
        let summary = Pipeline::new(&ok, &store)
            .run_fantasycalc(std::slice::from_ref(&format))
            .await;
        assert_eq!(
            summary.outcome(format.key),
            Some(&FormatOutcome::Written { players: 2 })
        );
        let before = fs::read(store.latest_json_path(&key)).unwrap();

        let failing = StaticFetcher::default().with_status(&format.url(), 500);
        let summary = Pipeline::new(&failing, &store)
            .run_fantasycalc(std::slice::from_ref(&format))
            .await;
        assert_eq!(summary.failures(), 1);

        let after = fs::read(store.latest_json_path(&key)).unwrap();
        assert_eq!(before, after);
        assert_eq!(store.history_files(&key).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_payload_keeps_previous_latest() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let format = FantasyCalcFormat::registry().remove(0);
        let key = SnapshotKey::with_format(Source::Fantasycalc, format.key);

        let ok = StaticFetcher::default().with_body(&format.url(), &fc_body(&["A"]));
        Pipeline::new(&ok, &store)
            .run_fantasycalc(std::slice::from_ref(&format))
            .await;
        let before = fs::read(store.latest_json_path(&key)).unwrap();

        let empty = StaticFetcher::default().with_body(&format.url(), "[]");
        let summary = Pipeline::new(&empty, &store)
            .run_fantasycalc(std::slice::from_ref(&format))
            .await;
        assert!(summary.outcome(format.key).unwrap().is_failure());
        assert_eq!(fs::read(store.latest_json_path(&key)).unwrap(), before);
        assert_eq!(store.history_files(&key).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_failing_format_does_not_stop_the_others() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let formats = KtcFormat::registry();

        let fetcher = StaticFetcher::default()
            .with_body(&formats[0].page_url(0), "<html>layout changed</html>")
            .with_body(&formats[1].page_url(0), &ktc_html("Gibbs"));

        let summary = Pipeline::new(&fetcher, &store)
            .run_ktc(&EmbeddedArrayExtractor, &formats[..2])
            .await;

        assert!(summary.outcome("dynasty-1qb").unwrap().is_failure());
        assert_eq!(
            summary.outcome("dynasty-superflex"),
            Some(&FormatOutcome::Written { players: 1 })
        );

        let key = SnapshotKey::with_format(Source::Ktc, "dynasty-superflex");
        let latest: serde_json::Value =
            serde_json::from_slice(&fs::read(store.latest_json_path(&key)).unwrap()).unwrap();
        assert_eq!(latest["format"], "dynasty-superflex");
        assert_eq!(latest["formatName"], "Dynasty Superflex");
        assert_eq!(latest["players"][0]["value"], 6500.0);
        assert_eq!(latest["players"][0]["rank"], 1);
        assert_eq!(
            latest["totalPlayers"].as_u64().unwrap() as usize,
            latest["players"].as_array().unwrap().len()
        );

        let failed_key = SnapshotKey::with_format(Source::Ktc, "dynasty-1qb");
        assert!(!store.latest_json_path(&failed_key).exists());
    }

    #[tokio::test]
    async fn underdog_run_writes_csv_snapshots() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let job = UnderdogJob {
            url: "https://example.test/adp.csv".to_string(),
            layout: UnderdogLayout::Adaptive,
            slate: Some("Best Ball".to_string()),
        };
        let csv = "firstName,lastName,adp,teamName,slotName\nCeeDee,Lamb,1.4,DAL,WR\n";
        let fetcher = StaticFetcher::default().with_body(&job.url, csv);

        let outcome = Pipeline::new(&fetcher, &store).run_underdog(&job).await.unwrap();
        assert_eq!(outcome, FormatOutcome::Written { players: 1 });

        let key = SnapshotKey::source(Source::Underdog);
        let latest_csv = fs::read_to_string(store.latest_csv_path(&key)).unwrap();
        assert_eq!(
            latest_csv,
            "Rank,Player,Position,Team,Extra,ADP,Final\n1,CeeDee Lamb,WR,DAL,,4,\n"
        );
        let latest: serde_json::Value =
            serde_json::from_slice(&fs::read(store.latest_json_path(&key)).unwrap()).unwrap();
        assert_eq!(latest["slate"], "Best Ball");
        assert!(latest.get("format").is_none());

        let raw: Vec<_> = fs::read_dir(store.raw_dir(Source::Underdog))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(raw.len(), 1);
        assert!(raw[0].starts_with("underdog-") && raw[0].ends_with(".csv"));
    }

    #[tokio::test]
    async fn underdog_http_error_is_returned_to_caller() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let job = UnderdogJob {
            url: "https://example.test/adp.csv".to_string(),
            layout: UnderdogLayout::Fixed,
            slate: None,
        };
        let fetcher = StaticFetcher::default().with_status(&job.url, 500);

        let err = Pipeline::new(&fetcher, &store).run_underdog(&job).await.unwrap_err();
        assert!(format!("{err:#}").contains("HTTP 500"));
        assert!(!store.root().join("processed").exists());
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let formats = FantasyCalcFormat::registry();
        let mut fetcher = StaticFetcher::default();
        for f in &formats {
            fetcher = fetcher.with_body(&f.url(), &fc_body(&["A"]));
        }

        let summary = Pipeline::new(&fetcher, &store)
            .dry_run(true)
            .run_fantasycalc(&formats)
            .await;
        assert_eq!(summary.outcomes.len(), 4);
        assert!(summary
            .outcomes
            .iter()
            .all(|(_, o)| *o == FormatOutcome::DryRun { players: 1 }));
        assert!(!store.root().join("processed").exists());
    }

    #[tokio::test]
    async fn non_array_payload_is_a_recorded_failure() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let format = FantasyCalcFormat::registry().remove(2);
        let fetcher = StaticFetcher::default().with_body(&format.url(), r#"{"error":"rate limited"}"#);

        let summary = Pipeline::new(&fetcher, &store)
            .run_fantasycalc(std::slice::from_ref(&format))
            .await;
        match summary.outcome(format.key) {
            Some(FormatOutcome::Failed { error }) => {
                assert!(error.contains("invalid response shape"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn underdog_job_requires_url() {
        let err = UnderdogJob::from_settings(&Settings::default()).unwrap_err();
        assert_eq!(err, ConfigError::missing("UNDERDOG_CSV_URL"));
    }
}
