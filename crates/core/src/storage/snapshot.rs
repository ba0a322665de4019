use crate::config::DEFAULT_HISTORY_RETENTION;
use crate::domain::{NormalizedResult, Source};
use crate::storage::CsvTable;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The response body exactly as it came back (or as close as the strategy keeps it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub extension: &'static str,
    pub body: String,
}

impl RawPayload {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            extension: "json",
            body: body.into(),
        }
    }

    pub fn csv(body: impl Into<String>) -> Self {
        Self {
            extension: "csv",
            body: body.into(),
        }
    }
}

/// Identifies one snapshot set: a source, plus a format for sources that have several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotKey {
    pub source: Source,
    pub format: Option<&'static str>,
}

impl SnapshotKey {
    pub fn source(source: Source) -> Self {
        Self {
            source,
            format: None,
        }
    }

    pub fn with_format(source: Source, format: &'static str) -> Self {
        Self {
            source,
            format: Some(format),
        }
    }

    /// `rankings` or `rankings-<format>`.
    fn processed_stem(&self) -> String {
        match self.format {
            Some(f) => format!("rankings-{f}"),
            None => "rankings".to_string(),
        }
    }

    fn raw_stem(&self) -> String {
        match self.format {
            Some(f) => format!("{}-{f}", self.source),
            None => self.source.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotWrite {
    pub raw: PathBuf,
    pub latest_json: PathBuf,
    pub latest_csv: PathBuf,
    pub history: PathBuf,
    pub pruned: usize,
}

/// Raw + processed snapshot tree rooted at the data directory:
///
/// ```text
/// raw/<source>/<source>[-<format>]-<ts>.<ext>
/// processed/<source>/rankings[-<format>]-latest.{json,csv}
/// processed/<source>/rankings[-<format>]-<ts>.json
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    retention: usize,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_retention(root, DEFAULT_HISTORY_RETENTION)
    }

    pub fn with_retention(root: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            root: root.into(),
            retention: retention.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self, source: Source) -> PathBuf {
        self.root.join("raw").join(source.as_str())
    }

    pub fn processed_dir(&self, source: Source) -> PathBuf {
        self.root.join("processed").join(source.as_str())
    }

    pub fn latest_json_path(&self, key: &SnapshotKey) -> PathBuf {
        self.processed_dir(key.source)
            .join(format!("{}-latest.json", key.processed_stem()))
    }

    pub fn latest_csv_path(&self, key: &SnapshotKey) -> PathBuf {
        self.processed_dir(key.source)
            .join(format!("{}-latest.csv", key.processed_stem()))
    }

    /// Persists one successful run and prunes history for its key.
    pub fn write<P: Serialize>(
        &self,
        key: &SnapshotKey,
        raw: &RawPayload,
        result: &NormalizedResult<P>,
        table: &CsvTable,
    ) -> anyhow::Result<SnapshotWrite> {
        let raw_dir = self.raw_dir(key.source);
        let processed_dir = self.processed_dir(key.source);
        fs::create_dir_all(&raw_dir)
            .with_context(|| format!("create raw dir failed: {}", raw_dir.display()))?;
        fs::create_dir_all(&processed_dir)
            .with_context(|| format!("create processed dir failed: {}", processed_dir.display()))?;

        let token = timestamp_token(result.last_updated());

        let raw_path = raw_dir.join(format!("{}-{token}.{}", key.raw_stem(), raw.extension));
        fs::write(&raw_path, raw.body.as_bytes())
            .with_context(|| format!("write raw snapshot failed: {}", raw_path.display()))?;

        let json = serde_json::to_vec_pretty(result).context("serialize normalized result failed")?;
        let latest_json = self.latest_json_path(key);
        write_replacing(&latest_json, &json)?;

        let latest_csv = self.latest_csv_path(key);
        write_replacing(&latest_csv, &table.to_bytes()?)?;

        let history = processed_dir.join(format!("{}-{token}.json", key.processed_stem()));
        fs::write(&history, &json)
            .with_context(|| format!("write history snapshot failed: {}", history.display()))?;

        let pruned = self.prune_history(key)?;

        tracing::info!(
            source = %key.source,
            format = key.format.unwrap_or("-"),
            players = result.total_players(),
            pruned,
            latest = %latest_json.display(),
            "snapshot written"
        );

        Ok(SnapshotWrite {
            raw: raw_path,
            latest_json,
            latest_csv,
            history,
            pruned,
        })
    }

    /// Timestamped history files for `key`, oldest first.
    pub fn history_files(&self, key: &SnapshotKey) -> anyhow::Result<Vec<PathBuf>> {
        let dir = self.processed_dir(key.source);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}-", key.processed_stem());
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("list {} failed", dir.display()))? {
            let entry = entry.with_context(|| format!("read entry in {} failed", dir.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_history_name(&name, &prefix) {
                names.push(name);
            }
        }

        // Timestamp tokens are fixed-width, so name order is chronological order.
        names.sort();
        Ok(names.into_iter().map(|n| dir.join(n)).collect())
    }

    fn prune_history(&self, key: &SnapshotKey) -> anyhow::Result<usize> {
        let files = self.history_files(key)?;
        if files.len() <= self.retention {
            return Ok(0);
        }

        let excess = files.len() - self.retention;
        for path in &files[..excess] {
            fs::remove_file(path)
                .with_context(|| format!("remove old snapshot failed: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "pruned history snapshot");
        }
        Ok(excess)
    }
}

/// ISO-8601 instant with `:` and `.` swapped for `-`, e.g. `2026-09-01T06-00-00-000Z`.
pub fn timestamp_token(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

fn is_history_name(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|token| token.starts_with(|c: char| c.is_ascii_digit()))
}

/// Writes beside the target and renames over it, so readers never see a half-written file.
fn write_replacing(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("no file name in {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, bytes).with_context(|| format!("write {} failed", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("replace {} failed", path.display()))?;
    Ok(())
}
