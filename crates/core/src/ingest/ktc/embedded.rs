use super::{
    is_ktc_position, team_or_free_agent, KtcExtraction, KtcExtractor, KtcFormat, KtcPlayers,
    ValueField,
};
use crate::domain::{rerank, KtcPlayer, Source};
use crate::error::ExtractionError;
use crate::ingest::fetch::SourceFetcher;
use crate::storage::RawPayload;
use anyhow::{Context, Result};
use serde_json::Value;

const ARRAY_MARKER: &str = "var playersArray = [";

/// Reads the embedded `playersArray` literal from the first listing page.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedArrayExtractor;

#[async_trait::async_trait]
impl KtcExtractor for EmbeddedArrayExtractor {
    fn strategy_name(&self) -> &'static str {
        "embedded"
    }

    async fn extract(
        &self,
        fetcher: &dyn SourceFetcher,
        format: &KtcFormat,
    ) -> Result<KtcExtraction> {
        let url = format.page_url(0);
        let html = fetcher
            .fetch_text(&url)
            .await
            .with_context(|| format!("fetch KTC {} page failed", format.key))?;
        tracing::info!(format = format.key, bytes = html.len(), "fetched KTC page");

        let array_text = extract_players_array(&html)?;
        let entries = parse_players_array(array_text)?;
        let players = map_entries(&entries, format.value_field);
        tracing::info!(
            format = format.key,
            raw_entries = entries.len(),
            players = players.len(),
            "mapped KTC players"
        );
        if players.is_empty() {
            return Err(ExtractionError::new(
                Source::Ktc,
                "map",
                format!("no {} values for {}", format.value_field.key(), format.key),
            )
            .into());
        }

        Ok(KtcExtraction {
            raw: RawPayload::json(array_text),
            players: KtcPlayers::Embedded(players),
        })
    }
}

/// Returns the `[...]` text of the embedded players array, brackets included.
///
/// Brackets are counted only outside string literals; a quote preceded by an unescaped backslash
/// does not end the literal.
pub fn extract_players_array(html: &str) -> Result<&str, ExtractionError> {
    let marker = html
        .find(ARRAY_MARKER)
        .ok_or_else(|| ExtractionError::new(Source::Ktc, "locate", "players array not found"))?;
    let open = marker + ARRAY_MARKER.len() - 1;

    let bytes = html.as_bytes();
    let mut depth: usize = 0;
    let mut in_string: Option<u8> = None;
    let mut escaped = false;

    for (idx, &b) in bytes.iter().enumerate().skip(open) {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == quote {
                in_string = None;
            }
            continue;
        }

        match b {
            b'"' | b'\'' => in_string = Some(b),
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&html[open..=idx]);
                }
            }
            _ => {}
        }
    }

    Err(ExtractionError::new(
        Source::Ktc,
        "balance",
        "players array brackets never closed",
    ))
}

pub fn parse_players_array(text: &str) -> Result<Vec<Value>, ExtractionError> {
    serde_json::from_str::<Vec<Value>>(text).map_err(|err| {
        tracing::warn!(error = %err, "KTC players array is not valid JSON");
        ExtractionError::new(Source::Ktc, "parse", err.to_string())
    })
}

/// Maps raw entries for one format, then orders by the source rank and renumbers densely.
pub fn map_entries(entries: &[Value], value_field: ValueField) -> Vec<KtcPlayer> {
    let mut ranked: Vec<(Option<u32>, KtcPlayer)> = entries
        .iter()
        .filter_map(|entry| map_entry(entry, value_field))
        .collect();

    // Entries without a source rank sort after every ranked one.
    ranked.sort_by_key(|(source_rank, _)| source_rank.unwrap_or(u32::MAX));

    let mut players: Vec<KtcPlayer> = ranked.into_iter().map(|(_, p)| p).collect();
    rerank(&mut players);
    players
}

fn map_entry(entry: &Value, value_field: ValueField) -> Option<(Option<u32>, KtcPlayer)> {
    let position = entry.get("position")?.as_str()?.trim().to_ascii_uppercase();
    if !is_ktc_position(&position) {
        return None;
    }

    let name = entry.get("playerName")?.as_str()?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let values = entry.get(value_field.key())?;
    let value = values.get("value").and_then(Value::as_f64)?;
    let source_rank = get_u32(values, "rank");

    let player = KtcPlayer {
        id: entry.get("playerID").and_then(Value::as_i64),
        name,
        position,
        team: team_or_free_agent(entry.get("team").and_then(Value::as_str)),
        value,
        rank: source_rank.unwrap_or(0),
        position_rank: get_u32(values, "positionalRank"),
        age: entry.get("age").and_then(Value::as_f64),
        kept: get_i64(values, "kept").or_else(|| get_i64(entry, "kept")),
        traded: get_i64(values, "traded").or_else(|| get_i64(entry, "traded")),
        cut: get_i64(values, "cut").or_else(|| get_i64(entry, "cut")),
        overall_tier: get_u32(values, "overallTier"),
        position_tier: get_u32(values, "positionalTier"),
    };

    Some((source_rank, player))
}

fn get_i64(v: &Value, key: &str) -> Option<i64> {
    let n = v.get(key)?;
    n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))
}

fn get_u32(v: &Value, key: &str) -> Option<u32> {
    get_i64(v, key).and_then(|n| u32::try_from(n).ok())
}
