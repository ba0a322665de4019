use crate::domain::{FantasyCalcPlayer, Source};
use crate::error::ExtractionError;
use crate::storage::{opt_cell, CsvTable};
use serde_json::Value;

const API_BASE_URL: &str = "https://api.fantasycalc.com/values/current";
const FANTASYCALC_POSITIONS: [&str; 4] = ["QB", "RB", "WR", "TE"];
const UNKNOWN_TEAM: &str = "FA";

pub const CSV_HEADER: &[&str] = &[
    "Rank",
    "Player",
    "Position",
    "Team",
    "Value",
    "PositionRank",
    "Trend30Day",
    "RedraftValue",
    "Tier",
];

/// Query parameters for one FantasyCalc values call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FantasyCalcFormat {
    pub key: &'static str,
    pub name: &'static str,
    pub is_dynasty: bool,
    pub num_qbs: u8,
    pub num_teams: u8,
    pub ppr: u8,
}

impl FantasyCalcFormat {
    pub fn registry() -> Vec<FantasyCalcFormat> {
        let base = |key: &'static str, name: &'static str, is_dynasty: bool, num_qbs: u8| {
            FantasyCalcFormat {
                key,
                name,
                is_dynasty,
                num_qbs,
                num_teams: 12,
                ppr: 1,
            }
        };
        vec![
            base("dynasty-1qb", "Dynasty 1QB", true, 1),
            base("dynasty-superflex", "Dynasty Superflex", true, 2),
            base("redraft-1qb", "Redraft 1QB", false, 1),
            base("redraft-superflex", "Redraft Superflex", false, 2),
        ]
    }

    pub fn url(&self) -> String {
        format!(
            "{API_BASE_URL}?isDynasty={}&numQbs={}&numTeams={}&ppr={}",
            self.is_dynasty, self.num_qbs, self.num_teams, self.ppr
        )
    }
}

/// Flattens the values payload into players ordered by the source's overall rank.
///
/// Rank gaps are kept as received; entries that fail validation are dropped.
pub fn normalize(payload: &Value) -> Result<Vec<FantasyCalcPlayer>, ExtractionError> {
    let entries = payload.as_array().ok_or_else(|| {
        ExtractionError::new(
            Source::Fantasycalc,
            "shape",
            "invalid response shape: expected a JSON array",
        )
    })?;

    let mut players: Vec<FantasyCalcPlayer> = entries
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| map_entry(idx, entry))
        .collect();

    // Stable: equal ranks keep input order.
    players.sort_by_key(|p| p.rank);
    Ok(players)
}

fn map_entry(idx: usize, entry: &Value) -> Option<FantasyCalcPlayer> {
    let player = entry.get("player")?;

    let name = player.get("name")?.as_str()?.trim().to_string();
    let position = player.get("position")?.as_str()?.trim().to_ascii_uppercase();
    if name.is_empty() || !FANTASYCALC_POSITIONS.contains(&position.as_str()) {
        return None;
    }

    let team = player
        .get("maybeTeam")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN_TEAM)
        .to_string();

    let rank = get_u32(entry, "overallRank").unwrap_or(idx as u32 + 1);

    // Missing numbers default to zero; a real zero and a missing value look the same downstream.
    Some(FantasyCalcPlayer {
        rank,
        name,
        position,
        team,
        value: entry.get("value").and_then(Value::as_f64).unwrap_or(0.0),
        position_rank: get_u32(entry, "positionRank"),
        sleeper_id: player.get("sleeperId").and_then(id_string),
        trend_30_day: entry.get("trend30Day").and_then(Value::as_f64).unwrap_or(0.0),
        redraft_value: entry.get("redraftValue").and_then(Value::as_f64),
        tier: get_u32(entry, "maybeTier"),
        is_starter: entry
            .get("starter")
            .or_else(|| entry.get("isStarter"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn get_u32(v: &Value, key: &str) -> Option<u32> {
    let n = v.get(key)?;
    let n = n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))?;
    u32::try_from(n).ok()
}

/// Sleeper ids arrive as strings, occasionally as numbers.
fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn to_csv_table(players: &[FantasyCalcPlayer]) -> CsvTable {
    let mut table = CsvTable::new(CSV_HEADER);
    for p in players {
        table.push(vec![
            p.rank.to_string(),
            p.name.clone(),
            p.position.clone(),
            p.team.clone(),
            p.value.to_string(),
            opt_cell(&p.position_rank),
            p.trend_30_day.to_string(),
            opt_cell(&p.redraft_value),
            opt_cell(&p.tier),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, position: &str, rank: Option<u32>) -> Value {
        let mut v = json!({
            "player": {
                "id": 1,
                "name": name,
                "position": position,
                "maybeTeam": "KC",
                "sleeperId": "4046"
            },
            "value": 5000,
            "positionRank": 3,
            "trend30Day": -12,
            "redraftValue": 4100,
            "maybeTier": 2
        });
        if let Some(rank) = rank {
            v["overallRank"] = json!(rank);
        }
        v
    }

    #[test]
    fn rejects_non_array_payload() {
        let err = normalize(&json!({"error": "nope"})).unwrap_err();
        assert_eq!(err.stage, "shape");
        assert!(err.to_string().contains("invalid response shape"));
    }

    #[test]
    fn drops_kickers_and_uppercases_positions() {
        let payload = json!([entry("Kicker", "K", Some(1)), entry("Lower", "wr", Some(2))]);
        let players = normalize(&payload).unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "Lower");
        assert_eq!(players[0].position, "WR");
        assert_eq!(players[0].sleeper_id.as_deref(), Some("4046"));
        assert_eq!(players[0].trend_30_day, -12.0);
        assert_eq!(players[0].tier, Some(2));
    }

    #[test]
    fn keeps_rank_gaps_and_sorts_stably() {
        let payload = json!([
            entry("Ten", "RB", Some(10)),
            entry("Three", "QB", Some(3)),
            entry("TenAgain", "TE", Some(10)),
        ]);
        let players = normalize(&payload).unwrap();
        let got: Vec<(u32, &str)> = players.iter().map(|p| (p.rank, p.name.as_str())).collect();
        assert_eq!(got, vec![(3, "Three"), (10, "Ten"), (10, "TenAgain")]);
    }

    #[test]
    fn falls_back_to_index_rank_and_defaults() {
        let payload = json!([
            entry("First", "WR", Some(1)),
            { "player": { "name": "Bare", "position": "TE" } }
        ]);
        let players = normalize(&payload).unwrap();
        let bare = &players[1];
        assert_eq!(bare.rank, 2);
        assert_eq!(bare.team, "FA");
        assert_eq!(bare.value, 0.0);
        assert_eq!(bare.position_rank, None);
        assert!(!bare.is_starter);
    }

    #[test]
    fn builds_query_url() {
        let formats = FantasyCalcFormat::registry();
        assert_eq!(
            formats[1].url(),
            "https://api.fantasycalc.com/values/current?isDynasty=true&numQbs=2&numTeams=12&ppr=1"
        );
        assert_eq!(formats.len(), 4);
    }
}
