use crate::config::UnderdogLayout;
use crate::domain::UnderdogPlayer;
use crate::ingest::csv_line::parse_csv_line;
use crate::storage::CsvTable;

const TEAMS_PER_ROUND: i64 = 12;
const UNKNOWN_TEAM: &str = "N/A";
const ACCEPTED_POSITIONS: [&str; 8] = ["QB", "RB", "WR", "TE", "K", "DST", "DEF", "FLEX"];

pub const CSV_HEADER: &[&str] = &["Rank", "Player", "Position", "Team", "Extra", "ADP", "Final"];

/// Converts a raw ADP export into players, skipping rows that fail validation.
pub fn normalize(csv_text: &str, layout: UnderdogLayout) -> Vec<UnderdogPlayer> {
    let mut lines = csv_text.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let columns = match layout {
        UnderdogLayout::Fixed => None,
        UnderdogLayout::Adaptive => Some(Columns::detect(&parse_csv_line(header))),
    };

    let mut players = Vec::new();
    for (offset, line) in lines.enumerate() {
        let line_index = offset as u32 + 1;
        let fields = parse_csv_line(line);
        let parsed = match &columns {
            None => fixed_row(&fields, line_index),
            Some(columns) => adaptive_row(&fields, columns, line_index),
        };
        if let Some(player) = parsed {
            players.push(player);
        }
    }

    tracing::debug!(?layout, players = players.len(), "normalized underdog export");
    players
}

fn fixed_row(fields: &[String], line_index: u32) -> Option<UnderdogPlayer> {
    if fields.len() < 4 || fields[1].is_empty() {
        return None;
    }

    let rank = parse_rank(&fields[0]).unwrap_or(line_index);
    Some(UnderdogPlayer {
        rank,
        name: fields[1].clone(),
        position: fields[2].clone(),
        team: team_or_unknown(&fields[3]),
        adp: f64::from(rank),
        original_rank: line_index,
    })
}

fn adaptive_row(fields: &[String], columns: &Columns, line_index: u32) -> Option<UnderdogPlayer> {
    let cell = |idx: usize| fields.get(idx).map(String::as_str).unwrap_or("");

    let name = format!("{} {}", cell(columns.first_name), cell(columns.last_name))
        .trim()
        .to_string();
    if name.is_empty() {
        return None;
    }

    let raw_position = cell(columns.position).to_ascii_uppercase();
    if !ACCEPTED_POSITIONS.iter().any(|p| raw_position.contains(p)) {
        return None;
    }
    let position: String = raw_position
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect();

    let rank = parse_rank(cell(columns.rank)).unwrap_or(line_index);
    let adp = parse_adp(cell(columns.adp)).unwrap_or(f64::from(rank));

    Some(UnderdogPlayer {
        rank,
        name,
        position,
        team: team_or_unknown(cell(columns.team)),
        adp,
        original_rank: line_index,
    })
}

/// Parses an ADP cell. A value with a decimal point is read as `round.pick` and converted to an
/// overall pick in a 12-team draft; anything else is a plain number.
pub fn parse_adp(raw: &str) -> Option<f64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }

    if let Some((round, pick)) = t.split_once('.') {
        let round = round.trim().parse::<i64>().ok()?;
        let pick = pick.trim().parse::<i64>().ok()?;
        if round < 1 {
            return None;
        }
        return Some(((round - 1) * TEAMS_PER_ROUND + pick) as f64);
    }

    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_rank(raw: &str) -> Option<u32> {
    let v = raw.trim().parse::<f64>().ok()?;
    (v.is_finite() && v >= 1.0).then_some(v as u32)
}

fn team_or_unknown(raw: &str) -> String {
    let t = raw.trim();
    if t.is_empty() {
        UNKNOWN_TEAM.to_string()
    } else {
        t.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    rank: usize,
    first_name: usize,
    last_name: usize,
    adp: usize,
    position: usize,
    team: usize,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            rank: 0,
            first_name: 1,
            last_name: 2,
            adp: 3,
            position: 4,
            team: 5,
        }
    }
}

impl Columns {
    fn detect(header: &[String]) -> Self {
        let lowered: Vec<String> = header.iter().map(|h| h.to_ascii_lowercase()).collect();
        let defaults = Self::default();

        let detected_rank = find_column(&lowered, &["rank"]);
        let pick = |needles: &[&str], fallback: usize| {
            detect_or(&lowered, needles, detected_rank, fallback)
        };

        Self {
            rank: detected_rank.unwrap_or(defaults.rank),
            first_name: pick(&["firstname", "first"][..], defaults.first_name),
            last_name: pick(&["lastname", "last"][..], defaults.last_name),
            adp: pick(&["adp"][..], defaults.adp),
            position: pick(&["slotname", "slot", "position", "pos"][..], defaults.position),
            team: pick(&["teamname", "team"][..], defaults.team),
        }
    }
}

/// A column that lands on the detected rank column counts as not detected.
fn detect_or(header: &[String], needles: &[&str], rank: Option<usize>, fallback: usize) -> usize {
    find_column(header, needles)
        .filter(|idx| Some(*idx) != rank)
        .unwrap_or(fallback)
}

/// Exact header matches win over substring matches; needles are tried in order.
fn find_column(header: &[String], needles: &[&str]) -> Option<usize> {
    needles
        .iter()
        .find_map(|n| header.iter().position(|h| h == n))
        .or_else(|| {
            needles
                .iter()
                .find_map(|n| header.iter().position(|h| h.contains(n)))
        })
}

pub fn to_csv_table(players: &[UnderdogPlayer]) -> CsvTable {
    let mut table = CsvTable::new(CSV_HEADER);
    for p in players {
        table.push(vec![
            p.rank.to_string(),
            p.name.clone(),
            p.position.clone(),
            p.team.clone(),
            String::new(),
            p.adp.to_string(),
            String::new(),
        ]);
    }
    table
}
