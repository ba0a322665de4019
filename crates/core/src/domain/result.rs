use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Underdog,
    Ktc,
    Fantasycalc,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Underdog => "underdog",
            Source::Ktc => "ktc",
            Source::Fantasycalc => "fantasycalc",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Player records that carry a 1-based rank.
pub trait Ranked {
    fn rank(&self) -> u32;
    fn set_rank(&mut self, rank: u32);
}

/// Overwrites every rank with its 1-based position in `players`.
pub fn rerank<P: Ranked>(players: &mut [P]) {
    for (idx, p) in players.iter_mut().enumerate() {
        p.set_rank(idx as u32 + 1);
    }
}

/// One normalized snapshot of a source (and format, when the source has one).
///
/// Fields are read-only once built, so `total_players` always equals `players.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult<P> {
    last_updated: DateTime<Utc>,
    source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slate: Option<String>,
    total_players: usize,
    players: Vec<P>,
}

impl<P> NormalizedResult<P> {
    pub fn new(source: Source, players: Vec<P>) -> Self {
        Self::at(Utc::now(), source, players)
    }

    pub fn at(last_updated: DateTime<Utc>, source: Source, players: Vec<P>) -> Self {
        Self {
            last_updated,
            source,
            format: None,
            format_name: None,
            slate: None,
            total_players: players.len(),
            players,
        }
    }

    pub fn with_format(mut self, key: &str, name: &str) -> Self {
        self.format = Some(key.to_string());
        self.format_name = Some(name.to_string());
        self
    }

    pub fn with_slate(mut self, slate: Option<String>) -> Self {
        self.slate = slate;
        self
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn format_name(&self) -> Option<&str> {
        self.format_name.as_deref()
    }

    pub fn slate(&self) -> Option<&str> {
        self.slate.as_deref()
    }

    pub fn total_players(&self) -> usize {
        self.total_players
    }

    pub fn players(&self) -> &[P] {
        &self.players
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct P {
        rank: u32,
    }

    impl Ranked for P {
        fn rank(&self) -> u32 {
            self.rank
        }
        fn set_rank(&mut self, rank: u32) {
            self.rank = rank;
        }
    }

    #[test]
    fn total_players_tracks_players_len() {
        let r = NormalizedResult::new(Source::Ktc, vec![P { rank: 1 }, P { rank: 2 }])
            .with_format("dynasty-1qb", "Dynasty 1QB")
            .with_slate(Some("Best Ball".to_string()));
        assert_eq!(r.total_players(), 2);
        assert_eq!(r.total_players(), r.players().len());
        assert_eq!(r.source(), Source::Ktc);
        assert_eq!(r.format(), Some("dynasty-1qb"));
        assert_eq!(r.slate(), Some("Best Ball"));
    }

    #[test]
    fn rerank_makes_ranks_dense() {
        let mut players = vec![P { rank: 5 }, P { rank: 9 }, P { rank: 40 }];
        rerank(&mut players);
        let ranks: Vec<u32> = players.iter().map(|p| p.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn serializes_camel_case_and_omits_missing_format() {
        let at = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let r = NormalizedResult::at(at, Source::Underdog, vec![P { rank: 1 }]);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["source"], "underdog");
        assert_eq!(v["totalPlayers"], 1);
        assert_eq!(v["lastUpdated"], "2026-08-01T12:00:00Z");
        assert!(v.get("format").is_none());

        let r = r.with_format("dynasty-1qb", "Dynasty 1QB");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["format"], "dynasty-1qb");
        assert_eq!(v["formatName"], "Dynasty 1QB");
    }
}
