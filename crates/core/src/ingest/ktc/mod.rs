//! KeepTradeCut rankings.
//!
//! Two extraction strategies produce the same normalized shape: [`embedded::EmbeddedArrayExtractor`]
//! pulls the `playersArray` literal out of a single page, [`cards::CardScraper`] walks the
//! paginated listing and reads rendered player cards.

pub mod cards;
pub mod embedded;

use crate::config::{KtcStrategyKind, Settings};
use crate::domain::{KtcCardPlayer, KtcPlayer};
use crate::ingest::fetch::SourceFetcher;
use crate::storage::{opt_cell, CsvTable, RawPayload};
use anyhow::Result;

pub const KTC_POSITIONS: [&str; 4] = ["QB", "RB", "WR", "TE"];
pub const UNKNOWN_TEAM: &str = "FA";

pub const EMBEDDED_CSV_HEADER: &[&str] = &[
    "Rank",
    "Player",
    "Position",
    "Team",
    "Value",
    "PositionRank",
    "Age",
    "Kept",
    "Traded",
    "Cut",
];
pub const CARDS_CSV_HEADER: &[&str] = &["Rank", "Player", "Position", "Team", "Value", "Age"];

/// Which value sub-object of a `playersArray` entry a format reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueField {
    OneQb,
    Superflex,
}

impl ValueField {
    pub fn key(&self) -> &'static str {
        match self {
            ValueField::OneQb => "oneQBValues",
            ValueField::Superflex => "superflexValues",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KtcFormat {
    pub key: &'static str,
    pub name: &'static str,
    /// Listing URL with a `{page}` placeholder.
    pub url_template: String,
    pub value_field: ValueField,
}

impl KtcFormat {
    pub fn registry() -> Vec<KtcFormat> {
        vec![
            KtcFormat {
                key: "dynasty-1qb",
                name: "Dynasty 1QB",
                url_template:
                    "https://keeptradecut.com/dynasty-rankings?page={page}&filters=QB|WR|RB|TE&format=1"
                        .to_string(),
                value_field: ValueField::OneQb,
            },
            KtcFormat {
                key: "dynasty-superflex",
                name: "Dynasty Superflex",
                url_template:
                    "https://keeptradecut.com/dynasty-rankings?page={page}&filters=QB|WR|RB|TE&format=2"
                        .to_string(),
                value_field: ValueField::Superflex,
            },
            KtcFormat {
                key: "redraft-1qb",
                name: "Redraft 1QB",
                url_template:
                    "https://keeptradecut.com/fantasy-rankings?page={page}&filters=QB|WR|RB|TE&format=1"
                        .to_string(),
                value_field: ValueField::OneQb,
            },
            KtcFormat {
                key: "redraft-superflex",
                name: "Redraft Superflex",
                url_template:
                    "https://keeptradecut.com/fantasy-rankings?page={page}&filters=QB|WR|RB|TE&format=2"
                        .to_string(),
                value_field: ValueField::Superflex,
            },
        ]
    }

    pub fn page_url(&self, page: u32) -> String {
        self.url_template.replace("{page}", &page.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KtcPlayers {
    Embedded(Vec<KtcPlayer>),
    Cards(Vec<KtcCardPlayer>),
}

impl KtcPlayers {
    pub fn len(&self) -> usize {
        match self {
            KtcPlayers::Embedded(p) => p.len(),
            KtcPlayers::Cards(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct KtcExtraction {
    pub raw: RawPayload,
    pub players: KtcPlayers,
}

/// A way of turning KTC markup into ranked players for one format.
#[async_trait::async_trait]
pub trait KtcExtractor: Send + Sync {
    fn strategy_name(&self) -> &'static str;

    async fn extract(
        &self,
        fetcher: &dyn SourceFetcher,
        format: &KtcFormat,
    ) -> Result<KtcExtraction>;
}

pub fn extractor_from_settings(settings: &Settings) -> Box<dyn KtcExtractor> {
    match settings.ktc_strategy {
        KtcStrategyKind::Embedded => Box::new(embedded::EmbeddedArrayExtractor),
        KtcStrategyKind::Cards => Box::new(cards::CardScraper::new(
            settings.ktc_page_delay,
            settings.ktc_max_pages,
        )),
    }
}

pub(crate) fn is_ktc_position(position: &str) -> bool {
    KTC_POSITIONS.contains(&position)
}

pub(crate) fn team_or_free_agent(team: Option<&str>) -> String {
    match team.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => UNKNOWN_TEAM.to_string(),
    }
}

pub fn embedded_csv_table(players: &[KtcPlayer]) -> CsvTable {
    let mut table = CsvTable::new(EMBEDDED_CSV_HEADER);
    for p in players {
        table.push(vec![
            p.rank.to_string(),
            p.name.clone(),
            p.position.clone(),
            p.team.clone(),
            p.value.to_string(),
            opt_cell(&p.position_rank),
            opt_cell(&p.age),
            opt_cell(&p.kept),
            opt_cell(&p.traded),
            opt_cell(&p.cut),
        ]);
    }
    table
}

pub fn cards_csv_table(players: &[KtcCardPlayer]) -> CsvTable {
    let mut table = CsvTable::new(CARDS_CSV_HEADER);
    for p in players {
        table.push(vec![
            p.rank.to_string(),
            p.name.clone(),
            p.position.clone(),
            p.team.clone(),
            p.value.to_string(),
            opt_cell(&p.age),
        ]);
    }
    table
}
