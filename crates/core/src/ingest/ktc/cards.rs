use super::{is_ktc_position, team_or_free_agent, KtcExtraction, KtcExtractor, KtcFormat, KtcPlayers};
use crate::config::MAX_KTC_PAGES;
use crate::domain::{KtcCardPlayer, Source};
use crate::error::ExtractionError;
use crate::ingest::fetch::SourceFetcher;
use crate::storage::RawPayload;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

const NO_RESULTS_MARKER: &str = "No players found";
const NEXT_PAGE_MARKER: &str = "pagination-next";

/// Walks the paginated listing and reads each rendered player card.
#[derive(Debug, Clone)]
pub struct CardScraper {
    page_delay: Duration,
    max_pages: u32,
}

impl CardScraper {
    pub fn new(page_delay: Duration, max_pages: u32) -> Self {
        Self {
            page_delay,
            max_pages: max_pages.clamp(1, MAX_KTC_PAGES),
        }
    }
}

impl Default for CardScraper {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), MAX_KTC_PAGES)
    }
}

#[async_trait::async_trait]
impl KtcExtractor for CardScraper {
    fn strategy_name(&self) -> &'static str {
        "cards"
    }

    async fn extract(
        &self,
        fetcher: &dyn SourceFetcher,
        format: &KtcFormat,
    ) -> Result<KtcExtraction> {
        let mut players: Vec<KtcCardPlayer> = Vec::new();
        let mut pages_read: u32 = 0;

        for page in 0..self.max_pages {
            if page != 0 {
                tokio::time::sleep(self.page_delay).await;
            }

            let url = format.page_url(page);
            let html = match fetcher.fetch_text(&url).await {
                Ok(html) => html,
                Err(err) => {
                    tracing::warn!(
                        format = format.key,
                        page,
                        error = %err,
                        "KTC page fetch failed; treating as last page"
                    );
                    break;
                }
            };
            pages_read += 1;

            if html.contains(NO_RESULTS_MARKER) {
                tracing::info!(format = format.key, page, "KTC listing reported no results");
                break;
            }

            // Pages of draft picks still count as pages with cards.
            let cards_on_page = count_cards(&html);
            let found = parse_cards(&html, players.len() as u32);
            tracing::info!(
                format = format.key,
                page,
                cards = cards_on_page,
                found = found.len(),
                total = players.len() + found.len(),
                "KTC page scraped"
            );
            players.extend(found);

            if cards_on_page == 0 || !html.contains(NEXT_PAGE_MARKER) {
                break;
            }
        }

        if players.is_empty() {
            return Err(ExtractionError::new(
                Source::Ktc,
                "cards",
                format!("no player cards found for {}", format.key),
            )
            .into());
        }

        let raw = serde_json::json!({
            "strategy": self.strategy_name(),
            "format": format.key,
            "pages": pages_read,
            "players": players,
        });
        let raw = serde_json::to_string_pretty(&raw).context("serialize KTC card snapshot failed")?;

        Ok(KtcExtraction {
            raw: RawPayload::json(raw),
            players: KtcPlayers::Cards(players),
        })
    }
}

fn card_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<div[^>]*class="[^"]*\bonePlayer\b[^"]*"[^>]*>"#)
            .expect("invalid card start regex")
    })
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"class="player-name"[^>]*>\s*<p[^>]*>\s*<a[^>]*>\s*([^<]+?)\s*</a>"#)
            .expect("invalid name regex")
    })
}

fn team_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"class="player-team"[^>]*>\s*([^<]*?)\s*<"#).expect("invalid team regex")
    })
}

fn position_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"class="position"[^>]*>\s*([A-Za-z]+)"#).expect("invalid position regex")
    })
}

fn value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"class="value"[^>]*>\s*<p[^>]*>\s*(\d[\d,.\s]*)</p>"#)
            .expect("invalid value regex")
    })
}

fn age_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*y\.o\.").expect("invalid age regex"))
}

/// Card blocks on a page, whether or not they hold a ranked position.
pub fn count_cards(html: &str) -> usize {
    card_start_re().find_iter(html).count()
}

/// Parses every player card on one page, numbering ranks from `rank_offset + 1`.
pub fn parse_cards(html: &str, rank_offset: u32) -> Vec<KtcCardPlayer> {
    let starts: Vec<usize> = card_start_re().find_iter(html).map(|m| m.start()).collect();

    let mut out = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(html.len());
        let Some(mut card) = parse_card(&html[start..end]) else {
            continue;
        };
        card.rank = rank_offset + out.len() as u32 + 1;
        out.push(card);
    }
    out
}

fn parse_card(fragment: &str) -> Option<KtcCardPlayer> {
    let capture = |re: &Regex| {
        re.captures(fragment)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    let name = capture(name_re()).filter(|n| !n.is_empty())?;
    let position = capture(position_re())?.to_ascii_uppercase();
    if !is_ktc_position(&position) {
        return None;
    }

    let value = capture(value_re()).and_then(|raw| parse_grouped_number(&raw)).unwrap_or(0.0);
    let age = capture(age_re()).and_then(|raw| raw.parse::<f64>().ok());

    Some(KtcCardPlayer {
        rank: 0,
        name,
        position,
        team: team_or_free_agent(capture(team_re()).as_deref()),
        value,
        age,
    })
}

/// `"9,999"` -> `9999.0`. Group separators are dropped.
fn parse_grouped_number(raw: &str) -> Option<f64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok()
}
