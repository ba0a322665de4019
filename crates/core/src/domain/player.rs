use crate::domain::result::Ranked;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderdogPlayer {
    pub rank: u32,
    pub name: String,
    pub position: String,
    pub team: String,
    pub adp: f64,
    /// 1-based line index in the source export.
    pub original_rank: u32,
}

/// A KTC player mapped from the embedded `playersArray`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KtcPlayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub position: String,
    pub team: String,
    pub value: f64,
    pub rank: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kept: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traded: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cut: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_tier: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_tier: Option<u32>,
}

/// A KTC player scraped from a rendered ranking card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KtcCardPlayer {
    pub rank: u32,
    pub name: String,
    pub position: String,
    pub team: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FantasyCalcPlayer {
    pub rank: u32,
    pub name: String,
    pub position: String,
    pub team: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleeper_id: Option<String>,
    #[serde(rename = "trend30Day")]
    pub trend_30_day: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redraft_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<u32>,
    pub is_starter: bool,
}

macro_rules! impl_ranked {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Ranked for $ty {
                fn rank(&self) -> u32 {
                    self.rank
                }

                fn set_rank(&mut self, rank: u32) {
                    self.rank = rank;
                }
            }
        )*
    };
}

impl_ranked!(UnderdogPlayer, KtcPlayer, KtcCardPlayer, FantasyCalcPlayer);
