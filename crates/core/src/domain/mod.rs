pub mod player;
pub mod result;

pub use player::{FantasyCalcPlayer, KtcCardPlayer, KtcPlayer, UnderdogPlayer};
pub use result::{rerank, NormalizedResult, Ranked, Source};
