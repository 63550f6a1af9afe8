use serde::Serialize;
use store::Tip;

use crate::feed::Ranked;
use crate::vote::Reaction;

/// A feed entry: the tip, the score it was ranked by and the viewer's reaction.
#[derive(Debug, Clone, Serialize)]
pub struct TipView {
    #[serde(flatten)]
    pub tip: Tip,
    pub score: f64,
    pub my_reaction: Reaction,
}

impl TipView {
    pub fn new(ranked: Ranked, my_reaction: Reaction) -> Self {
        Self {
            tip: ranked.tip,
            score: ranked.score,
            my_reaction,
        }
    }
}
