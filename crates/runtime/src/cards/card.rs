use serde::{Deserialize, Serialize};

use crate::cards::{CardType, Rarity};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDefinition {
    pub name: String,
    pub rarity: Rarity,
    pub card_type: CardType,
    pub pool_tag: String,

    /// KN cost to play the card.
    pub cost: u32,
    pub subject: Option<String>,
}

impl CardDefinition {
    pub fn is_drawable_in(&self, pool_tag: &str) -> bool {
        self.card_type.is_drawable() && self.pool_tag == pool_tag
    }
}

/// A (card, rarity) pair handed out by the sampler.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawnCard {
    pub card_name: String,
    pub rarity: Rarity,
}

impl DrawnCard {
    pub fn new(card_name: impl Into<String>, rarity: Rarity) -> Self {
        Self { card_name: card_name.into(), rarity }
    }
}
