use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::DrawError;

mod card;
mod card_pool;
mod catalog;
mod gallery;

pub use card::{CardDefinition, DrawnCard};
pub use card_pool::{CardPool, DrawOutcome, PackOutcome, WeightedPoolEntry};
pub use catalog::Catalog;
pub use gallery::{GalleryPage, GalleryQuery, GallerySort, CARDS_PER_PAGE};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum Rarity {
    #[strum(to_string = "普通", serialize = "Common")]
    #[serde(rename = "普通", alias = "Common")]
    Common,
    #[strum(to_string = "稀有", serialize = "Rare")]
    #[serde(rename = "稀有", alias = "Rare")]
    Rare,
    #[strum(to_string = "史詩", serialize = "Epic")]
    #[serde(rename = "史詩", alias = "Epic")]
    Epic,
    #[strum(to_string = "傳說", serialize = "Legendary")]
    #[serde(rename = "傳說", alias = "Legendary")]
    Legendary,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum CardType {
    #[strum(to_string = "學生卡")]
    #[serde(rename = "學生卡")]
    Student,
    #[strum(to_string = "知識卡")]
    #[serde(rename = "知識卡")]
    Knowledge,
    #[strum(to_string = "武器卡")]
    #[serde(rename = "武器卡")]
    Weapon,
    #[strum(to_string = "事件卡")]
    #[serde(rename = "事件卡")]
    Event,
    #[strum(to_string = "英雄卡")]
    #[serde(rename = "英雄卡")]
    Hero,
}

impl CardType {
    /// Event and hero cards are shown in the gallery but never enter a draw pool.
    pub fn is_drawable(&self) -> bool {
        matches!(self, CardType::Student | CardType::Knowledge | CardType::Weapon)
    }
}

/// One value per rarity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityTable {
    pub common: u32,
    pub rare: u32,
    pub epic: u32,
    pub legendary: u32,
}

impl RarityTable {
    pub const fn new(common: u32, rare: u32, epic: u32, legendary: u32) -> Self {
        Self { common, rare, epic, legendary }
    }

    pub fn get(&self, rarity: Rarity) -> u32 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
        }
    }
}

/// What a pack draw does when the pool holds fewer copies than the pack size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackShortfall {
    /// Fill every slot, sampling with replacement.
    #[default]
    WithReplacement,
    /// Hand out only the distinct copies that exist.
    Truncate,
    /// Refuse the pack.
    Reject,
}

/// How picks inside one pack shrink the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackSampling {
    /// Each pick removes one copy. A pack can hand out a pair more often
    /// than its cap allows.
    #[default]
    Copies,
    /// Each pick removes the pair's whole allowance unit, so caps hold inside
    /// the pack and the shortfall check counts allowances instead of copies.
    Allowance,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DrawConfig {
    /// Maximum number of times a student may own each (card, rarity) pair.
    pub caps: RarityTable,
    /// Copies contributed to the pool per remaining allowance.
    pub weights: RarityTable,

    pub pack_size: usize,
    pub max_packs: usize,
    pub shortfall: PackShortfall,
    pub pack_sampling: PackSampling,

    pub default_pool: String,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self::weighted()
    }
}

impl DrawConfig {
    pub fn weighted() -> Self {
        Self {
            caps: RarityTable::new(2, 2, 2, 1),
            weights: RarityTable::new(75, 20, 4, 1),

            pack_size: 5,
            max_packs: 5,
            shortfall: PackShortfall::WithReplacement,
            pack_sampling: PackSampling::Copies,

            default_pool: "基礎包".to_string(),
        }
    }

    /// Cap-only pool: every remaining allowance counts once regardless of rarity.
    pub fn flat() -> Self {
        Self {
            weights: RarityTable::new(1, 1, 1, 1),
            ..Self::weighted()
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("[DrawConfig::load_json] cannot read {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("[DrawConfig::load_json] cannot parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DrawError> {
        if self.pack_size == 0 {
            return Err(DrawError::InvalidConfig("pack_size must be at least 1".into()));
        }
        if self.max_packs == 0 {
            return Err(DrawError::InvalidConfig("max_packs must be at least 1".into()));
        }
        if self.default_pool.trim().is_empty() {
            return Err(DrawError::InvalidConfig("default_pool must not be empty".into()));
        }
        Ok(())
    }
}
