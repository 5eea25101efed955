use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::cards::{CardDefinition, CardType, Rarity};
use crate::error::CatalogError;

const NAME_COLUMNS: [&str; 2] = ["名稱", "卡名"];
const RARITY_COLUMN: &str = "稀有度";
const TYPE_COLUMN: &str = "類型";
const POOL_COLUMN: &str = "卡池分類";
const COST_COLUMN: &str = "KN";
const SUBJECT_COLUMN: &str = "科目";

/// Every card definition known to the game, loaded once and shared read-only.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    cards: Vec<CardDefinition>,
}

impl Catalog {
    /// Builds a catalog, dropping exact (name, rarity, pool) repeats so a
    /// duplicated row cannot double a card's weight.
    pub fn new(cards: Vec<CardDefinition>) -> Self {
        let mut seen = HashSet::new();
        let cards = cards
            .into_iter()
            .filter(|card| {
                let fresh = seen.insert((card.name.clone(), card.rarity, card.pool_tag.clone()));
                if !fresh {
                    tracing::warn!(
                        "[Catalog::new] duplicate card {} ({}) in pool {} ignored",
                        card.name, card.rarity, card.pool_tag
                    );
                }
                fresh
            })
            .collect();
        Self { cards }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_reader(file)?;
        tracing::info!("[Catalog::load] {} cards loaded from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim_start_matches('\u{feff}') == name)
        };

        let name_idx = NAME_COLUMNS
            .iter()
            .find_map(|&name| column(name))
            .ok_or(CatalogError::MissingColumn(NAME_COLUMNS[0]))?;
        let rarity_idx = column(RARITY_COLUMN).ok_or(CatalogError::MissingColumn(RARITY_COLUMN))?;
        let type_idx = column(TYPE_COLUMN).ok_or(CatalogError::MissingColumn(TYPE_COLUMN))?;
        let pool_idx = column(POOL_COLUMN).ok_or(CatalogError::MissingColumn(POOL_COLUMN))?;
        let cost_idx = column(COST_COLUMN).ok_or(CatalogError::MissingColumn(COST_COLUMN))?;
        let subject_idx = column(SUBJECT_COLUMN);

        let mut cards = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            // header occupies line 1
            let row = index + 2;
            let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

            let name = field(name_idx);
            if name.is_empty() {
                continue;
            }

            let rarity_raw = field(rarity_idx);
            if rarity_raw.is_empty() {
                tracing::warn!("[Catalog::from_reader] row {}: {} has no rarity, skipped", row, name);
                continue;
            }
            let rarity = Rarity::from_str(rarity_raw).map_err(|_| CatalogError::UnknownRarity {
                row,
                value: rarity_raw.to_string(),
            })?;

            let type_raw = field(type_idx);
            let card_type = CardType::from_str(type_raw).map_err(|_| CatalogError::UnknownCardType {
                row,
                value: type_raw.to_string(),
            })?;

            let cost_raw = field(cost_idx);
            let cost = parse_cost(cost_raw).ok_or_else(|| CatalogError::InvalidCost {
                row,
                value: cost_raw.to_string(),
            })?;

            let subject = subject_idx
                .map(field)
                .filter(|subject| !subject.is_empty())
                .map(str::to_string);

            cards.push(CardDefinition {
                name: name.to_string(),
                rarity,
                card_type,
                pool_tag: field(pool_idx).to_string(),
                cost,
                subject,
            });
        }

        Ok(Self::new(cards))
    }

    pub fn cards(&self) -> &[CardDefinition] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Distinct pool tags that hold at least one drawable card, sorted.
    pub fn pool_tags(&self) -> Vec<String> {
        self.cards
            .iter()
            .filter(|card| card.card_type.is_drawable() && !card.pool_tag.is_empty())
            .map(|card| card.pool_tag.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_pool(&self, pool_tag: &str) -> bool {
        self.cards.iter().any(|card| card.is_drawable_in(pool_tag))
    }

    pub fn drawable_in<'a>(&'a self, pool_tag: &'a str) -> impl Iterator<Item = &'a CardDefinition> + 'a {
        self.cards.iter().filter(move |card| card.is_drawable_in(pool_tag))
    }

    pub fn find(&self, name: &str) -> Option<&CardDefinition> {
        self.cards.iter().find(|card| card.name == name)
    }
}

/// KN cells may come through as `3` or `3.0`; blanks count as free.
fn parse_cost(raw: &str) -> Option<u32> {
    if raw.is_empty() {
        return Some(0);
    }
    let value: f64 = raw.parse().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}
