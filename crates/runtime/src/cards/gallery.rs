use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::cards::{CardDefinition, CardType, Catalog, Rarity};

pub const CARDS_PER_PAGE: usize = 9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GallerySort {
    /// Rarity, then name.
    #[default]
    Default,
    KnAsc,
    KnDesc,
    SubjectAsc,
    SubjectDesc,
}

/// Filters for browsing the catalog. Unset fields do not filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryQuery {
    pub name: Option<String>,
    pub rarity: Option<Rarity>,
    pub types: Option<Vec<CardType>>,
    pub pool: Option<String>,
    pub min_kn: Option<u32>,
    pub max_kn: Option<u32>,
    pub subjects: Option<Vec<String>>,
    pub sort: GallerySort,
    pub page: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryPage {
    pub cards: Vec<CardDefinition>,
    pub page: usize,
    pub total_pages: usize,
    pub total_cards: usize,
}

impl GalleryQuery {
    pub fn matches(&self, card: &CardDefinition) -> bool {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if !card.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if self.rarity.is_some_and(|rarity| rarity != card.rarity) {
            return false;
        }
        if let Some(types) = self.types.as_ref().filter(|types| !types.is_empty()) {
            if !types.contains(&card.card_type) {
                return false;
            }
        }
        if let Some(pool) = self.pool.as_deref().filter(|p| !p.is_empty()) {
            if card.pool_tag != pool {
                return false;
            }
        }
        if self.min_kn.is_some_and(|min| card.cost < min) || self.max_kn.is_some_and(|max| card.cost > max) {
            return false;
        }
        if let Some(subjects) = self.subjects.as_ref().filter(|subjects| !subjects.is_empty()) {
            match &card.subject {
                Some(subject) if subjects.contains(subject) => {}
                _ => return false,
            }
        }
        true
    }

    pub fn run(&self, catalog: &Catalog) -> GalleryPage {
        let mut cards = catalog
            .cards()
            .iter()
            .filter(|card| self.matches(card))
            .cloned()
            .collect::<Vec<_>>();

        match self.sort {
            GallerySort::Default => cards.sort_by(|a, b| (a.rarity, &a.name).cmp(&(b.rarity, &b.name))),
            GallerySort::KnAsc => cards.sort_by_key(|card| card.cost),
            GallerySort::KnDesc => cards.sort_by(|a, b| b.cost.cmp(&a.cost)),
            // cards without a subject sink to the end either way
            GallerySort::SubjectAsc => cards.sort_by(|a, b| match (&a.subject, &b.subject) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }),
            GallerySort::SubjectDesc => cards.sort_by(|a, b| match (&a.subject, &b.subject) {
                (Some(x), Some(y)) => y.cmp(x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }),
        }

        let total_cards = cards.len();
        let total_pages = total_cards.div_ceil(CARDS_PER_PAGE).max(1);
        let page = self.page.clamp(1, total_pages);
        let cards = cards
            .into_iter()
            .skip((page - 1) * CARDS_PER_PAGE)
            .take(CARDS_PER_PAGE)
            .collect();

        GalleryPage { cards, page, total_pages, total_cards }
    }
}
