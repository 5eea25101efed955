use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cards::{CardDefinition, DrawConfig, DrawnCard, PackSampling, PackShortfall, Rarity};
use crate::student::StudentDrawState;

/// One eligible (card, rarity) pair and the number of copies it contributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedPoolEntry {
    pub card_name: String,
    pub rarity: Rarity,
    pub remaining_allowance: u32,
    pub rarity_weight: u32,
}

impl WeightedPoolEntry {
    pub fn copies(&self) -> usize {
        self.remaining_allowance as usize * self.rarity_weight as usize
    }

    pub fn card(&self) -> DrawnCard {
        DrawnCard::new(self.card_name.clone(), self.rarity)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn(DrawnCard),
    /// Every pair in the pool has hit its cap.
    Exhausted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PackOutcome {
    Drawn {
        cards: Vec<DrawnCard>,
        with_replacement: bool,
    },
    Insufficient {
        available: usize,
        requested: usize,
    },
    Exhausted,
}

/// The bounded multiset a student draws from.
///
/// Copies are not materialized: each entry stands for
/// `remaining_allowance * rarity_weight` identical copies and is sampled
/// through a [`WeightedIndex`] over those counts.
#[derive(Clone, Debug, Default)]
pub struct CardPool {
    entries: Vec<WeightedPoolEntry>,
    total: usize,
}

impl CardPool {
    pub fn build<'a>(
        cards: impl IntoIterator<Item = &'a CardDefinition>,
        state: &StudentDrawState,
        config: &DrawConfig,
    ) -> Self {
        let entries = cards
            .into_iter()
            .filter_map(|card| {
                let cap = config.caps.get(card.rarity);
                let remaining_allowance = cap.saturating_sub(state.count(&card.name, card.rarity));
                let rarity_weight = config.weights.get(card.rarity);
                if remaining_allowance == 0 || rarity_weight == 0 {
                    return None;
                }
                Some(WeightedPoolEntry {
                    card_name: card.name.clone(),
                    rarity: card.rarity,
                    remaining_allowance,
                    rarity_weight,
                })
            })
            .collect::<Vec<_>>();

        let total = entries.iter().map(WeightedPoolEntry::copies).sum();
        Self { entries, total }
    }

    /// Total number of copies.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn entries(&self) -> &[WeightedPoolEntry] {
        &self.entries
    }

    /// Every copy in the pool, entry by entry.
    pub fn iter(&self) -> impl Iterator<Item = &WeightedPoolEntry> + '_ {
        self.entries
            .iter()
            .flat_map(|entry| std::iter::repeat(entry).take(entry.copies()))
    }

    pub fn copies_of(&self, card_name: &str, rarity: Rarity) -> usize {
        self.entry(card_name, rarity).map_or(0, WeightedPoolEntry::copies)
    }

    pub fn remaining_allowance(&self, card_name: &str, rarity: Rarity) -> u32 {
        self.entry(card_name, rarity).map_or(0, |entry| entry.remaining_allowance)
    }

    /// Number of draws the pool can serve before every pair is capped.
    pub fn capacity(&self) -> usize {
        self.entries.iter().map(|entry| entry.remaining_allowance as usize).sum()
    }

    /// Distinct picks a pack can make under `sampling`.
    pub fn pack_room(&self, sampling: PackSampling) -> usize {
        match sampling {
            PackSampling::Copies => self.len(),
            PackSampling::Allowance => self.capacity(),
        }
    }

    pub fn execute_single_draw<R: Rng + ?Sized>(&self, rng: &mut R) -> DrawOutcome {
        match self.weighted_index() {
            Some(index) => DrawOutcome::Drawn(self.entries[index.sample(rng)].card()),
            None => DrawOutcome::Exhausted,
        }
    }

    /// Draws `size` cards without replacement when the pool has room for
    /// them. Otherwise the shortfall policy decides.
    pub fn draw_pack<R: Rng + ?Sized>(
        &self,
        size: usize,
        shortfall: PackShortfall,
        sampling: PackSampling,
        rng: &mut R,
    ) -> PackOutcome {
        if self.is_empty() {
            return PackOutcome::Exhausted;
        }

        let room = self.pack_room(sampling);
        if room >= size {
            return PackOutcome::Drawn {
                cards: self.draw_without_replacement(size, sampling, rng),
                with_replacement: false,
            };
        }

        match shortfall {
            PackShortfall::WithReplacement => {
                let cards = (0..size)
                    .filter_map(|_| match self.execute_single_draw(rng) {
                        DrawOutcome::Drawn(card) => Some(card),
                        DrawOutcome::Exhausted => None,
                    })
                    .collect();
                PackOutcome::Drawn { cards, with_replacement: true }
            }
            PackShortfall::Truncate => PackOutcome::Drawn {
                cards: self.draw_without_replacement(room, sampling, rng),
                with_replacement: false,
            },
            PackShortfall::Reject => PackOutcome::Insufficient {
                available: room,
                requested: size,
            },
        }
    }

    fn draw_without_replacement<R: Rng + ?Sized>(
        &self,
        count: usize,
        sampling: PackSampling,
        rng: &mut R,
    ) -> Vec<DrawnCard> {
        let Some(mut index) = self.weighted_index() else {
            return Vec::new();
        };
        let mut copies = self.entries.iter().map(WeightedPoolEntry::copies).collect::<Vec<_>>();
        let mut cards = Vec::with_capacity(count);

        while cards.len() < count {
            let slot = index.sample(rng);
            let entry = &self.entries[slot];
            cards.push(entry.card());
            if cards.len() == count {
                break;
            }

            let spent = match sampling {
                PackSampling::Copies => 1,
                PackSampling::Allowance => entry.rarity_weight as usize,
            };
            copies[slot] = copies[slot].saturating_sub(spent);
            // fails only once every weight is zero
            if index.update_weights(&[(slot, &copies[slot])]).is_err() {
                break;
            }
        }
        cards
    }

    fn weighted_index(&self) -> Option<WeightedIndex<usize>> {
        if self.is_empty() {
            return None;
        }
        WeightedIndex::new(self.entries.iter().map(WeightedPoolEntry::copies)).ok()
    }

    fn entry(&self, card_name: &str, rarity: Rarity) -> Option<&WeightedPoolEntry> {
        self.entries
            .iter()
            .find(|entry| entry.card_name == card_name && entry.rarity == rarity)
    }
}
