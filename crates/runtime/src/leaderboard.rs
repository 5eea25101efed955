use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cards::Rarity;
use crate::student::DrawRecord;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardRow {
    /// 1-based.
    pub rank: usize,
    pub student_id: String,
    pub total_draws: usize,
    pub unique_cards: usize,

    pub legendary: usize,
    pub epic: usize,
    pub rare: usize,
    pub common: usize,
}

impl LeaderboardRow {
    fn count(&mut self, rarity: Rarity) {
        self.total_draws += 1;
        match rarity {
            Rarity::Legendary => self.legendary += 1,
            Rarity::Epic => self.epic += 1,
            Rarity::Rare => self.rare += 1,
            Rarity::Common => self.common += 1,
        }
    }
}

/// Ranks students by legendary cards, then by total draws.
pub fn build_leaderboard(records: &[DrawRecord]) -> Vec<LeaderboardRow> {
    let mut rows: BTreeMap<&str, (LeaderboardRow, HashSet<&str>)> = BTreeMap::new();
    for record in records {
        let (row, names) = rows.entry(record.student_id.as_str()).or_insert_with(|| {
            let row = LeaderboardRow {
                student_id: record.student_id.clone(),
                ..Default::default()
            };
            (row, HashSet::new())
        });
        row.count(record.rarity);
        names.insert(record.card_name.as_str());
    }

    let mut board = rows
        .into_values()
        .map(|(mut row, names)| {
            row.unique_cards = names.len();
            row
        })
        .collect::<Vec<_>>();

    // BTreeMap order keeps ties stable by student id
    board.sort_by(|a, b| {
        b.legendary
            .cmp(&a.legendary)
            .then(b.total_draws.cmp(&a.total_draws))
    });
    for (index, row) in board.iter_mut().enumerate() {
        row.rank = index + 1;
    }
    board
}
