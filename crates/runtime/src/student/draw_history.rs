use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use academy_database::SqlxSchema;

use crate::cards::{DrawnCard, Rarity};
use crate::student::OpportunityKind;

/// One drawn card, as stored. Rows are append-only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawRecord {
    pub draw_id: Uuid,
    pub request_id: Uuid,

    pub student_id: String,
    pub card_name: String,
    pub rarity: Rarity,

    pub drawn_at: NaiveDateTime,

    /// Opportunity the draw was paid with; `None` for free draws.
    #[serde(default)]
    pub opportunity: Option<OpportunityKind>,
    /// Set on every card of a pack that was refilled with replacement.
    #[serde(default)]
    pub with_replacement: bool,
}

impl SqlxSchema for DrawRecord {
    const TABLE_NAME: &'static str = "draw_records";
    const INDEXES_SQL: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_draw_records_student ON draw_records (student_id)",
        "CREATE INDEX IF NOT EXISTS idx_draw_records_request ON draw_records (request_id)",
    ];

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS draw_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            draw_id TEXT NOT NULL UNIQUE,
            request_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            card_name TEXT NOT NULL,
            rarity TEXT NOT NULL,
            draw_time TEXT NOT NULL,
            opportunity TEXT,
            with_replacement INTEGER NOT NULL DEFAULT 0
        )"
        .to_string()
    }
}

impl DrawRecord {
    /// Stamps a draw result with ids. The `draw_id` of each card is derived
    /// from the request id and the card's position, so writing the same
    /// request twice yields the same ids.
    pub fn from_draws(
        student_id: &str,
        request_id: Uuid,
        cards: &[DrawnCard],
        drawn_at: NaiveDateTime,
    ) -> Vec<Self> {
        cards
            .iter()
            .enumerate()
            .map(|(position, card)| Self {
                draw_id: Uuid::new_v5(&request_id, position.to_string().as_bytes()),
                request_id,
                student_id: student_id.to_string(),
                card_name: card.card_name.clone(),
                rarity: card.rarity,
                drawn_at,
                opportunity: None,
                with_replacement: false,
            })
            .collect()
    }

    /// Marks how the draw was made so a replay can report it again.
    pub fn with_source(
        mut records: Vec<Self>,
        opportunity: Option<OpportunityKind>,
        with_replacement: bool,
    ) -> Vec<Self> {
        for record in &mut records {
            record.opportunity = opportunity;
            record.with_replacement = with_replacement;
        }
        records
    }

    pub fn card(&self) -> DrawnCard {
        DrawnCard::new(self.card_name.clone(), self.rarity)
    }
}

/// Running totals kept next to the history, updated on every append.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentStatus {
    pub student_id: String,
    pub total_draws: u64,
    /// Draws since the last legendary.
    pub no_legendary_count: u64,
}

impl SqlxSchema for StudentStatus {
    const TABLE_NAME: &'static str = "student_status";

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS student_status (
            student_id TEXT PRIMARY KEY,
            total_draws INTEGER NOT NULL DEFAULT 0,
            no_legendary_count INTEGER NOT NULL DEFAULT 0
        )"
        .to_string()
    }
}

impl StudentStatus {
    pub fn new(student_id: impl Into<String>) -> Self {
        Self { student_id: student_id.into(), ..Default::default() }
    }

    pub fn apply(&mut self, rarity: Rarity) {
        self.total_draws += 1;
        if rarity == Rarity::Legendary {
            self.no_legendary_count = 0;
        } else {
            self.no_legendary_count += 1;
        }
    }
}

/// How many times a student holds each (card, rarity) pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StudentDrawState {
    counts: HashMap<String, HashMap<Rarity, u32>>,
}

impl StudentDrawState {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a DrawRecord>) -> Self {
        let mut state = Self::default();
        for record in records {
            state.add(&record.card_name, record.rarity);
        }
        state
    }

    pub fn record(&mut self, card: &DrawnCard) {
        self.add(&card.card_name, card.rarity);
    }

    fn add(&mut self, card_name: &str, rarity: Rarity) {
        *self
            .counts
            .entry(card_name.to_string())
            .or_default()
            .entry(rarity)
            .or_default() += 1;
    }

    pub fn count(&self, card_name: &str, rarity: Rarity) -> u32 {
        self.counts
            .get(card_name)
            .and_then(|by_rarity| by_rarity.get(&rarity))
            .copied()
            .unwrap_or_default()
    }

    pub fn total(&self) -> u32 {
        self.counts.values().flat_map(HashMap::values).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// A (card, rarity) pair with how many times it was drawn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardCount {
    pub card_name: String,
    pub rarity: Rarity,
    pub count: u32,
}

/// Groups records by (card, rarity), most drawn first.
pub fn summarize(records: &[DrawRecord]) -> Vec<CardCount> {
    let mut counts: HashMap<(&str, Rarity), u32> = HashMap::new();
    for record in records {
        *counts.entry((record.card_name.as_str(), record.rarity)).or_default() += 1;
    }

    let mut summary = counts
        .into_iter()
        .map(|((card_name, rarity), count)| CardCount {
            card_name: card_name.to_string(),
            rarity,
            count,
        })
        .collect::<Vec<_>>();
    summary.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(b.rarity.cmp(&a.rarity))
            .then_with(|| a.card_name.cmp(&b.card_name))
    });
    summary
}
