use std::collections::BTreeMap;
use std::io::Read;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use academy_common::DATE_FORMAT;
use academy_database::SqlxSchema;

/// What earned a student a draw for the day.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    #[strum(to_string = "作業", serialize = "homework")]
    #[serde(alias = "作業")]
    Homework,
    #[strum(to_string = "進度", serialize = "progress")]
    #[serde(alias = "進度")]
    Progress,
}

/// A student's row in the progress ledger.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEntry {
    pub student_id: String,
    pub name: String,

    pub homework_done: bool,
    pub homework_last_draw: Option<NaiveDate>,

    pub progress_done: bool,
    pub progress_last_draw: Option<NaiveDate>,
}

impl SqlxSchema for ProgressEntry {
    const TABLE_NAME: &'static str = "student_progress";

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS student_progress (
            student_id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            homework_done INTEGER NOT NULL DEFAULT 0,
            homework_last_draw TEXT,
            progress_done INTEGER NOT NULL DEFAULT 0,
            progress_last_draw TEXT
        )"
        .to_string()
    }
}

impl ProgressEntry {
    pub fn new(student_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { student_id: student_id.into(), name: name.into(), ..Default::default() }
    }

    pub fn completed(&self, kind: OpportunityKind) -> bool {
        match kind {
            OpportunityKind::Homework => self.homework_done,
            OpportunityKind::Progress => self.progress_done,
        }
    }

    pub fn last_draw(&self, kind: OpportunityKind) -> Option<NaiveDate> {
        match kind {
            OpportunityKind::Homework => self.homework_last_draw,
            OpportunityKind::Progress => self.progress_last_draw,
        }
    }

    pub fn set_last_draw(&mut self, kind: OpportunityKind, date: Option<NaiveDate>) {
        match kind {
            OpportunityKind::Homework => self.homework_last_draw = date,
            OpportunityKind::Progress => self.progress_last_draw = date,
        }
    }

    /// Completed, and not yet drawn for on `today`.
    pub fn is_available(&self, kind: OpportunityKind, today: NaiveDate) -> bool {
        self.completed(kind) && self.last_draw(kind) != Some(today)
    }

    pub fn apply(&mut self, update: &ProgressUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(done) = update.homework_done {
            self.homework_done = done;
        }
        if let Some(done) = update.progress_done {
            self.progress_done = done;
        }
    }
}

/// Admin edit of the completion flags; last-draw dates are only written by draws.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub name: Option<String>,
    pub homework_done: Option<bool>,
    pub progress_done: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Eligibility {
    pub student_id: String,
    pub registered: bool,
    pub opportunities: BTreeMap<OpportunityKind, bool>,
}

impl Eligibility {
    pub fn unregistered(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            registered: false,
            opportunities: OpportunityKind::iter().map(|kind| (kind, false)).collect(),
        }
    }

    pub fn from_entry(entry: &ProgressEntry, today: NaiveDate) -> Self {
        Self {
            student_id: entry.student_id.clone(),
            registered: true,
            opportunities: OpportunityKind::iter()
                .map(|kind| (kind, entry.is_available(kind, today)))
                .collect(),
        }
    }

    pub fn total_available(&self) -> usize {
        self.opportunities.values().filter(|available| **available).count()
    }
}

/// Row layout of the classroom progress sheet:
/// `學號,姓名,完成作業,作業最後抽卡日,完成進度,進度最後抽卡日`.
#[derive(Debug, Deserialize)]
struct ProgressSheetRow {
    #[serde(rename = "學號")]
    student_id: String,
    #[serde(rename = "姓名", default)]
    name: String,
    #[serde(rename = "完成作業", default)]
    homework_done: String,
    #[serde(rename = "作業最後抽卡日", default)]
    homework_last_draw: String,
    #[serde(rename = "完成進度", default)]
    progress_done: String,
    #[serde(rename = "進度最後抽卡日", default)]
    progress_last_draw: String,
}

fn sheet_flag(raw: &str) -> bool {
    matches!(raw.trim(), "是" | "true" | "TRUE" | "1")
}

fn sheet_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Reads an exported progress sheet. Rows without a student id are skipped.
pub fn read_progress_sheet<R: Read>(reader: R) -> Result<Vec<ProgressEntry>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for row in reader.deserialize::<ProgressSheetRow>() {
        let row = row?;
        let student_id = row.student_id.trim();
        if student_id.is_empty() {
            continue;
        }
        entries.push(ProgressEntry {
            student_id: student_id.to_string(),
            name: row.name,
            homework_done: sheet_flag(&row.homework_done),
            homework_last_draw: sheet_date(&row.homework_last_draw),
            progress_done: sheet_flag(&row.progress_done),
            progress_last_draw: sheet_date(&row.progress_last_draw),
        });
    }
    Ok(entries)
}
