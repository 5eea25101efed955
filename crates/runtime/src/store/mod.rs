use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::StoreError;
use crate::student::{DrawRecord, OpportunityKind, ProgressEntry, ProgressUpdate, StudentStatus};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{connect, prepare_schema, SqliteStore};

/// Result of reading a student's history. A student with no rows is a
/// normal state and is kept apart from a store that could not be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryLookup {
    NoHistory,
    Found(Vec<DrawRecord>),
}

impl HistoryLookup {
    pub fn from_records(records: Vec<DrawRecord>) -> Self {
        if records.is_empty() {
            Self::NoHistory
        } else {
            Self::Found(records)
        }
    }

    pub fn records(&self) -> &[DrawRecord] {
        match self {
            Self::NoHistory => &[],
            Self::Found(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<DrawRecord> {
        match self {
            Self::NoHistory => Vec::new(),
            Self::Found(records) => records,
        }
    }
}

#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load_history(&self, student_id: &str) -> Result<HistoryLookup, StoreError>;

    /// Rows already written for `request_id`, in draw order.
    async fn find_request(&self, request_id: Uuid) -> Result<Vec<DrawRecord>, StoreError>;

    /// Appends rows, skipping any whose `draw_id` already exists, and folds
    /// the new rows into the student status. Returns how many rows were new.
    async fn append(&self, records: &[DrawRecord]) -> Result<usize, StoreError>;

    async fn student_status(&self, student_id: &str) -> Result<Option<StudentStatus>, StoreError>;

    /// Every student with at least one row, sorted.
    async fn students(&self) -> Result<Vec<String>, StoreError>;

    async fn all_records(&self) -> Result<Vec<DrawRecord>, StoreError>;
}

#[async_trait::async_trait]
pub trait ProgressLedger: Send + Sync {
    async fn find_student(&self, student_id: &str) -> Result<Option<ProgressEntry>, StoreError>;

    /// Marks the opportunity drawn for `today` if it is still open.
    /// Returns false when another caller got there first or it was never open.
    async fn consume_opportunity(
        &self,
        student_id: &str,
        kind: OpportunityKind,
        today: NaiveDate,
    ) -> Result<bool, StoreError>;

    /// Puts back the last-draw date a failed draw overwrote.
    async fn restore_opportunity(
        &self,
        student_id: &str,
        kind: OpportunityKind,
        previous: Option<NaiveDate>,
    ) -> Result<(), StoreError>;

    /// Creates the student if needed and applies the given flags.
    async fn update_progress(
        &self,
        student_id: &str,
        update: &ProgressUpdate,
    ) -> Result<ProgressEntry, StoreError>;

    /// Overwrites the whole row.
    async fn save_entry(&self, entry: &ProgressEntry) -> Result<(), StoreError>;
}
