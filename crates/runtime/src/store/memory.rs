use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{HistoryLookup, HistoryStore, ProgressLedger};
use crate::student::{DrawRecord, OpportunityKind, ProgressEntry, ProgressUpdate, StudentStatus};

#[derive(Default)]
struct MemoryState {
    records: Vec<DrawRecord>,
    draw_ids: HashSet<Uuid>,
    status: HashMap<String, StudentStatus>,
    progress: HashMap<String, ProgressEntry>,
}

/// Process-local store for tests and `DATABASE_URL=memory` runs.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_students(entries: impl IntoIterator<Item = ProgressEntry>) -> Self {
        let progress = entries
            .into_iter()
            .map(|entry| (entry.student_id.clone(), entry))
            .collect();
        Self {
            state: RwLock::new(MemoryState { progress, ..Default::default() }),
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryStore {
    async fn load_history(&self, student_id: &str) -> Result<HistoryLookup, StoreError> {
        let state = self.state.read().await;
        let records = state
            .records
            .iter()
            .filter(|record| record.student_id == student_id)
            .cloned()
            .collect();
        Ok(HistoryLookup::from_records(records))
    }

    async fn find_request(&self, request_id: Uuid) -> Result<Vec<DrawRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|record| record.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn append(&self, records: &[DrawRecord]) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let mut inserted = 0;
        for record in records {
            if !state.draw_ids.insert(record.draw_id) {
                continue;
            }
            state
                .status
                .entry(record.student_id.clone())
                .or_insert_with(|| StudentStatus::new(record.student_id.clone()))
                .apply(record.rarity);
            state.records.push(record.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn student_status(&self, student_id: &str) -> Result<Option<StudentStatus>, StoreError> {
        Ok(self.state.read().await.status.get(student_id).cloned())
    }

    async fn students(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .map(|record| record.student_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    async fn all_records(&self) -> Result<Vec<DrawRecord>, StoreError> {
        Ok(self.state.read().await.records.clone())
    }
}

#[async_trait::async_trait]
impl ProgressLedger for MemoryStore {
    async fn find_student(&self, student_id: &str) -> Result<Option<ProgressEntry>, StoreError> {
        Ok(self.state.read().await.progress.get(student_id).cloned())
    }

    async fn consume_opportunity(
        &self,
        student_id: &str,
        kind: OpportunityKind,
        today: NaiveDate,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.progress.get_mut(student_id) {
            Some(entry) if entry.is_available(kind, today) => {
                entry.set_last_draw(kind, Some(today));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_opportunity(
        &self,
        student_id: &str,
        kind: OpportunityKind,
        previous: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(entry) = state.progress.get_mut(student_id) {
            entry.set_last_draw(kind, previous);
        }
        Ok(())
    }

    async fn update_progress(
        &self,
        student_id: &str,
        update: &ProgressUpdate,
    ) -> Result<ProgressEntry, StoreError> {
        let mut state = self.state.write().await;
        let entry = state
            .progress
            .entry(student_id.to_string())
            .or_insert_with(|| ProgressEntry::new(student_id, ""));
        entry.apply(update);
        Ok(entry.clone())
    }

    async fn save_entry(&self, entry: &ProgressEntry) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .progress
            .insert(entry.student_id.clone(), entry.clone());
        Ok(())
    }
}
