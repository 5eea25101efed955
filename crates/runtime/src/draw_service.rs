use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cards::{CardDefinition, CardPool, Catalog, DrawConfig, DrawOutcome, DrawnCard, PackOutcome};
use crate::error::{DrawError, ExportError};
use crate::leaderboard::{build_leaderboard, LeaderboardRow};
use crate::recorder::LocalExporter;
use crate::store::{HistoryStore, ProgressLedger};
use crate::student::{
    summarize, CardCount, DrawRecord, Eligibility, OpportunityKind, ProgressEntry,
    ProgressUpdate, StudentDrawState, StudentStatus,
};

/// A draw paid for with one of the day's opportunities.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpportunityDrawRequest {
    pub student_id: String,
    pub kind: OpportunityKind,
    #[serde(default)]
    pub pool_tag: Option<String>,
    /// Client-chosen id; resending it replays the stored result.
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DrawMode {
    Single,
    Packs { packs: usize },
}

/// A simulator draw. Skips the opportunity gate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FreeDrawRequest {
    pub student_id: String,
    #[serde(flatten)]
    pub mode: DrawMode,
    #[serde(default)]
    pub pool_tag: Option<String>,
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawReceipt {
    pub request_id: Uuid,
    pub student_id: String,
    pub records: Vec<DrawRecord>,

    /// Set when a short pool filled the pack with replacement.
    pub with_replacement: bool,
    pub opportunity: Option<OpportunityKind>,

    pub snapshot: Option<String>,
    pub snapshot_error: Option<String>,
}

impl DrawReceipt {
    pub fn cards(&self) -> Vec<DrawnCard> {
        self.records.iter().map(DrawRecord::card).collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrawResult {
    Committed(DrawReceipt),
    /// The request id was seen before; nothing was drawn this time.
    Replayed(DrawReceipt),
    /// Every card in the pool is at its cap.
    FullyCollected { student_id: String, pool_tag: String },
    Insufficient { available: usize, requested: usize },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentHistory {
    pub student_id: String,
    pub records: Vec<DrawRecord>,
    pub summary: Vec<CardCount>,
    pub status: Option<StudentStatus>,
}

pub struct DrawService {
    catalog: Arc<Catalog>,
    config: DrawConfig,

    history: Arc<dyn HistoryStore>,
    ledger: Arc<dyn ProgressLedger>,
    exporter: Option<LocalExporter>,

    student_locks: StudentLocks,
    rng: Mutex<StdRng>,
}

impl DrawService {
    pub fn new(
        catalog: Arc<Catalog>,
        config: DrawConfig,
        history: Arc<dyn HistoryStore>,
        ledger: Arc<dyn ProgressLedger>,
    ) -> Result<Self, DrawError> {
        config.validate()?;
        if !catalog.has_pool(&config.default_pool) {
            tracing::warn!(
                "[DrawService::new] default pool {} has no drawable cards",
                config.default_pool
            );
        }

        Ok(Self {
            catalog,
            config,
            history,
            ledger,
            exporter: None,
            student_locks: Mutex::new(HashMap::new()),
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    pub fn with_exporter(mut self, exporter: LocalExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_rng_seed(self, seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)), ..self }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    pub fn exporter(&self) -> Option<&LocalExporter> {
        self.exporter.as_ref()
    }

    pub fn pools(&self) -> Vec<String> {
        self.catalog.pool_tags()
    }

    pub async fn eligibility(&self, student_id: &str, today: NaiveDate) -> Result<Eligibility, DrawError> {
        Ok(match self.ledger.find_student(student_id).await? {
            Some(entry) => Eligibility::from_entry(&entry, today),
            None => Eligibility::unregistered(student_id),
        })
    }

    pub async fn update_progress(
        &self,
        student_id: &str,
        update: &ProgressUpdate,
    ) -> Result<ProgressEntry, DrawError> {
        let student_id = checked_student_id(student_id)?;
        Ok(self.ledger.update_progress(student_id, update).await?)
    }

    /// Spends one opportunity of `request.kind` on a single card.
    ///
    /// The opportunity is consumed before the history append and restored if
    /// the append fails. A fully collected pool leaves it unspent.
    pub async fn draw_for_opportunity(
        &self,
        request: &OpportunityDrawRequest,
        now: NaiveDateTime,
    ) -> Result<DrawResult, DrawError> {
        let student_id = checked_student_id(&request.student_id)?;
        let pool_tag = self.resolve_pool(request.pool_tag.as_deref())?;
        let request_id = request.request_id.unwrap_or_else(Uuid::new_v4);
        let kind = request.kind;

        let lease = self.lock_student(student_id);
        let _guard = lease.lock.lock().await;

        if let Some(receipt) = self.replay(student_id, request_id).await? {
            return Ok(DrawResult::Replayed(receipt));
        }

        let entry = self
            .ledger
            .find_student(student_id)
            .await?
            .ok_or_else(|| DrawError::NotRegistered(student_id.to_string()))?;
        let today = now.date();
        if !entry.is_available(kind, today) {
            return Err(DrawError::OpportunityUnavailable { student_id: student_id.to_string(), kind });
        }

        let state = self.load_state(student_id).await?;
        let pool = CardPool::build(self.catalog.drawable_in(&pool_tag), &state, &self.config);
        let card = match self.with_rng(|rng| pool.execute_single_draw(rng)) {
            DrawOutcome::Drawn(card) => card,
            DrawOutcome::Exhausted => {
                tracing::info!("[DrawService::draw_for_opportunity] {} has collected all of {}", student_id, pool_tag);
                return Ok(DrawResult::FullyCollected { student_id: student_id.to_string(), pool_tag });
            }
        };

        if !self.ledger.consume_opportunity(student_id, kind, today).await? {
            return Err(DrawError::OpportunityUnavailable { student_id: student_id.to_string(), kind });
        }

        let records = DrawRecord::with_source(
            DrawRecord::from_draws(student_id, request_id, &[card], now),
            Some(kind),
            false,
        );
        if let Err(e) = self.history.append(&records).await {
            tracing::warn!(
                "[DrawService::draw_for_opportunity] append failed for {}, restoring {} opportunity: {:?}",
                student_id, kind, e
            );
            if let Err(restore_err) = self
                .ledger
                .restore_opportunity(student_id, kind, entry.last_draw(kind))
                .await
            {
                tracing::error!(
                    "[DrawService::draw_for_opportunity] could not restore opportunity for {}: {:?}",
                    student_id, restore_err
                );
            }
            return Err(e.into());
        }

        let receipt = self.finish(request_id, student_id, records, false, Some(kind)).await;
        Ok(DrawResult::Committed(receipt))
    }

    /// Single draw or a session of packs, without an opportunity.
    /// Packs in one session see each other's cards, so caps hold across them.
    pub async fn draw_free(
        &self,
        request: &FreeDrawRequest,
        now: NaiveDateTime,
    ) -> Result<DrawResult, DrawError> {
        let student_id = checked_student_id(&request.student_id)?;
        let pool_tag = self.resolve_pool(request.pool_tag.as_deref())?;
        if let DrawMode::Packs { packs } = request.mode {
            if packs == 0 || packs > self.config.max_packs {
                return Err(DrawError::InvalidRequest(format!(
                    "packs must be between 1 and {}, got {}",
                    self.config.max_packs, packs
                )));
            }
        }
        let request_id = request.request_id.unwrap_or_else(Uuid::new_v4);

        let lease = self.lock_student(student_id);
        let _guard = lease.lock.lock().await;

        if let Some(receipt) = self.replay(student_id, request_id).await? {
            return Ok(DrawResult::Replayed(receipt));
        }

        let mut state = self.load_state(student_id).await?;
        let definitions = self.catalog.drawable_in(&pool_tag).collect::<Vec<&CardDefinition>>();

        let mut cards = Vec::new();
        let mut with_replacement = false;
        match request.mode {
            DrawMode::Single => {
                let pool = CardPool::build(definitions.iter().copied(), &state, &self.config);
                if let DrawOutcome::Drawn(card) = self.with_rng(|rng| pool.execute_single_draw(rng)) {
                    cards.push(card);
                }
            }
            DrawMode::Packs { packs } => {
                for _ in 0..packs {
                    let pool = CardPool::build(definitions.iter().copied(), &state, &self.config);
                    let outcome = self.with_rng(|rng| {
                        pool.draw_pack(
                            self.config.pack_size,
                            self.config.shortfall,
                            self.config.pack_sampling,
                            rng,
                        )
                    });
                    match outcome {
                        PackOutcome::Drawn { cards: pack, with_replacement: refilled } => {
                            pack.iter().for_each(|card| state.record(card));
                            with_replacement |= refilled;
                            cards.extend(pack);
                        }
                        PackOutcome::Insufficient { available, requested } => {
                            return Ok(DrawResult::Insufficient { available, requested });
                        }
                        // earlier packs of the session still count
                        PackOutcome::Exhausted => break,
                    }
                }
            }
        }

        if cards.is_empty() {
            return Ok(DrawResult::FullyCollected { student_id: student_id.to_string(), pool_tag });
        }

        let records = DrawRecord::with_source(
            DrawRecord::from_draws(student_id, request_id, &cards, now),
            None,
            with_replacement,
        );
        self.history.append(&records).await?;

        let receipt = self.finish(request_id, student_id, records, with_replacement, None).await;
        Ok(DrawResult::Committed(receipt))
    }

    pub async fn student_history(&self, student_id: &str) -> Result<StudentHistory, DrawError> {
        let records = self.history.load_history(student_id).await?.into_records();
        let status = self.history.student_status(student_id).await?;
        Ok(StudentHistory {
            student_id: student_id.to_string(),
            summary: summarize(&records),
            records,
            status,
        })
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardRow>, DrawError> {
        let records = self.history.all_records().await?;
        Ok(build_leaderboard(&records))
    }

    /// Merges every student's session files. Without an export directory
    /// there is nothing to merge.
    pub async fn merge_exports(&self) -> Result<Vec<PathBuf>, DrawError> {
        let Some(exporter) = self.exporter.clone() else {
            return Ok(Vec::new());
        };
        let merged = tokio::task::spawn_blocking(move || exporter.merge_all())
            .await
            .map_err(|e| ExportError::Join(e.to_string()))??;
        Ok(merged)
    }

    /// Rewrites a student's merged export from the history store.
    pub async fn rebuild_snapshot(&self, student_id: &str) -> Result<Option<PathBuf>, DrawError> {
        let student_id = checked_student_id(student_id)?;
        let Some(exporter) = self.exporter.clone() else {
            return Ok(None);
        };
        let records = self.history.load_history(student_id).await?.into_records();
        let student_id = student_id.to_string();
        let path = tokio::task::spawn_blocking(move || exporter.rebuild_from_history(&student_id, &records))
            .await
            .map_err(|e| ExportError::Join(e.to_string()))??;
        Ok(Some(path))
    }

    /// Rewrites the merged export of every student that has history.
    pub async fn rebuild_all_snapshots(&self) -> Result<Vec<PathBuf>, DrawError> {
        let Some(exporter) = self.exporter.clone() else {
            return Ok(Vec::new());
        };
        let students = self.history.students().await?;
        let records = self.history.all_records().await?;
        tracing::info!("[DrawService::rebuild_all_snapshots] rebuilding {} students", students.len());

        let paths = tokio::task::spawn_blocking(move || {
            students
                .iter()
                .map(|student_id| exporter.rebuild_from_history(student_id, &records))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| ExportError::Join(e.to_string()))??;
        Ok(paths)
    }

    fn resolve_pool(&self, requested: Option<&str>) -> Result<String, DrawError> {
        let pool_tag = requested
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .unwrap_or(self.config.default_pool.as_str());
        if !self.catalog.has_pool(pool_tag) {
            return Err(DrawError::UnknownPool(pool_tag.to_string()));
        }
        Ok(pool_tag.to_string())
    }

    fn lock_student(&self, student_id: &str) -> StudentLease<'_> {
        let mut locks = self.student_locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(student_id.to_string()).or_default().clone();
        StudentLease { locks: &self.student_locks, student_id: student_id.to_string(), lock }
    }

    fn with_rng<T>(&self, draw: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        draw(&mut rng)
    }

    async fn load_state(&self, student_id: &str) -> Result<StudentDrawState, DrawError> {
        let history = self.history.load_history(student_id).await?;
        Ok(StudentDrawState::from_records(history.records()))
    }

    async fn replay(&self, student_id: &str, request_id: Uuid) -> Result<Option<DrawReceipt>, DrawError> {
        let records = self.history.find_request(request_id).await?;
        let Some(first) = records.first() else {
            return Ok(None);
        };
        if first.student_id != student_id {
            return Err(DrawError::InvalidRequest(format!(
                "request {request_id} belongs to another student"
            )));
        }

        tracing::info!("[DrawService::replay] request {} for {} already committed", request_id, student_id);
        Ok(Some(DrawReceipt {
            request_id,
            student_id: student_id.to_string(),
            with_replacement: records.iter().any(|record| record.with_replacement),
            opportunity: first.opportunity,
            records,
            snapshot: None,
            snapshot_error: None,
        }))
    }

    /// Writes the local snapshot. The draw is already committed, so a failure
    /// here is only reported.
    async fn finish(
        &self,
        request_id: Uuid,
        student_id: &str,
        records: Vec<DrawRecord>,
        with_replacement: bool,
        opportunity: Option<OpportunityKind>,
    ) -> DrawReceipt {
        tracing::info!(
            "[DrawService] {} drew {} card(s) in request {}",
            student_id,
            records.len(),
            request_id
        );

        let (snapshot, snapshot_error) = match self.exporter.clone() {
            None => (None, None),
            Some(exporter) => {
                let rows = records.clone();
                let written = tokio::task::spawn_blocking(move || exporter.write_snapshot(&rows))
                    .await
                    .map_err(|e| ExportError::Join(e.to_string()))
                    .and_then(|result| result);
                match written {
                    Ok(path) => (path.map(|path| path.display().to_string()), None),
                    Err(e) => {
                        tracing::warn!("[DrawService::finish] snapshot for {} failed: {:?}", student_id, e);
                        (None, Some(e.to_string()))
                    }
                }
            }
        };

        DrawReceipt {
            request_id,
            student_id: student_id.to_string(),
            records,
            with_replacement,
            opportunity,
            snapshot,
            snapshot_error,
        }
    }
}

type StudentLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Holds a student's lock entry; the entry is dropped from the map once no
/// other request holds or waits on it.
struct StudentLease<'a> {
    locks: &'a StudentLocks,
    student_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for StudentLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(&self.student_id)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(&self.student_id);
        }
    }
}

/// Student ids end up in export file names, so path characters are refused.
fn checked_student_id(student_id: &str) -> Result<&str, DrawError> {
    let student_id = student_id.trim();
    if student_id.is_empty() {
        return Err(DrawError::InvalidRequest("student_id must not be empty".into()));
    }
    if student_id.contains(['/', '\\'])
        || student_id.contains("..")
        || student_id.chars().any(char::is_control)
    {
        return Err(DrawError::InvalidRequest(format!(
            "student_id `{}` contains path characters",
            student_id.escape_debug()
        )));
    }
    Ok(student_id)
}
