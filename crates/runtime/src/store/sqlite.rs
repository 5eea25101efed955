use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use academy_common::{format_draw_time, DATE_FORMAT, DRAW_TIME_FORMAT};
use academy_database::init_databases;

use crate::cards::Rarity;
use crate::error::StoreError;
use crate::store::{HistoryLookup, HistoryStore, ProgressLedger};
use crate::student::{DrawRecord, OpportunityKind, ProgressEntry, ProgressUpdate, StudentStatus};

init_databases!(
    default: [DrawRecord, StudentStatus, ProgressEntry]
);

const RECORD_COLUMNS: &str =
    "draw_id, request_id, student_id, card_name, rarity, draw_time, opportunity, with_replacement";
const PROGRESS_COLUMNS: &str =
    "student_id, name, homework_done, homework_last_draw, progress_done, progress_last_draw";

/// History and progress ledger backed by one SQLite database.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn corrupt(table: &'static str, reason: impl ToString) -> StoreError {
    StoreError::Corrupt { table, reason: reason.to_string() }
}

fn record_from_row(row: &SqliteRow) -> Result<DrawRecord, StoreError> {
    let draw_id: String = row.try_get("draw_id")?;
    let request_id: String = row.try_get("request_id")?;
    let rarity: String = row.try_get("rarity")?;
    let draw_time: String = row.try_get("draw_time")?;
    let opportunity: Option<String> = row.try_get("opportunity")?;
    let opportunity = opportunity
        .map(|raw| {
            OpportunityKind::from_str(&raw)
                .map_err(|_| corrupt("draw_records", format!("unknown opportunity `{raw}`")))
        })
        .transpose()?;

    Ok(DrawRecord {
        draw_id: Uuid::parse_str(&draw_id).map_err(|e| corrupt("draw_records", e))?,
        request_id: Uuid::parse_str(&request_id).map_err(|e| corrupt("draw_records", e))?,
        student_id: row.try_get("student_id")?,
        card_name: row.try_get("card_name")?,
        rarity: Rarity::from_str(&rarity)
            .map_err(|_| corrupt("draw_records", format!("unknown rarity `{rarity}`")))?,
        drawn_at: NaiveDateTime::parse_from_str(&draw_time, DRAW_TIME_FORMAT)
            .map_err(|e| corrupt("draw_records", e))?,
        opportunity,
        with_replacement: row.try_get::<i64, _>("with_replacement")? != 0,
    })
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>, StoreError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|e| corrupt("student_progress", e)),
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|date| date.format(DATE_FORMAT).to_string())
}

fn entry_from_row(row: &SqliteRow) -> Result<ProgressEntry, StoreError> {
    Ok(ProgressEntry {
        student_id: row.try_get("student_id")?,
        name: row.try_get("name")?,
        homework_done: row.try_get::<i64, _>("homework_done")? != 0,
        homework_last_draw: parse_date(row.try_get("homework_last_draw")?)?,
        progress_done: row.try_get::<i64, _>("progress_done")? != 0,
        progress_last_draw: parse_date(row.try_get("progress_last_draw")?)?,
    })
}

fn columns_for(kind: OpportunityKind) -> (&'static str, &'static str) {
    match kind {
        OpportunityKind::Homework => ("homework_done", "homework_last_draw"),
        OpportunityKind::Progress => ("progress_done", "progress_last_draw"),
    }
}

async fn fetch_entry<'e>(
    executor: impl SqliteExecutor<'e>,
    student_id: &str,
) -> Result<Option<ProgressEntry>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM student_progress WHERE student_id = ?"
    ))
    .bind(student_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(entry_from_row).transpose()
}

async fn write_entry<'e>(
    executor: impl SqliteExecutor<'e>,
    entry: &ProgressEntry,
) -> Result<(), StoreError> {
    sqlx::query(&format!(
        "INSERT INTO student_progress ({PROGRESS_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
            name = excluded.name,
            homework_done = excluded.homework_done,
            homework_last_draw = excluded.homework_last_draw,
            progress_done = excluded.progress_done,
            progress_last_draw = excluded.progress_last_draw"
    ))
    .bind(&entry.student_id)
    .bind(&entry.name)
    .bind(entry.homework_done)
    .bind(format_date(entry.homework_last_draw))
    .bind(entry.progress_done)
    .bind(format_date(entry.progress_last_draw))
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl HistoryStore for SqliteStore {
    async fn load_history(&self, student_id: &str) -> Result<HistoryLookup, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM draw_records WHERE student_id = ? ORDER BY id"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let records = rows.iter().map(record_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(HistoryLookup::from_records(records))
    }

    async fn find_request(&self, request_id: Uuid) -> Result<Vec<DrawRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM draw_records WHERE request_id = ? ORDER BY id"
        ))
        .bind(request_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn append(&self, records: &[DrawRecord]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for record in records {
            let result = sqlx::query(&format!(
                "INSERT OR IGNORE INTO draw_records ({RECORD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
            ))
            .bind(record.draw_id.to_string())
            .bind(record.request_id.to_string())
            .bind(&record.student_id)
            .bind(&record.card_name)
            .bind(record.rarity.to_string())
            .bind(format_draw_time(&record.drawn_at))
            .bind(record.opportunity.map(|kind| kind.to_string()))
            .bind(record.with_replacement)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tracing::debug!("[SqliteStore::append] draw {} already stored", record.draw_id);
                continue;
            }

            let legendary = record.rarity == Rarity::Legendary;
            sqlx::query(
                "INSERT INTO student_status (student_id, total_draws, no_legendary_count) VALUES (?, 1, ?)
                 ON CONFLICT(student_id) DO UPDATE SET
                    total_draws = total_draws + 1,
                    no_legendary_count = CASE WHEN ? THEN 0 ELSE no_legendary_count + 1 END",
            )
            .bind(&record.student_id)
            .bind(if legendary { 0_i64 } else { 1_i64 })
            .bind(legendary)
            .execute(&mut *tx)
            .await?;

            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn student_status(&self, student_id: &str) -> Result<Option<StudentStatus>, StoreError> {
        let row = sqlx::query(
            "SELECT student_id, total_draws, no_legendary_count FROM student_status WHERE student_id = ?",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let total_draws: i64 = row.try_get("total_draws")?;
        let no_legendary_count: i64 = row.try_get("no_legendary_count")?;
        Ok(Some(StudentStatus {
            student_id: row.try_get("student_id")?,
            total_draws: u64::try_from(total_draws).map_err(|e| corrupt("student_status", e))?,
            no_legendary_count: u64::try_from(no_legendary_count)
                .map_err(|e| corrupt("student_status", e))?,
        }))
    }

    async fn students(&self) -> Result<Vec<String>, StoreError> {
        let students = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT student_id FROM draw_records ORDER BY student_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn all_records(&self) -> Result<Vec<DrawRecord>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM draw_records ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }
}

#[async_trait::async_trait]
impl ProgressLedger for SqliteStore {
    async fn find_student(&self, student_id: &str) -> Result<Option<ProgressEntry>, StoreError> {
        fetch_entry(&self.pool, student_id).await
    }

    async fn consume_opportunity(
        &self,
        student_id: &str,
        kind: OpportunityKind,
        today: NaiveDate,
    ) -> Result<bool, StoreError> {
        let (done, last_draw) = columns_for(kind);
        let today = today.format(DATE_FORMAT).to_string();

        // single conditional update so two callers cannot both consume it
        let result = sqlx::query(&format!(
            "UPDATE student_progress SET {last_draw} = ?
             WHERE student_id = ? AND {done} = 1 AND ({last_draw} IS NULL OR {last_draw} <> ?)"
        ))
        .bind(&today)
        .bind(student_id)
        .bind(&today)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn restore_opportunity(
        &self,
        student_id: &str,
        kind: OpportunityKind,
        previous: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        let (_, last_draw) = columns_for(kind);
        sqlx::query(&format!(
            "UPDATE student_progress SET {last_draw} = ? WHERE student_id = ?"
        ))
        .bind(format_date(previous))
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_progress(
        &self,
        student_id: &str,
        update: &ProgressUpdate,
    ) -> Result<ProgressEntry, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut entry = fetch_entry(&mut *tx, student_id)
            .await?
            .unwrap_or_else(|| ProgressEntry::new(student_id, ""));
        entry.apply(update);
        write_entry(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn save_entry(&self, entry: &ProgressEntry) -> Result<(), StoreError> {
        write_entry(&self.pool, entry).await
    }
}
