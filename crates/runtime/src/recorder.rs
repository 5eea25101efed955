use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use academy_common::{format_draw_time, format_file_stamp, FILE_STAMP_FORMAT};

use crate::cards::Rarity;
use crate::error::ExportError;
use crate::student::DrawRecord;

const FILE_PREFIX: &str = "抽卡紀錄_";
const FILE_EXTENSION: &str = ".csv";
const MERGED_DIR: &str = "merged";
// `_` + YYYYmmdd_HHMMSS
const STAMP_SUFFIX_LEN: usize = 16;

/// One exported row: `學號,卡名,稀有度,抽取時間`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportRow {
    #[serde(rename = "學號")]
    pub student_id: String,
    #[serde(rename = "卡名")]
    pub card_name: String,
    #[serde(rename = "稀有度")]
    pub rarity: Rarity,
    #[serde(rename = "抽取時間")]
    pub drawn_at: String,
}

impl From<&DrawRecord> for ExportRow {
    fn from(record: &DrawRecord) -> Self {
        Self {
            student_id: record.student_id.clone(),
            card_name: record.card_name.clone(),
            rarity: record.rarity,
            drawn_at: format_draw_time(&record.drawn_at),
        }
    }
}

/// Writes per-session CSV snapshots and merges them per student.
///
/// The history store stays the source of truth; everything here can be
/// regenerated from it with [`LocalExporter::rebuild_from_history`].
#[derive(Clone, Debug)]
pub struct LocalExporter {
    dir: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io { path: path.display().to_string(), source }
}

impl LocalExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self, student_id: &str, at: &NaiveDateTime) -> PathBuf {
        self.dir.join(format!(
            "{FILE_PREFIX}{student_id}_{}{FILE_EXTENSION}",
            format_file_stamp(at)
        ))
    }

    pub fn merged_path(&self, student_id: &str) -> PathBuf {
        self.dir
            .join(MERGED_DIR)
            .join(format!("{FILE_PREFIX}{student_id}{FILE_EXTENSION}"))
    }

    /// Writes one session file for the records of a single draw. Two sessions
    /// in the same second get `-2`, `-3`, ... suffixes instead of overwriting.
    pub fn write_snapshot(&self, records: &[DrawRecord]) -> Result<Option<PathBuf>, ExportError> {
        let Some(first) = records.first() else {
            return Ok(None);
        };
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let base = self.snapshot_path(&first.student_id, &first.drawn_at);
        let mut path = base.clone();
        let mut attempt = 1;
        while path.exists() {
            attempt += 1;
            let stem = base
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            path = base.with_file_name(format!("{stem}-{attempt}{FILE_EXTENSION}"));
        }

        write_rows(&path, records.iter().map(ExportRow::from))?;
        tracing::debug!("[LocalExporter::write_snapshot] wrote {}", path.display());
        Ok(Some(path))
    }

    /// Session files of one student, oldest first.
    pub fn session_files(&self, student_id: &str) -> Result<Vec<PathBuf>, ExportError> {
        Ok(self
            .all_session_files()?
            .remove(student_id)
            .unwrap_or_default())
    }

    fn all_session_files(&self) -> Result<BTreeMap<String, Vec<PathBuf>>, ExportError> {
        let mut sessions: BTreeMap<String, Vec<((String, u32), PathBuf)>> = BTreeMap::new();
        if !self.dir.exists() {
            return Ok(BTreeMap::new());
        }

        for entry in fs::read_dir(&self.dir).map_err(io_error(&self.dir))? {
            let path = entry.map_err(io_error(&self.dir))?.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if let Some(name) = SessionName::parse(file_name) {
                sessions
                    .entry(name.student_id.to_string())
                    .or_default()
                    .push((name.order(), path.clone()));
            }
        }

        Ok(sessions
            .into_iter()
            .map(|(student_id, mut files)| {
                files.sort();
                (student_id, files.into_iter().map(|(_, path)| path).collect())
            })
            .collect())
    }

    pub fn read_session(path: &Path) -> Result<Vec<ExportRow>, ExportError> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader.deserialize().collect::<Result<Vec<ExportRow>, _>>()?;
        Ok(rows)
    }

    /// Concatenates every session file of a student into `merged/`.
    pub fn merge_student(&self, student_id: &str) -> Result<Option<PathBuf>, ExportError> {
        let files = self.session_files(student_id)?;
        self.merge_files(student_id, &files)
    }

    fn merge_files(&self, student_id: &str, files: &[PathBuf]) -> Result<Option<PathBuf>, ExportError> {
        if files.is_empty() {
            return Ok(None);
        }

        let mut rows = Vec::new();
        for file in files {
            rows.extend(Self::read_session(file)?);
        }

        let path = self.merged_path(student_id);
        write_rows(&path, rows)?;
        tracing::info!(
            "[LocalExporter::merge_student] merged {} sessions for {} into {}",
            files.len(),
            student_id,
            path.display()
        );
        Ok(Some(path))
    }

    pub fn merge_all(&self) -> Result<Vec<PathBuf>, ExportError> {
        let mut merged = Vec::new();
        for (student_id, files) in self.all_session_files()? {
            if let Some(path) = self.merge_files(&student_id, &files)? {
                merged.push(path);
            }
        }
        Ok(merged)
    }

    /// Regenerates a student's merged file straight from stored history.
    pub fn rebuild_from_history(
        &self,
        student_id: &str,
        records: &[DrawRecord],
    ) -> Result<PathBuf, ExportError> {
        let path = self.merged_path(student_id);
        write_rows(
            &path,
            records
                .iter()
                .filter(|record| record.student_id == student_id)
                .map(ExportRow::from),
        )?;
        Ok(path)
    }
}

fn write_rows(path: &Path, rows: impl IntoIterator<Item = ExportRow>) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut empty = true;
    for row in rows {
        writer.serialize(row)?;
        empty = false;
    }
    if empty {
        writer.write_record(["學號", "卡名", "稀有度", "抽取時間"])?;
    }
    writer.flush().map_err(io_error(path))?;
    Ok(())
}

/// Parts of a session file name: `抽卡紀錄_<id>_<stamp>[-<attempt>].csv`.
#[derive(Debug, PartialEq, Eq)]
struct SessionName<'a> {
    student_id: &'a str,
    stamp: &'a str,
    attempt: u32,
}

impl<'a> SessionName<'a> {
    /// Ids may contain `_`, so the id is whatever sits between the prefix and
    /// a trailing file stamp.
    fn parse(file_name: &'a str) -> Option<Self> {
        let mut rest = file_name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?;

        let mut attempt = 1;
        if let Some((head, suffix)) = rest.rsplit_once('-') {
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) && has_stamp(head) {
                attempt = suffix.parse().ok()?;
                rest = head;
            }
        }

        if !has_stamp(rest) {
            return None;
        }
        let split = rest.len() - STAMP_SUFFIX_LEN;
        let student_id = &rest[..split];
        if student_id.is_empty() {
            return None;
        }
        Some(Self { student_id, stamp: &rest[split + 1..], attempt })
    }

    /// Stamps sort lexically; attempts sort numerically within a second.
    fn order(&self) -> (String, u32) {
        (self.stamp.to_string(), self.attempt)
    }
}


fn has_stamp(name: &str) -> bool {
    if name.len() <= STAMP_SUFFIX_LEN || !name.is_char_boundary(name.len() - STAMP_SUFFIX_LEN) {
        return false;
    }
    let suffix = &name[name.len() - STAMP_SUFFIX_LEN..];
    suffix.starts_with('_') && NaiveDateTime::parse_from_str(&suffix[1..], FILE_STAMP_FORMAT).is_ok()
}
