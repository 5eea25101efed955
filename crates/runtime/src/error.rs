use thiserror::Error;

use crate::student::OpportunityKind;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to open catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog: {0}")]
    Csv(#[from] csv::Error),

    #[error("catalog is missing required column `{0}`")]
    MissingColumn(&'static str),

    #[error("catalog row {row}: unknown rarity `{value}`")]
    UnknownRarity { row: usize, value: String },

    #[error("catalog row {row}: unknown card type `{value}`")]
    UnknownCardType { row: usize, value: String },

    #[error("catalog row {row}: invalid KN `{value}`")]
    InvalidCost { row: usize, value: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export io failed on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("export task panicked: {0}")]
    Join(String),
}

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("student `{0}` is not registered in the progress ledger")]
    NotRegistered(String),

    #[error("no {kind} draw opportunity left for `{student_id}` today")]
    OpportunityUnavailable {
        student_id: String,
        kind: OpportunityKind,
    },

    #[error("unknown card pool `{0}`")]
    UnknownPool(String),

    #[error("invalid draw request: {0}")]
    InvalidRequest(String),

    #[error("invalid draw config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
