pub mod cards;
pub mod error;
pub mod leaderboard;
pub mod recorder;
pub mod store;
pub mod student;

mod draw_service;
mod env;

pub use cards::{
    CardDefinition, CardPool, CardType, Catalog, DrawConfig, DrawOutcome, DrawnCard,
    GalleryPage, GalleryQuery, GallerySort, PackOutcome, PackSampling, PackShortfall, Rarity, RarityTable,
    WeightedPoolEntry,
};
pub use draw_service::{
    DrawMode, DrawReceipt, DrawResult, DrawService, FreeDrawRequest, OpportunityDrawRequest,
    StudentHistory,
};
pub use env::{RuntimeEnv, DEFAULT_CATALOG_PATH, DEFAULT_EXPORT_DIR};
pub use error::{CatalogError, DrawError, ExportError, StoreError};
pub use leaderboard::{build_leaderboard, LeaderboardRow};
pub use recorder::{ExportRow, LocalExporter};
pub use store::{connect, prepare_schema, HistoryLookup, HistoryStore, MemoryStore, ProgressLedger, SqliteStore};
pub use student::{
    read_progress_sheet, summarize, CardCount, DrawRecord, Eligibility, OpportunityKind,
    ProgressEntry, ProgressUpdate, StudentDrawState, StudentStatus,
};
