mod draw_history;
mod progress;

pub use draw_history::{summarize, CardCount, DrawRecord, StudentDrawState, StudentStatus};
pub use progress::{
    read_progress_sheet, Eligibility, OpportunityKind, ProgressEntry, ProgressUpdate,
};
