use axum::{
    extract::{Path, State},
    routing::get, Router,
};

use academy_common::taipei_today;

use crate::{response::{AppError, AppSuccess}, GlobalState};

pub fn student_routes() -> Router<GlobalState> {
    Router::new()
        .route("/students/{student_id}/eligibility",
            get(eligibility)
        )
        .route("/students/{student_id}/history",
            get(history)
        )
}

async fn eligibility(
    State(state): State<GlobalState>,
    Path(student_id): Path<String>,
) -> Result<AppSuccess, AppError> {
    let eligibility = state.draw_service
        .eligibility(&student_id, taipei_today())
        .await
        .map_err(AppError::from_draw)?;
    AppSuccess::ok("Eligibility", eligibility)
}

async fn history(
    State(state): State<GlobalState>,
    Path(student_id): Path<String>,
) -> Result<AppSuccess, AppError> {
    let history = state.draw_service
        .student_history(&student_id)
        .await
        .map_err(AppError::from_draw)?;
    AppSuccess::ok("History", history)
}
