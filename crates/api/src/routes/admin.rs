use axum::{
    extract::{Path, State},
    middleware,
    routing::{post, put}, Json, Router,
};
use serde_json::json;

use academy_runtime::ProgressUpdate;

use crate::{
    middleware::admin_only,
    response::{AppError, AppSuccess},
    GlobalState,
};

pub fn admin_routes() -> Router<GlobalState> {
    Router::new()
        .route("/progress/{student_id}",
            put(update_progress)
        )
        .route("/exports/merge",
            post(merge_exports)
        )
        .route("/exports/rebuild",
            post(rebuild_all_exports)
        )
        .route("/exports/rebuild/{student_id}",
            post(rebuild_export)
        )
        .route_layer(middleware::from_fn(admin_only))
}

async fn update_progress(
    State(state): State<GlobalState>,
    Path(student_id): Path<String>,
    Json(payload): Json<ProgressUpdate>,
) -> Result<AppSuccess, AppError> {
    let entry = state.draw_service
        .update_progress(&student_id, &payload)
        .await
        .map_err(AppError::from_draw)?;
    tracing::info!("[/progress] updated {}", student_id);
    AppSuccess::ok("Progress updated", entry)
}

async fn merge_exports(
    State(state): State<GlobalState>,
) -> Result<AppSuccess, AppError> {
    let merged = state.draw_service
        .merge_exports()
        .await
        .map_err(AppError::from_draw)?;
    let files = merged
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>();
    AppSuccess::ok("Exports merged", json!({ "files": files }))
}

async fn rebuild_export(
    State(state): State<GlobalState>,
    Path(student_id): Path<String>,
) -> Result<AppSuccess, AppError> {
    let path = state.draw_service
        .rebuild_snapshot(&student_id)
        .await
        .map_err(AppError::from_draw)?;
    AppSuccess::ok("Export rebuilt", json!({ "file": path.map(|p| p.display().to_string()) }))
}

async fn rebuild_all_exports(
    State(state): State<GlobalState>,
) -> Result<AppSuccess, AppError> {
    let rebuilt = state.draw_service
        .rebuild_all_snapshots()
        .await
        .map_err(AppError::from_draw)?;
    let files = rebuilt
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>();
    AppSuccess::ok("Exports rebuilt", json!({ "files": files }))
}
