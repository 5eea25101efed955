use axum::{
    extract::State,
    middleware,
    routing::post, Json, Router,
};

use academy_common::taipei_now;
use academy_runtime::{DrawResult, FreeDrawRequest, OpportunityDrawRequest};

use crate::{
    middleware::admin_only,
    response::{AppError, AppSuccess},
    GlobalState,
};

pub fn draw_routes() -> Router<GlobalState> {
    Router::new()
        .route("/draw/opportunity",
            post(draw_for_opportunity)
        )
        .route("/draw/simulate",
            post(simulate)
            .route_layer(middleware::from_fn(admin_only))
        )
}

fn message(result: &DrawResult) -> &'static str {
    match result {
        DrawResult::Committed(_) => "Drawn",
        DrawResult::Replayed(_) => "Already drawn for this request",
        DrawResult::FullyCollected { .. } => "Every card in this pool is fully collected",
        DrawResult::Insufficient { .. } => "Not enough cards left for the requested packs",
    }
}

async fn draw_for_opportunity(
    State(state): State<GlobalState>,
    Json(payload): Json<OpportunityDrawRequest>,
) -> Result<AppSuccess, AppError> {
    tracing::info!(
        "[/draw/opportunity] {} spends {:?} on {:?}",
        payload.student_id, payload.kind, payload.pool_tag
    );
    let result = state.draw_service
        .draw_for_opportunity(&payload, taipei_now())
        .await
        .map_err(AppError::from_draw)?;
    AppSuccess::ok(message(&result), result)
}

async fn simulate(
    State(state): State<GlobalState>,
    Json(payload): Json<FreeDrawRequest>,
) -> Result<AppSuccess, AppError> {
    tracing::info!(
        "[/draw/simulate] {} draws {:?} on {:?}",
        payload.student_id, payload.mode, payload.pool_tag
    );
    let result = state.draw_service
        .draw_free(&payload, taipei_now())
        .await
        .map_err(AppError::from_draw)?;
    AppSuccess::ok(message(&result), result)
}
