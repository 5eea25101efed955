use axum::{extract::State, routing::get, Router};
use serde_json::json;

use crate::{response::{AppError, AppSuccess}, GlobalState};

pub fn misc_routes() -> Router<GlobalState> {
    Router::new()
        .route("/health",
            get(|| async { "OK" })
        )
        .route("/pools",
            get(list_pools)
        )
}

async fn list_pools(
    State(state): State<GlobalState>,
) -> Result<AppSuccess, AppError> {
    let service = &state.draw_service;
    AppSuccess::ok("Pools", json!({
        "pools": service.pools(),
        "default_pool": service.config().default_pool,
    }))
}
