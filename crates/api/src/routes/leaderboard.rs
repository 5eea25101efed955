use axum::{extract::State, routing::get, Router};

use crate::{response::{AppError, AppSuccess}, GlobalState};

pub fn leaderboard_routes() -> Router<GlobalState> {
    Router::new()
        .route("/leaderboard",
            get(leaderboard)
        )
}

async fn leaderboard(
    State(state): State<GlobalState>,
) -> Result<AppSuccess, AppError> {
    let rows = state.draw_service
        .leaderboard()
        .await
        .map_err(AppError::from_draw)?;
    AppSuccess::ok("Leaderboard", rows)
}
