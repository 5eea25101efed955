use anyhow::Result;
use axum::Router;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use academy_common::EnvVars;
use academy_service_api::{
    admin_routes, card_routes, draw_routes, leaderboard_routes, misc_routes, setup_tracing,
    student_routes, ApiServerEnv, GlobalState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();

    let cors = CorsLayer::very_permissive();
    let trace = TraceLayer::new_for_http();

    let env = ApiServerEnv::load();
    if env.draw_password.is_empty() {
        tracing::warn!("DRAW_PASSWORD is empty; admin routes will reject every request");
    }

    let global_state = GlobalState::new().await?;

    let app = Router::new()
        .merge(misc_routes())
        .merge(card_routes())
        .merge(student_routes())
        .merge(draw_routes())
        .merge(leaderboard_routes())
        .merge(admin_routes())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(cors)
        .layer(trace)
        .with_state(global_state);

    let port: u16 = env.port.parse()?;
    let listener = tokio::net::TcpListener::bind(format!(":::{port}")).await?;

    tracing::info!("LISTENING ON {port}");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
