mod env;
mod global_state;
mod middleware;
mod response;
mod utils;
mod routes;

pub use routes::{
    admin_routes,
    card_routes,
    draw_routes,
    leaderboard_routes,
    misc_routes,
    student_routes,
};

pub use env::{ApiServerEnv, DEFAULT_PORT};
pub use global_state::GlobalState;
pub use utils::setup_tracing;
pub use middleware::admin_only;
pub use response::{AppError, AppSuccess};
