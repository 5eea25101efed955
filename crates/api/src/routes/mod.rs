mod admin;
mod cards;
mod draw;
mod leaderboard;
mod misc;
mod students;

pub use admin::admin_routes;
pub use cards::card_routes;
pub use draw::draw_routes;
pub use leaderboard::leaderboard_routes;
pub use misc::misc_routes;
pub use students::student_routes;
