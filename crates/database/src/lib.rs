mod env;
mod sqlx_sqlite;
mod sqlite_connect;

pub use academy_common::EnvVars;
pub use env::{DatabaseEnv, DEFAULT_DATABASE_URL};
pub use sqlx_sqlite::SqlxSchema;
pub use sqlite_connect::connect_pool;
