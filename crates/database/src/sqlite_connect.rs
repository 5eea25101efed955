use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Opens a pool for `database_url`, creating the database file if needed.
///
/// In-memory databases live per connection, so `sqlite::memory:` URLs get a
/// single-connection pool that never recycles its connection.
pub async fn connect_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(8)
    };

    tracing::debug!("[connect_pool] opening {}", database_url);
    pool_options.connect_with(options).await
}

/// Sets up database access for the listed schema types.
///
/// # Generated Functions
/// - `pub async fn prepare_schema(pool: &SqlitePool, drop_tables: bool, create_tables: bool) -> Result<(), sqlx::Error>`:
///   drops and/or creates every listed table and its indexes on an existing pool.
/// - `pub async fn connect(drop_tables: bool, create_tables: bool) -> Result<&'static SqlitePool, sqlx::Error>`:
///   connects once to `DATABASE_URL` and prepares the schema on first use.
///
/// # Example
/// ```rust,ignore
/// init_databases!(
///     default: [DrawRecord, StudentStatus]
/// );
///
/// #[tokio::main]
/// async fn main() {
///     let pool = connect(false, true).await.unwrap();
/// }
/// ```
#[macro_export]
macro_rules! init_databases {
    (
        default: [$($default_type:ty),* $(,)?]
    ) => {
        static POOL: tokio::sync::OnceCell<sqlx::SqlitePool> = tokio::sync::OnceCell::const_new();

        pub async fn prepare_schema(
            pool: &sqlx::SqlitePool, drop_tables: bool, create_tables: bool
        ) -> Result<(), sqlx::Error> {
            if drop_tables {
                // reverse order so dependent tables go first
                let mut drops: Vec<String> = Vec::new();
                $(
                    drops.push(<$default_type as $crate::SqlxSchema>::drop_table_sql());
                )*
                for drop_sql in drops.iter().rev() {
                    if let Err(e) = sqlx::query(drop_sql).execute(pool).await {
                        tracing::warn!("[prepare_schema] failed to drop table: {}. Error: {:?}", drop_sql, e);
                    }
                }
            }

            if create_tables {
                $(
                    let create_table_sql = <$default_type as $crate::SqlxSchema>::create_table_sql();
                    sqlx::query(&create_table_sql).execute(pool).await?;

                    for index_sql in <$default_type as $crate::SqlxSchema>::INDEXES_SQL {
                        sqlx::query(index_sql).execute(pool).await?;
                    }
                    tracing::debug!(
                        "[prepare_schema] table {} ready",
                        <$default_type as $crate::SqlxSchema>::TABLE_NAME
                    );
                )*
            }

            Ok(())
        }

        pub async fn connect(
            drop_tables: bool, create_tables: bool
        ) -> Result<&'static sqlx::SqlitePool, sqlx::Error> {
            POOL.get_or_try_init(|| async {
                use $crate::EnvVars;
                let env = $crate::DatabaseEnv::load();
                let pool = $crate::connect_pool(&env.database_url).await?;
                prepare_schema(&pool, drop_tables, create_tables).await?;
                Ok(pool)
            }).await
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pool_keeps_state_between_queries() {
        let pool = connect_pool("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE t (v INTEGER)").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO t (v) VALUES (7)").execute(&pool).await.unwrap();

        let (v,): (i64,) = sqlx::query_as("SELECT v FROM t").fetch_one(&pool).await.unwrap();
        assert_eq!(v, 7);
    }
}
