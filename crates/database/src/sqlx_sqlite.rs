/// Table-level metadata for a record type persisted in SQLite.
///
/// Implementors describe their own DDL; `init_databases!` walks a list of
/// implementors to drop, create, and index tables in order.
pub trait SqlxSchema {
    const TABLE_NAME: &'static str;
    const INDEXES_SQL: &'static [&'static str] = &[];


    /// Example: "CREATE TABLE IF NOT EXISTS draw_records (id INTEGER PRIMARY KEY, ...)"
    fn create_table_sql() -> String;

    fn drop_table_sql() -> String {
        format!("DROP TABLE IF EXISTS \"{}\"", Self::TABLE_NAME)
    }
}
