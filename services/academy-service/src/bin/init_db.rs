use std::fs::File;

use anyhow::{Context, Result};

use academy_runtime::{connect, read_progress_sheet, ProgressLedger, SqliteStore};

/// Creates the tables and optionally seeds the progress ledger from a CSV
/// sheet passed as the first argument.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let pool = connect(false, true).await?.clone();
    println!("Database initialized");

    let Some(sheet) = std::env::args().nth(1) else {
        return Ok(());
    };

    let file = File::open(&sheet).with_context(|| format!("cannot open {sheet}"))?;
    let entries = read_progress_sheet(file)?;
    let store = SqliteStore::new(pool);
    for entry in &entries {
        store.save_entry(entry).await?;
    }

    println!("Imported {} students from {}", entries.len(), sheet);
    Ok(())
}
