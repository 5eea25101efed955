use anyhow::Result;

use academy_runtime::connect;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // drop, then recreate empty tables
    connect(true, true).await?;

    println!("Database reset successfully");
    Ok(())
}
