//! Run database migrations for docrieve-meta.
//!
//! Usage: cargo run --example run_migrations

use docrieve_config::DatabaseConfig;
use docrieve_meta::PoolManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env();
    println!("setting up database (credentials redacted)");

    let pools = PoolManager::connect(&config).await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT table_name FROM information_schema.tables
         WHERE table_schema = 'public'
         ORDER BY table_name",
    )
    .fetch_all(pools.pool())
    .await?;

    println!("\ncreated tables:");
    for table in tables {
        println!("  - {table}");
    }

    Ok(())
}
