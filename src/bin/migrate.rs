use std::path::PathBuf;

use petsupply_store::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations_from},
};

/// Applies every `.sql` file in `migrations/` (or the directory given as
/// the first argument) in filename order.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("migrations"));

    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations_from(&orm, &dir).await?;
    println!("Migrations applied from {}", dir.display());
    Ok(())
}
