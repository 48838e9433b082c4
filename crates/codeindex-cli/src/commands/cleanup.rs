//! Cleanup command

use anyhow::Result;
use codeindex_core::Database;

pub async fn run(db: &Database) -> Result<()> {
    db.vacuum()?;
    println!("Database vacuumed");
    Ok(())
}
