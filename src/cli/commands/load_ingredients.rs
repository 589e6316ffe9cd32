//! Bulk ingredient import.

use anyhow::Context;
use std::path::Path;

use crate::config::Config;
use crate::db::{IngredientSeed, Store};
use crate::services::{CatalogService, SeaOrmCatalogService};

pub async fn cmd_load_ingredients(config: &Config, path: &Path) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let seeds: Vec<IngredientSeed> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let store = Store::new(&config.general.database_path).await?;
    let inserted = SeaOrmCatalogService::new(store)
        .load_ingredients(&seeds)
        .await?;

    println!(
        "Loaded {inserted} new ingredients ({} already present)",
        seeds.len().saturating_sub(inserted)
    );

    Ok(())
}
