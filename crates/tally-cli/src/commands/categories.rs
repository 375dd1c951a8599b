//! Category command implementations

use anyhow::{Context, Result};
use tally_core::config::Config;
use tally_core::Error;

use super::core::open_store;
use super::truncate;

pub async fn cmd_categories_list(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let categories = store.categories().await;

    if categories.is_empty() {
        println!("No categories yet. Create one with:");
        println!("  tally categories add Groceries");
        return Ok(());
    }

    let by_category = store.totals_by_category().await;

    println!();
    println!("📂 Categories");
    println!("   ─────────────────────────────────────────────");
    for category in &categories {
        let (spent, count) = by_category
            .iter()
            .find(|e| e.key == Some(category.id))
            .map(|e| (e.amount(), e.transaction_count))
            .unwrap_or((0.0, 0));
        println!(
            "   [{:>4}] {:<24} {:>12.2}  ({} tx)",
            category.id,
            truncate(&category.name, 24),
            spent,
            count
        );
    }

    Ok(())
}

pub async fn cmd_categories_add(config: &Config, name: &str) -> Result<()> {
    let store = open_store(config).await?;
    let existing = store
        .categories()
        .await
        .into_iter()
        .find(|c| c.matches_name(name));

    if let Some(category) = existing {
        println!("ℹ️  Category '{}' already exists (id {})", category.name, category.id);
        return Ok(());
    }

    match store.resolve_or_create_category(name).await {
        Ok(category) => {
            println!("✅ Created category {}: {}", category.id, category.name);
            Ok(())
        }
        Err(Error::InvalidData(msg)) => anyhow::bail!("Invalid category name: {}", msg),
        Err(e) => Err(e).context("Failed to create category"),
    }
}
