//! Transaction command implementations

use anyhow::{Context, Result};
use tally_core::config::Config;
use tally_core::store::category_label;
use tally_core::{
    Category, CategoryFilter, Error, LocalFilter, NewTransaction, Transaction, TransactionUpdate,
};

use super::core::{
    date_to_timestamp, describe_period, open_store, parse_date, parse_kind, parse_priority,
    period_filter,
};
use super::truncate;
use crate::cli::PeriodArgs;

/// Local refinement filters given on the command line
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub search: Option<String>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub on: Option<String>,
}

/// Field changes given to `tally update`
#[derive(Debug, Clone, Default)]
pub struct UpdateArgs {
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
}

fn is_clear(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "none" | "null" | "")
}

/// Resolve a category argument against loaded categories
///
/// An existing name wins over the "none" keyword and numeric ids. Otherwise
/// "none" means uncategorized and a number is an id.
pub fn category_filter(categories: &[Category], value: &str) -> Result<CategoryFilter> {
    if let Some(category) = categories.iter().find(|c| c.matches_name(value)) {
        return Ok(CategoryFilter::Id(category.id));
    }
    if is_clear(value) {
        return Ok(CategoryFilter::Uncategorized);
    }
    if let Ok(id) = value.trim().parse::<i64>() {
        return Ok(CategoryFilter::Id(id));
    }
    anyhow::bail!("Category '{}' not found", value)
}

fn format_amount(tx: &Transaction) -> String {
    if tx.is_expense() {
        format!("\x1b[31m-{:.2}\x1b[0m", tx.amount) // Red for expenses
    } else {
        format!("\x1b[32m+{:.2}\x1b[0m", tx.amount) // Green for income
    }
}

pub async fn cmd_add(
    config: &Config,
    description: &str,
    amount: f64,
    kind: &str,
    category: Option<&str>,
    priority: Option<&str>,
    date: Option<&str>,
) -> Result<()> {
    let store = open_store(config).await?;

    let mut tx = NewTransaction::new(description, amount, parse_kind(kind)?)
        .priority(priority.map(parse_priority).transpose()?);
    if let Some(date) = date {
        tx = tx.created_at(date_to_timestamp(parse_date(date)?, store.offset())?);
    }

    let stored = match category {
        Some(name) => store.add_transaction_with_category(tx, name).await,
        None => store.add_transaction(tx).await,
    }
    .context("Failed to add transaction")?;

    println!(
        "✅ Added transaction {}: {} {} ({})",
        stored.id,
        stored.description,
        format_amount(&stored),
        store.category_name(&stored).await
    );
    Ok(())
}

pub async fn cmd_list(
    config: &Config,
    period: &PeriodArgs,
    filters: &ListFilters,
    limit: usize,
    json: bool,
) -> Result<()> {
    let store = open_store(config).await?;
    let global = period_filter(period)?;
    store.set_global_filter(global).await;

    let category = match filters.category.as_deref() {
        Some(value) => category_filter(&store.categories().await, value)?,
        None => CategoryFilter::All,
    };
    let local = LocalFilter::new()
        .text(filters.search.as_deref())
        .kind(filters.kind.as_deref().map(parse_kind).transpose()?)
        .category(category)
        .priority(filters.priority.as_deref().map(parse_priority).transpose()?)
        .single_date(filters.on.as_deref().map(parse_date).transpose()?);
    store.set_local_filter(local).await;

    let transactions = store.locally_filtered().await;

    if json {
        let shown: Vec<&Transaction> = transactions.iter().take(limit).collect();
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions found. Record one with:");
        println!("  tally add \"Groceries\" 42.50 --category Food");
        return Ok(());
    }

    let categories = store.categories().await;
    let offset = store.offset();

    println!();
    println!(
        "📝 Transactions ({}, {} shown of {})",
        describe_period(&global),
        transactions.len().min(limit),
        transactions.len()
    );
    println!("   ─────────────────────────────────────────────────────────────────────");

    for tx in transactions.iter().take(limit) {
        println!(
            "   [{:>4}] {} │ {:>20} │ {:<14} │ {:<6} │ {}",
            tx.id,
            tx.created_at.with_timezone(&offset).format("%Y-%m-%d"),
            format_amount(tx),
            truncate(&category_label(&categories, tx), 14),
            tx.priority.map(|p| p.as_str()).unwrap_or("-"),
            truncate(&tx.description, 36)
        );
    }

    Ok(())
}

pub async fn cmd_update(config: &Config, id: i64, changes: &UpdateArgs) -> Result<()> {
    let store = open_store(config).await?;

    let categories = store.categories().await;
    let category_id = match changes.category.as_deref() {
        Some(value) => match categories.iter().find(|c| c.matches_name(value)) {
            Some(existing) => Some(Some(existing.id)),
            None if is_clear(value) => Some(None),
            None => Some(Some(store.resolve_or_create_category(value).await?.id)),
        },
        None => None,
    };
    let priority = match changes.priority.as_deref() {
        Some(value) if is_clear(value) => Some(None),
        Some(value) => Some(Some(parse_priority(value)?)),
        None => None,
    };

    let update = TransactionUpdate {
        description: changes.description.clone(),
        amount: changes.amount,
        kind: changes.kind.as_deref().map(parse_kind).transpose()?,
        category_id,
        priority,
    };

    match store.update_transaction(id, update).await {
        Ok(tx) => {
            println!(
                "✅ Updated transaction {}: {} {} ({})",
                tx.id,
                tx.description,
                format_amount(&tx),
                store.category_name(&tx).await
            );
            Ok(())
        }
        Err(Error::NotFound(_)) => anyhow::bail!("Transaction {} not found", id),
        Err(e) => Err(e).context("Failed to update transaction"),
    }
}

pub async fn cmd_delete(config: &Config, id: i64) -> Result<()> {
    let store = open_store(config).await?;

    match store.delete_transaction(id).await {
        Ok(()) => {
            println!("🗑️  Deleted transaction {}", id);
            Ok(())
        }
        Err(Error::NotFound(_)) => anyhow::bail!("Transaction {} not found", id),
        Err(e) => Err(e).context("Failed to delete transaction"),
    }
}
