//! Period summary command

use anyhow::Result;
use serde_json::json;
use tally_core::config::Config;
use tally_core::store::{INCOME_LABEL, UNKNOWN_LABEL};
use tally_core::{BreakdownEntry, Category, CurrencySettings};

use super::core::{describe_period, open_store, period_filter};
use crate::cli::PeriodArgs;

fn category_key_name(categories: &[Category], key: Option<i64>) -> String {
    match key {
        Some(id) => categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        None => UNKNOWN_LABEL.to_string(),
    }
}

fn print_breakdown<K>(
    title: &str,
    entries: &[BreakdownEntry<K>],
    currency: &CurrencySettings,
    label: impl Fn(&K) -> String,
) {
    if entries.is_empty() {
        return;
    }
    println!();
    println!("{}", title);
    println!("   ─────────────────────────────────────────────");
    for entry in entries {
        println!(
            "   {:<18} {:>14} {:>6.1}%  ({} tx)",
            label(&entry.key),
            currency.format(entry.amount()),
            entry.percentage,
            entry.transaction_count
        );
    }
}

pub async fn cmd_summary(
    config: &Config,
    period: &PeriodArgs,
    currency: Option<&str>,
    rate: Option<f64>,
    json: bool,
) -> Result<()> {
    let store = open_store(config).await?;
    let global = period_filter(period)?;
    store.set_global_filter(global).await;

    let mut settings = config.currency.clone();
    if let Some(code) = currency {
        settings = CurrencySettings::new(code, settings.rate);
    }
    if rate.is_some() {
        settings.rate = rate;
    }

    let totals = store.totals().await;
    let opening = store.opening_balance().await;
    let as_of = store.balance_as_of().await;
    let by_category = store.totals_by_category().await;
    let by_priority = store.totals_by_priority().await;
    let categories = store.categories().await;

    if json {
        let output = json!({
            "period": global,
            "currency": settings.selected,
            "total_income": settings.convert(totals.total_income()),
            "total_expenses": settings.convert(totals.total_expenses()),
            "balance": settings.convert(totals.balance()),
            "opening_balance": opening.map(|t| settings.convert(t.balance())),
            "balance_as_of_end": settings.convert(as_of.balance()),
            "by_category": by_category
                .iter()
                .map(|e| json!({
                    "category_id": e.key,
                    "name": category_key_name(&categories, e.key),
                    "amount": settings.convert(e.amount()),
                    "count": e.transaction_count,
                    "percentage": e.percentage,
                }))
                .collect::<Vec<_>>(),
            "by_priority": by_priority
                .iter()
                .map(|e| json!({
                    "priority": e.key,
                    "amount": settings.convert(e.amount()),
                    "count": e.transaction_count,
                    "percentage": e.percentage,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("📊 Summary ({})", describe_period(&global));
    println!("   ─────────────────────────────────────────────");
    println!("   {:<22} {:>16}", INCOME_LABEL, settings.format(totals.total_income()));
    println!("   {:<22} {:>16}", "Expenses", settings.format(totals.total_expenses()));
    println!("   {:<22} {:>16}", "Balance", settings.format(totals.balance()));

    if let Some(opening) = opening {
        println!("   {:<22} {:>16}", "Opening balance", settings.format(opening.balance()));
    }
    let as_of_label = match global.end_date {
        Some(end) => format!("Balance as of {}", end),
        None => "Balance as of today".to_string(),
    };
    println!("   {:<22} {:>16}", as_of_label, settings.format(as_of.balance()));

    print_breakdown("📂 Expenses by category", &by_category, &settings, |key| {
        category_key_name(&categories, *key)
    });
    print_breakdown("⚡ Expenses by priority", &by_priority, &settings, |key| {
        key.map(|p| p.to_string()).unwrap_or_else(|| "Unset".to_string())
    });

    if settings.rate.is_some() {
        println!();
        println!(
            "   💱 Amounts shown in {} at rate {}",
            settings.selected,
            settings.rate.unwrap_or(1.0)
        );
    }

    Ok(())
}
