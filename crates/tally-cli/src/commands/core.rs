//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `load_config` - Config file + environment + CLI flag resolution
//! - `open_store` - Build a loaded store for the configured user
//! - Parsers for dates, kinds and priorities given on the command line
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use tally_core::config::{Config, GatewayBackend};
use tally_core::{
    Gateway, GlobalFilter, PersistenceGateway, Priority, SessionIdentity, TransactionKind,
    TransactionStore, User,
};

use crate::cli::PeriodArgs;

/// User id used when none is configured
pub const DEFAULT_USER: &str = "local";

/// Resolve configuration: file, then TALLY_* environment, then CLI flags
pub fn load_config(
    config_path: Option<&Path>,
    db: Option<&Path>,
    user: Option<&str>,
) -> Result<Config> {
    let mut config = Config::load_with_env(config_path).context("Failed to load config")?;
    if let Some(db) = db {
        config.gateway.db_path = db.to_path_buf();
    }
    if let Some(user) = user {
        config.user_id = Some(user.to_string());
    }
    Ok(config)
}

/// Open the configured gateway, sign in and load the store
pub async fn open_store(config: &Config) -> Result<TransactionStore> {
    if config.gateway.backend == GatewayBackend::Sqlite {
        if let Some(parent) = config.gateway.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory {}", parent.display())
                })?;
            }
        }
    }

    let gateway = Gateway::from_config(&config.gateway).context("Failed to open gateway")?;
    let user_id = config.user_id.as_deref().unwrap_or(DEFAULT_USER);
    let identity = Arc::new(SessionIdentity::signed_in(User::new(user_id)));

    let store = TransactionStore::new(gateway, identity).with_offset(config.display.offset());
    store.load().await.context("Failed to load transactions")?;
    Ok(store)
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_kind(s: &str) -> Result<TransactionKind> {
    s.parse().map_err(anyhow::Error::msg)
}

pub fn parse_priority(s: &str) -> Result<Priority> {
    s.parse().map_err(anyhow::Error::msg)
}

/// Noon of `date` in the display offset, so the day is stable across offsets
pub fn date_to_timestamp(date: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let noon = date
        .and_hms_opt(12, 0, 0)
        .context("Invalid time of day")?;
    offset
        .from_local_datetime(&noon)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Ambiguous local time for {}", date))
}

pub fn period_filter(period: &PeriodArgs) -> Result<GlobalFilter> {
    let start = period.from.as_deref().map(parse_date).transpose()?;
    let end = period.to.as_deref().map(parse_date).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            anyhow::bail!("--from {} is after --to {}", start, end);
        }
    }
    Ok(GlobalFilter::new().start_date(start).end_date(end))
}

/// Human-readable description of a period
pub fn describe_period(filter: &GlobalFilter) -> String {
    match (filter.start_date, filter.end_date) {
        (None, None) => "all time".to_string(),
        (Some(start), None) => format!("since {}", start),
        (None, Some(end)) => format!("until {}", end),
        (Some(start), Some(end)) => format!("{} → {}", start, end),
    }
}

pub async fn cmd_init(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let gateway = store.gateway();

    match gateway {
        Gateway::Sqlite(db) => println!("🔧 Database ready at {}", db.path()),
        _ => println!("🔧 Connected to {} backend", gateway.name()),
    }
    println!(
        "   Signed in as: {}",
        config.user_id.as_deref().unwrap_or(DEFAULT_USER)
    );
    println!(
        "   {} transactions, {} categories",
        store.transactions().await.len(),
        store.categories().await.len()
    );

    println!("✅ Initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Record a transaction: tally add \"Salary\" 2500 --type income");
    println!("  2. See where it went:    tally summary");

    Ok(())
}
