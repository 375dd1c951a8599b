//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Tally - Track income and expenses
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Personal finance tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ~/.local/share/tally/config.toml, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides config and TALLY_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Signed-in user id (overrides config and TALLY_USER)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global date range shared by list and summary
#[derive(Args, Debug, Clone, Default)]
pub struct PeriodArgs {
    /// First day of the period (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub from: Option<String>,

    /// Last day of the period (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Record a transaction
    Add {
        /// What the money was for
        description: String,

        /// Amount (non-negative)
        amount: f64,

        /// Transaction type: income or expense
        #[arg(short = 't', long = "type", default_value = "expense")]
        kind: String,

        /// Category name (created if it does not exist)
        #[arg(short, long)]
        category: Option<String>,

        /// Priority: High, Medium or Low
        #[arg(short, long)]
        priority: Option<String>,

        /// Date of the transaction (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List transactions
    List {
        #[command(flatten)]
        period: PeriodArgs,

        /// Only descriptions containing this text
        #[arg(short, long)]
        search: Option<String>,

        /// Only this type: income or expense
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        /// Only this category (name or id, "none" for uncategorized)
        #[arg(short, long)]
        category: Option<String>,

        /// Only this priority: High, Medium or Low
        #[arg(short, long)]
        priority: Option<String>,

        /// Only transactions on this day (YYYY-MM-DD)
        #[arg(long)]
        on: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show totals and breakdowns for a period
    Summary {
        #[command(flatten)]
        period: PeriodArgs,

        /// Display currency (ISO code, e.g. EUR)
        #[arg(long)]
        currency: Option<String>,

        /// Units of base currency per unit of the display currency
        #[arg(long)]
        rate: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change fields of a transaction
    Update {
        /// Transaction ID
        id: i64,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        amount: Option<f64>,

        /// income or expense
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        /// Category name, or "none" to clear
        #[arg(short, long)]
        category: Option<String>,

        /// High, Medium, Low, or "none" to clear
        #[arg(short, long)]
        priority: Option<String>,
    },

    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: i64,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// UI message locales
    Locale {
        #[command(subcommand)]
        action: LocaleAction,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories with expense totals
    List,

    /// Create a category (no-op if one with the same name exists)
    Add {
        /// Category name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum LocaleAction {
    /// Print the messages for a language (machine-translated if not bundled)
    Show {
        /// Language code, e.g. fr
        lang: String,

        /// Print flat `key = value` lines instead of JSON
        #[arg(long)]
        flat: bool,
    },

    /// Write <lang>.json files for languages not yet present
    Generate {
        /// Output directory
        #[arg(short, long, default_value = "locales")]
        dir: PathBuf,

        /// Languages to generate (defaults to the full built-in list)
        langs: Vec<String>,
    },
}
