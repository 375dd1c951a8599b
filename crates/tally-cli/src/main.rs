//! Tally CLI - Personal finance tracker
//!
//! Usage:
//!   tally init                          Initialize database
//!   tally add "Lunch" 12.50 -c Food     Record an expense
//!   tally list --from 2024-01-01        List transactions
//!   tally summary --from 2024-01-01     Totals for a period
//!   tally locale show fr                Messages for a language

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(
        cli.config.as_deref(),
        cli.db.as_deref(),
        cli.user.as_deref(),
    )?;

    match cli.command {
        Commands::Init => commands::cmd_init(&config).await,
        Commands::Add {
            description,
            amount,
            kind,
            category,
            priority,
            date,
        } => {
            commands::cmd_add(
                &config,
                &description,
                amount,
                &kind,
                category.as_deref(),
                priority.as_deref(),
                date.as_deref(),
            )
            .await
        }
        Commands::List {
            period,
            search,
            kind,
            category,
            priority,
            on,
            limit,
            json,
        } => {
            let filters = commands::ListFilters {
                search,
                kind,
                category,
                priority,
                on,
            };
            commands::cmd_list(&config, &period, &filters, limit, json).await
        }
        Commands::Summary {
            period,
            currency,
            rate,
            json,
        } => commands::cmd_summary(&config, &period, currency.as_deref(), rate, json).await,
        Commands::Update {
            id,
            description,
            amount,
            kind,
            category,
            priority,
        } => {
            let changes = commands::UpdateArgs {
                description,
                amount,
                kind,
                category,
                priority,
            };
            commands::cmd_update(&config, id, &changes).await
        }
        Commands::Delete { id } => commands::cmd_delete(&config, id).await,
        Commands::Categories { action } => match action {
            None | Some(CategoriesAction::List) => commands::cmd_categories_list(&config).await,
            Some(CategoriesAction::Add { name }) => {
                commands::cmd_categories_add(&config, &name).await
            }
        },
        Commands::Locale { action } => match action {
            LocaleAction::Show { lang, flat } => {
                commands::cmd_locale_show(&config, &lang, flat).await
            }
            LocaleAction::Generate { dir, langs } => {
                commands::cmd_locale_generate(&config, &dir, &langs).await
            }
        },
    }
}
