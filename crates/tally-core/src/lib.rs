//! Tally Core Library
//!
//! Shared functionality for the Tally personal finance tracker:
//! - Transaction Aggregation Store (in-memory view, filters, totals)
//! - Pure period/local filters and cent-exact aggregates
//! - Pluggable persistence gateways (SQLite, hosted REST)
//! - Identity provider seam for the signed-in user
//! - Locale Message Resolver with machine translation and caching
//! - Currency conversion and formatting
//! - Configuration loading

pub mod aggregate;
pub mod config;
pub mod currency;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod i18n;
pub mod identity;
pub mod models;
pub mod store;

/// Test utilities including mock translation and REST servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{aggregates, BreakdownEntry, Totals};
pub use config::{Config, GatewayBackend, GatewayConfig, TranslationConfig};
pub use currency::{convert_amount, format_currency, CurrencySettings};
pub use error::{Error, Result};
pub use filter::{apply_local_filters, filter_by_period, CategoryFilter, GlobalFilter, LocalFilter};
pub use gateway::{Gateway, MockGateway, PersistenceGateway, RestGateway, SqliteGateway};
pub use i18n::{
    text_direction, GenerateReport, GoogleTranslator, MessageResolver, MockTranslator,
    TextDirection, TranslationCache, Translator,
};
pub use identity::{IdentityProvider, SessionIdentity};
pub use models::{
    Category, NewTransaction, Priority, Transaction, TransactionKind, TransactionUpdate, User,
};
pub use store::TransactionStore;
