//! Pluggable persistence gateway abstraction
//!
//! The store never talks to a database directly. Every read and write goes
//! through a `PersistenceGateway`, scoped to an owner id.
//!
//! # Architecture
//!
//! - `PersistenceGateway` trait: row-level fetch/insert/update/delete of
//!   transactions and categories
//! - `Gateway` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Implementations: `SqliteGateway` (local file), `RestGateway` (hosted
//!   PostgREST-style backend), `MockGateway` (in-memory, for tests)
//!
//! # Configuration
//!
//! Selected by the `[gateway]` config section or `TALLY_GATEWAY`
//! (sqlite, rest, mock). Default: sqlite

mod mock;
mod rest;
mod sqlite;

pub use mock::MockGateway;
pub use rest::RestGateway;
pub use sqlite::SqliteGateway;

use async_trait::async_trait;

use crate::config::{GatewayBackend, GatewayConfig};
use crate::error::{Error, Result};
use crate::models::{Category, NewTransaction, Transaction, TransactionUpdate};

/// Trait defining the interface for all persistence backends
///
/// Every call is scoped to `owner`; implementations must never return or
/// modify another owner's rows. Update and delete of an id the owner does not
/// have return `Error::NotFound`.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// All transactions of the owner, newest `created_at` first
    async fn fetch_transactions(&self, owner: &str) -> Result<Vec<Transaction>>;

    /// All categories of the owner
    async fn fetch_categories(&self, owner: &str) -> Result<Vec<Category>>;

    /// Insert a transaction and return the stored row
    async fn insert_transaction(&self, owner: &str, tx: &NewTransaction) -> Result<Transaction>;

    /// Patch a transaction and return the stored row
    async fn update_transaction(
        &self,
        owner: &str,
        id: i64,
        update: &TransactionUpdate,
    ) -> Result<Transaction>;

    async fn delete_transaction(&self, owner: &str, id: i64) -> Result<()>;

    /// Insert a category and return the stored row
    async fn insert_category(&self, owner: &str, name: &str) -> Result<Category>;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}

/// Concrete gateway enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum Gateway {
    /// Local SQLite database
    Sqlite(SqliteGateway),
    /// Hosted REST backend
    Rest(RestGateway),
    /// In-memory backend for testing
    Mock(MockGateway),
}

impl Gateway {
    /// Build the gateway selected by the configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        match config.backend {
            GatewayBackend::Sqlite => {
                let path = config.db_path.to_str().ok_or_else(|| {
                    Error::Config(format!(
                        "Database path is not valid UTF-8: {}",
                        config.db_path.display()
                    ))
                })?;
                Ok(Gateway::Sqlite(SqliteGateway::open(path)?))
            }
            GatewayBackend::Rest => {
                let url = config.rest_url.as_deref().ok_or_else(|| {
                    Error::Config("REST gateway selected but no rest_url configured".into())
                })?;
                let api_key = config.rest_api_key.as_deref().ok_or_else(|| {
                    Error::Config("REST gateway selected but no rest_api_key configured".into())
                })?;
                let gateway = RestGateway::new(url, api_key, config.timeout)?;
                Ok(Gateway::Rest(match config.rest_access_token.as_deref() {
                    Some(token) => gateway.with_access_token(token),
                    None => gateway,
                }))
            }
            GatewayBackend::Mock => Ok(Gateway::Mock(MockGateway::new())),
        }
    }

    /// Create a mock gateway for testing
    pub fn mock() -> Self {
        Gateway::Mock(MockGateway::new())
    }
}

// Implement PersistenceGateway for Gateway by delegating to the inner backend
#[async_trait]
impl PersistenceGateway for Gateway {
    async fn fetch_transactions(&self, owner: &str) -> Result<Vec<Transaction>> {
        match self {
            Gateway::Sqlite(g) => g.fetch_transactions(owner).await,
            Gateway::Rest(g) => g.fetch_transactions(owner).await,
            Gateway::Mock(g) => g.fetch_transactions(owner).await,
        }
    }

    async fn fetch_categories(&self, owner: &str) -> Result<Vec<Category>> {
        match self {
            Gateway::Sqlite(g) => g.fetch_categories(owner).await,
            Gateway::Rest(g) => g.fetch_categories(owner).await,
            Gateway::Mock(g) => g.fetch_categories(owner).await,
        }
    }

    async fn insert_transaction(&self, owner: &str, tx: &NewTransaction) -> Result<Transaction> {
        match self {
            Gateway::Sqlite(g) => g.insert_transaction(owner, tx).await,
            Gateway::Rest(g) => g.insert_transaction(owner, tx).await,
            Gateway::Mock(g) => g.insert_transaction(owner, tx).await,
        }
    }

    async fn update_transaction(
        &self,
        owner: &str,
        id: i64,
        update: &TransactionUpdate,
    ) -> Result<Transaction> {
        match self {
            Gateway::Sqlite(g) => g.update_transaction(owner, id, update).await,
            Gateway::Rest(g) => g.update_transaction(owner, id, update).await,
            Gateway::Mock(g) => g.update_transaction(owner, id, update).await,
        }
    }

    async fn delete_transaction(&self, owner: &str, id: i64) -> Result<()> {
        match self {
            Gateway::Sqlite(g) => g.delete_transaction(owner, id).await,
            Gateway::Rest(g) => g.delete_transaction(owner, id).await,
            Gateway::Mock(g) => g.delete_transaction(owner, id).await,
        }
    }

    async fn insert_category(&self, owner: &str, name: &str) -> Result<Category> {
        match self {
            Gateway::Sqlite(g) => g.insert_category(owner, name).await,
            Gateway::Rest(g) => g.insert_category(owner, name).await,
            Gateway::Mock(g) => g.insert_category(owner, name).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Gateway::Sqlite(g) => g.name(),
            Gateway::Rest(g) => g.name(),
            Gateway::Mock(g) => g.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionKind;

    #[test]
    fn test_gateway_mock() {
        let gateway = Gateway::mock();
        assert_eq!(gateway.name(), "mock");
    }

    #[test]
    fn test_from_config_rest_requires_url() {
        let config = GatewayConfig {
            backend: GatewayBackend::Rest,
            rest_url: None,
            ..Default::default()
        };
        let result = Gateway::from_config(&config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_config_mock() {
        let config = GatewayConfig {
            backend: GatewayBackend::Mock,
            ..Default::default()
        };
        let gateway = Gateway::from_config(&config).unwrap();
        assert_eq!(gateway.name(), "mock");
    }

    #[tokio::test]
    async fn test_delegation_reaches_inner_backend() {
        let gateway = Gateway::mock();
        let tx = gateway
            .insert_transaction("owner", &NewTransaction::new("Pay", 10.0, TransactionKind::Income))
            .await
            .unwrap();
        let all = gateway.fetch_transactions("owner").await.unwrap();
        assert_eq!(all, vec![tx]);
    }
}
