//! Mock gateway for testing
//!
//! Keeps rows in memory, counts inserts and can be switched into a failing
//! mode to exercise error paths without a real backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::PersistenceGateway;
use crate::error::{Error, Result};
use crate::models::{Category, NewTransaction, Transaction, TransactionUpdate};

#[derive(Default)]
struct MockState {
    transactions: Vec<Transaction>,
    categories: Vec<Category>,
    next_id: i64,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory gateway
///
/// Clones share the same rows and counters.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
    failing: Arc<AtomicBool>,
    transaction_inserts: Arc<AtomicUsize>,
    category_inserts: Arc<AtomicUsize>,
    /// Delay applied to every call, to widen race windows in tests
    latency: Option<Duration>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fixed delay before every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed rows directly, bypassing the insert counters
    pub fn seed_transaction(&self, tx: Transaction) {
        if let Ok(mut state) = self.state.lock() {
            state.next_id = state.next_id.max(tx.id);
            state.transactions.push(tx);
        }
    }

    pub fn seed_category(&self, category: Category) {
        if let Ok(mut state) = self.state.lock() {
            state.next_id = state.next_id.max(category.id);
            state.categories.push(category);
        }
    }

    /// When set, every call fails with `Error::Gateway`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn transaction_inserts(&self) -> usize {
        self.transaction_inserts.load(Ordering::SeqCst)
    }

    pub fn category_inserts(&self) -> usize {
        self.category_inserts.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Gateway("mock gateway is failing".into()));
        }
        Ok(())
    }

    fn state(&self) -> Result<MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| Error::Gateway("mock gateway state poisoned".into()))
    }
}

fn check_category(categories: &[Category], owner: &str, category_id: Option<i64>) -> Result<()> {
    match category_id {
        Some(id) if !categories.iter().any(|c| c.id == id && c.user_id == owner) => {
            Err(Error::Gateway(format!("Unknown category {}", id)))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl PersistenceGateway for MockGateway {
    async fn fetch_transactions(&self, owner: &str) -> Result<Vec<Transaction>> {
        self.enter().await?;
        let state = self.state()?;
        let mut rows: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|tx| tx.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn fetch_categories(&self, owner: &str) -> Result<Vec<Category>> {
        self.enter().await?;
        let state = self.state()?;
        Ok(state
            .categories
            .iter()
            .filter(|c| c.user_id == owner)
            .cloned()
            .collect())
    }

    async fn insert_transaction(&self, owner: &str, tx: &NewTransaction) -> Result<Transaction> {
        self.enter().await?;
        let mut state = self.state()?;
        check_category(&state.categories, owner, tx.category_id)?;
        let row = Transaction {
            id: state.next_id(),
            user_id: owner.to_string(),
            description: tx.description.clone(),
            amount: tx.amount,
            kind: tx.kind,
            category_id: tx.category_id,
            created_at: tx.created_at.unwrap_or_else(Utc::now),
            priority: tx.priority,
        };
        state.transactions.push(row.clone());
        self.transaction_inserts.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn update_transaction(
        &self,
        owner: &str,
        id: i64,
        update: &TransactionUpdate,
    ) -> Result<Transaction> {
        self.enter().await?;
        let mut state = self.state()?;
        if let Some(category_id) = update.category_id {
            check_category(&state.categories, owner, category_id)?;
        }
        let row = state
            .transactions
            .iter_mut()
            .find(|tx| tx.id == id && tx.user_id == owner)
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;
        update.apply_to(row);
        Ok(row.clone())
    }

    async fn delete_transaction(&self, owner: &str, id: i64) -> Result<()> {
        self.enter().await?;
        let mut state = self.state()?;
        let before = state.transactions.len();
        state
            .transactions
            .retain(|tx| !(tx.id == id && tx.user_id == owner));
        if state.transactions.len() == before {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }

    async fn insert_category(&self, owner: &str, name: &str) -> Result<Category> {
        self.enter().await?;
        let mut state = self.state()?;
        let category = Category {
            id: state.next_id(),
            user_id: owner.to_string(),
            name: name.to_string(),
        };
        state.categories.push(category.clone());
        self.category_inserts.fetch_add(1, Ordering::SeqCst);
        Ok(category)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionKind;

    #[tokio::test]
    async fn test_failing_mode() {
        let gateway = MockGateway::new();
        gateway.set_failing(true);
        assert!(matches!(
            gateway.fetch_transactions("u").await,
            Err(Error::Gateway(_))
        ));
        gateway.set_failing(false);
        assert!(gateway.fetch_transactions("u").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts_inserts_across_clones() {
        let gateway = MockGateway::new();
        let clone = gateway.clone();
        clone.insert_category("u", "Food").await.unwrap();
        clone
            .insert_transaction("u", &NewTransaction::new("x", 1.0, TransactionKind::Expense))
            .await
            .unwrap();
        assert_eq!(gateway.category_inserts(), 1);
        assert_eq!(gateway.transaction_inserts(), 1);
        assert_eq!(gateway.fetch_categories("u").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_category_must_belong_to_owner() {
        let gateway = MockGateway::new();
        let theirs = gateway.insert_category("bob", "Travel").await.unwrap();

        let tx = NewTransaction::new("trip", 40.0, TransactionKind::Expense).category(Some(theirs.id));
        let result = gateway.insert_transaction("alice", &tx).await;
        assert!(matches!(result, Err(Error::Gateway(_))));

        let mine = gateway
            .insert_transaction("alice", &NewTransaction::new("lunch", 9.0, TransactionKind::Expense))
            .await
            .unwrap();
        let update = TransactionUpdate {
            category_id: Some(Some(theirs.id)),
            ..Default::default()
        };
        let result = gateway.update_transaction("alice", mine.id, &update).await;
        assert!(matches!(result, Err(Error::Gateway(_))));
        assert_eq!(gateway.fetch_transactions("alice").await.unwrap()[0].category_id, None);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let gateway = MockGateway::new();
        let result = gateway.delete_transaction("u", 7).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
