//! Transaction Aggregation Store
//!
//! Holds the signed-in owner's transactions and categories in memory, the
//! global date-range filter and the local refinement filter, and derives
//! totals from them on demand.
//!
//! Every mutation goes through the gateway first. The in-memory lists are only
//! touched after the gateway succeeds, and no lock is held across a gateway
//! call, so a failed call leaves state exactly as it was.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{FixedOffset, Local, NaiveDate, Offset, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::aggregate::{self, BreakdownEntry, Totals};
use crate::error::{Error, Result};
use crate::filter::{apply_local_filters, GlobalFilter, LocalFilter};
use crate::gateway::{Gateway, PersistenceGateway};
use crate::identity::IdentityProvider;
use crate::models::{Category, NewTransaction, Priority, Transaction, TransactionUpdate};

/// Label for uncategorized income
pub const INCOME_LABEL: &str = "Income";
/// Label for uncategorized expenses and unknown category ids
pub const UNKNOWN_LABEL: &str = "N/A";

#[derive(Debug, Default)]
struct StoreState {
    transactions: Vec<Transaction>,
    categories: Vec<Category>,
    loading: bool,
    global_filter: GlobalFilter,
    local_filter: LocalFilter,
}

/// In-memory view of one owner's transactions
pub struct TransactionStore {
    gateway: Gateway,
    identity: Arc<dyn IdentityProvider>,
    state: RwLock<StoreState>,
    /// Offset that defines "local" calendar days
    offset: FixedOffset,
    /// One lock per (owner, lowercased name) while a category is being created
    category_locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl TransactionStore {
    /// Create a store using the machine's current UTC offset for day boundaries
    pub fn new(gateway: Gateway, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            gateway,
            identity,
            state: RwLock::new(StoreState::default()),
            offset: Local::now().offset().fix(),
            category_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Use a fixed offset for day boundaries
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    fn owner(&self) -> Result<String> {
        self.identity
            .current_user_id()
            .ok_or(Error::Unauthenticated)
    }

    // ========== State access ==========

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.read().await.transactions.clone()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.state.read().await.categories.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn global_filter(&self) -> GlobalFilter {
        self.state.read().await.global_filter
    }

    pub async fn set_global_filter(&self, filter: GlobalFilter) {
        self.state.write().await.global_filter = filter;
    }

    pub async fn local_filter(&self) -> LocalFilter {
        self.state.read().await.local_filter.clone()
    }

    pub async fn set_local_filter(&self, filter: LocalFilter) {
        self.state.write().await.local_filter = filter;
    }

    pub async fn reset_local_filters(&self) {
        self.state.write().await.local_filter = LocalFilter::default();
    }

    /// Clear both the global date range and the local filters
    pub async fn reset_all_filters(&self) {
        let mut state = self.state.write().await;
        state.global_filter = GlobalFilter::default();
        state.local_filter = LocalFilter::default();
    }

    // ========== Loading ==========

    /// Fetch transactions and categories for the current owner
    ///
    /// Each collection is replaced only if its own fetch succeeds. The first
    /// error is returned.
    pub async fn load(&self) -> Result<()> {
        let owner = self.owner()?;
        self.state.write().await.loading = true;

        let (transactions, categories) = tokio::join!(
            self.gateway.fetch_transactions(&owner),
            self.gateway.fetch_categories(&owner)
        );

        let mut state = self.state.write().await;
        state.loading = false;

        let mut result = Ok(());
        match transactions {
            Ok(rows) => {
                info!(count = rows.len(), gateway = self.gateway.name(), "Loaded transactions");
                state.transactions = rows;
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch transactions");
                result = Err(e);
            }
        }
        match categories {
            Ok(rows) => {
                debug!(count = rows.len(), "Loaded categories");
                state.categories = rows;
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch categories");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Reload only the transactions
    pub async fn fetch_transactions(&self) -> Result<()> {
        let owner = self.owner()?;
        self.state.write().await.loading = true;
        let fetched = self.gateway.fetch_transactions(&owner).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match fetched {
            Ok(rows) => {
                info!(count = rows.len(), "Loaded transactions");
                state.transactions = rows;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch transactions");
                Err(e)
            }
        }
    }

    /// Reload only the categories
    pub async fn fetch_categories(&self) -> Result<()> {
        let owner = self.owner()?;
        match self.gateway.fetch_categories(&owner).await {
            Ok(rows) => {
                debug!(count = rows.len(), "Loaded categories");
                self.state.write().await.categories = rows;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch categories");
                Err(e)
            }
        }
    }

    // ========== Categories ==========

    async fn find_category(&self, name: &str) -> Option<Category> {
        self.state
            .read()
            .await
            .categories
            .iter()
            .find(|c| c.matches_name(name))
            .cloned()
    }

    /// Return the category with this name (case-insensitive), creating it if needed
    ///
    /// Concurrent calls for the same owner and name insert at most once.
    pub async fn resolve_or_create_category(&self, name: &str) -> Result<Category> {
        let owner = self.owner()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Category name must not be empty".into()));
        }

        if let Some(existing) = self.find_category(name).await {
            return Ok(existing);
        }

        let key = (owner.clone(), name.to_lowercase());
        let lock = {
            let mut locks = self.category_locks.lock().await;
            locks.entry(key.clone()).or_default().clone()
        };

        let result = {
            let _guard = lock.lock().await;

            // Another caller may have created it while we waited
            match self.find_category(name).await {
                Some(existing) => Ok(existing),
                None => match self.gateway.insert_category(&owner, name).await {
                    Ok(category) => {
                        info!(id = category.id, name = %category.name, "Created category");
                        self.state.write().await.categories.push(category.clone());
                        Ok(category)
                    }
                    Err(e) => {
                        error!(error = %e, name, "Failed to create category");
                        Err(e)
                    }
                },
            }
        };

        // Drop the lock entry once nobody else is waiting on it
        let mut locks = self.category_locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&key);
        }

        result
    }

    /// Display name for a transaction's category
    pub async fn category_name(&self, tx: &Transaction) -> String {
        category_label(&self.state.read().await.categories, tx)
    }

    // ========== Mutations ==========

    /// Insert a transaction for the current owner
    pub async fn add_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        let owner = self.owner()?;
        tx.validate()?;

        let stored = self
            .gateway
            .insert_transaction(&owner, &tx)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to add transaction"))?;

        info!(id = stored.id, amount = stored.amount, kind = %stored.kind, "Added transaction");
        insert_sorted(&mut self.state.write().await.transactions, stored.clone());
        Ok(stored)
    }

    /// Resolve (or create) the named category, then insert the transaction in it
    pub async fn add_transaction_with_category(
        &self,
        tx: NewTransaction,
        category_name: &str,
    ) -> Result<Transaction> {
        tx.validate()?;
        let category = self.resolve_or_create_category(category_name).await?;
        self.add_transaction(tx.category(Some(category.id))).await
    }

    pub async fn update_transaction(
        &self,
        id: i64,
        update: TransactionUpdate,
    ) -> Result<Transaction> {
        let owner = self.owner()?;
        update.validate()?;

        let stored = self
            .gateway
            .update_transaction(&owner, id, &update)
            .await
            .inspect_err(|e| error!(error = %e, id, "Failed to update transaction"))?;

        info!(id, "Updated transaction");
        let mut state = self.state.write().await;
        match state.transactions.iter_mut().find(|t| t.id == id) {
            Some(existing) if existing.created_at == stored.created_at => {
                *existing = stored.clone();
            }
            _ => {
                state.transactions.retain(|t| t.id != id);
                insert_sorted(&mut state.transactions, stored.clone());
            }
        }
        Ok(stored)
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<()> {
        let owner = self.owner()?;

        self.gateway
            .delete_transaction(&owner, id)
            .await
            .inspect_err(|e| error!(error = %e, id, "Failed to delete transaction"))?;

        info!(id, "Deleted transaction");
        self.state.write().await.transactions.retain(|t| t.id != id);
        Ok(())
    }

    // ========== Derived views ==========

    /// Transactions inside the global date range
    pub async fn globally_filtered(&self) -> Vec<Transaction> {
        let state = self.state.read().await;
        state.global_filter.apply(&state.transactions, self.offset)
    }

    /// Globally filtered transactions refined by the local filter
    pub async fn locally_filtered(&self) -> Vec<Transaction> {
        let state = self.state.read().await;
        let global = state.global_filter.apply(&state.transactions, self.offset);
        apply_local_filters(&global, &state.local_filter, self.offset)
    }

    /// Income, expenses and balance of the globally filtered set
    pub async fn totals(&self) -> Totals {
        aggregate::aggregates(&self.globally_filtered().await)
    }

    /// Totals over everything up to the end date, or up to today without one
    pub async fn balance_as_of(&self) -> Totals {
        let state = self.state.read().await;
        let end = state
            .global_filter
            .end_date
            .unwrap_or_else(|| self.today());
        aggregate::balance_as_of(&state.transactions, end, self.offset)
    }

    /// Carry-over from before the start date; None without a start date
    pub async fn opening_balance(&self) -> Option<Totals> {
        let state = self.state.read().await;
        state
            .global_filter
            .start_date
            .map(|start| aggregate::opening_balance(&state.transactions, start, self.offset))
    }

    /// Expense breakdown of the globally filtered set by category
    pub async fn totals_by_category(&self) -> Vec<BreakdownEntry<Option<i64>>> {
        aggregate::expenses_by_category(&self.globally_filtered().await)
    }

    /// Expense breakdown of the globally filtered set by priority
    pub async fn totals_by_priority(&self) -> Vec<BreakdownEntry<Option<Priority>>> {
        aggregate::expenses_by_priority(&self.globally_filtered().await)
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Insert keeping `created_at` descending; ties go after existing rows
fn insert_sorted(transactions: &mut Vec<Transaction>, tx: Transaction) {
    let index = transactions
        .iter()
        .position(|t| t.created_at < tx.created_at)
        .unwrap_or(transactions.len());
    transactions.insert(index, tx);
}

/// Category name of a transaction, with fallbacks for missing categories
pub fn category_label(categories: &[Category], tx: &Transaction) -> String {
    match tx.category_id.and_then(|id| categories.iter().find(|c| c.id == id)) {
        Some(category) => category.name.clone(),
        None if tx.category_id.is_none() && tx.is_income() => INCOME_LABEL.to_string(),
        None => UNKNOWN_LABEL.to_string(),
    }
}
