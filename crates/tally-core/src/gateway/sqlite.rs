//! SQLite gateway with connection pooling and migrations

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::PersistenceGateway;
use crate::error::{Error, Result};
use crate::models::{
    Category, NewTransaction, Priority, Transaction, TransactionKind, TransactionUpdate,
};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, description, amount, type, category_id, created_at, priority";

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Timestamps are stored as UTC RFC 3339 with millisecond precision,
/// which sorts correctly as text
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let created_at: String = row.get(6)?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        description: row.get(2)?,
        amount: row.get(3)?,
        kind: row.get(4)?,
        category_id: row.get(5)?,
        created_at: parse_timestamp(6, &created_at)?,
        priority: row.get(7)?,
    })
}

/// Local SQLite persistence
#[derive(Clone)]
pub struct SqliteGateway {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl SqliteGateway {
    /// Open (or create) a database file and run migrations
    pub fn open(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });
        let pool = Pool::builder().max_size(4).build(manager)?;

        let gateway = Self {
            pool,
            db_path: path.to_string(),
        };
        gateway.run_migrations()?;

        Ok(gateway)
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        let path = path
            .to_str()
            .ok_or_else(|| Error::Config("Temp dir path is not valid UTF-8".into()))?
            .to_string();
        Self::open(&path)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id);

            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount >= 0),
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                priority TEXT CHECK (priority IN ('High', 'Medium', 'Low'))
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_created
                ON transactions(user_id, created_at DESC);
            "#,
        )?;

        info!(path = %self.db_path, "Database ready");
        Ok(())
    }

    fn get_transaction(&self, conn: &DbConn, owner: &str, id: i64) -> Result<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
            TRANSACTION_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![id, owner], row_to_transaction)
            .optional()?)
    }

    /// Reject a category id that does not belong to `owner`
    fn check_category(&self, conn: &DbConn, owner: &str, category_id: Option<i64>) -> Result<()> {
        let Some(id) = category_id else {
            return Ok(());
        };
        let owned = conn
            .query_row(
                "SELECT 1 FROM categories WHERE id = ? AND user_id = ?",
                params![id, owner],
                |_| Ok(()),
            )
            .optional()?;
        match owned {
            Some(()) => Ok(()),
            None => Err(Error::Gateway(format!("Unknown category {}", id))),
        }
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn fetch_transactions(&self, owner: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params![owner], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    async fn fetch_categories(&self, owner: &str) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, user_id, name FROM categories WHERE user_id = ? ORDER BY id")?;
        let categories = stmt
            .query_map(params![owner], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    async fn insert_transaction(&self, owner: &str, tx: &NewTransaction) -> Result<Transaction> {
        let conn = self.conn()?;
        self.check_category(&conn, owner, tx.category_id)?;
        let created_at = tx.created_at.unwrap_or_else(Utc::now);

        conn.execute(
            r#"
            INSERT INTO transactions (user_id, description, amount, type, category_id, created_at, priority)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                owner,
                tx.description,
                tx.amount,
                tx.kind,
                tx.category_id,
                format_timestamp(&created_at),
                tx.priority,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.get_transaction(&conn, owner, id)?
            .ok_or_else(|| Error::Gateway(format!("Inserted transaction {} vanished", id)))
    }

    async fn update_transaction(
        &self,
        owner: &str,
        id: i64,
        update: &TransactionUpdate,
    ) -> Result<Transaction> {
        let conn = self.conn()?;
        let mut tx = self
            .get_transaction(&conn, owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;

        if let Some(category_id) = update.category_id {
            self.check_category(&conn, owner, category_id)?;
        }
        update.apply_to(&mut tx);

        conn.execute(
            r#"
            UPDATE transactions
            SET description = ?, amount = ?, type = ?, category_id = ?, priority = ?
            WHERE id = ? AND user_id = ?
            "#,
            params![
                tx.description,
                tx.amount,
                tx.kind,
                tx.category_id,
                tx.priority,
                id,
                owner,
            ],
        )?;

        Ok(tx)
    }

    async fn delete_transaction(&self, owner: &str, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE id = ? AND user_id = ?",
            params![id, owner],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }

    async fn insert_category(&self, owner: &str, name: &str) -> Result<Category> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (user_id, name) VALUES (?, ?)",
            params![owner, name],
        )?;
        Ok(Category {
            id: conn.last_insert_rowid(),
            user_id: owner.to_string(),
            name: name.to_string(),
        })
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expense(description: &str, amount: f64, day: u32) -> NewTransaction {
        NewTransaction::new(description, amount, TransactionKind::Expense)
            .created_at(Utc.with_ymd_and_hms(2024, 1, day, 9, 30, 0).unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_fetch_newest_first() {
        let db = SqliteGateway::in_memory().unwrap();
        db.insert_transaction("alice", &expense("first", 1.0, 1)).await.unwrap();
        db.insert_transaction("alice", &expense("third", 3.0, 3)).await.unwrap();
        db.insert_transaction("alice", &expense("second", 2.0, 2)).await.unwrap();

        let all = db.fetch_transactions("alice").await.unwrap();
        let names: Vec<&str> = all.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(names, vec!["third", "second", "first"]);
        assert_eq!(all[0].created_at, Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_rows_are_scoped_to_owner() {
        let db = SqliteGateway::in_memory().unwrap();
        let theirs = db.insert_transaction("bob", &expense("bob's", 5.0, 1)).await.unwrap();
        db.insert_category("bob", "Travel").await.unwrap();

        assert!(db.fetch_transactions("alice").await.unwrap().is_empty());
        assert!(db.fetch_categories("alice").await.unwrap().is_empty());

        let update = TransactionUpdate {
            amount: Some(1.0),
            ..Default::default()
        };
        let result = db.update_transaction("alice", theirs.id, &update).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let result = db.delete_transaction("alice", theirs.id).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(db.fetch_transactions("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = SqliteGateway::in_memory().unwrap();
        let food = db.insert_category("alice", "Food").await.unwrap();
        let tx = db.insert_transaction("alice", &expense("lunch", 12.0, 5)).await.unwrap();
        assert_eq!(tx.category_id, None);

        let update = TransactionUpdate {
            category_id: Some(Some(food.id)),
            priority: Some(Some(Priority::Medium)),
            ..Default::default()
        };
        let updated = db.update_transaction("alice", tx.id, &update).await.unwrap();
        assert_eq!(updated.category_id, Some(food.id));
        assert_eq!(updated.priority, Some(Priority::Medium));
        assert_eq!(updated.amount, 12.0);

        let stored = db.fetch_transactions("alice").await.unwrap();
        assert_eq!(stored, vec![updated]);

        db.delete_transaction("alice", tx.id).await.unwrap();
        assert!(db.fetch_transactions("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let db = SqliteGateway::in_memory().unwrap();
        let tx = expense("ghost", 1.0, 1).category(Some(999));
        let result = db.insert_transaction("alice", &tx).await;
        assert!(matches!(result, Err(Error::Gateway(_))));
    }

    #[tokio::test]
    async fn test_other_owners_category_is_rejected() {
        let db = SqliteGateway::in_memory().unwrap();
        let theirs = db.insert_category("bob", "Travel").await.unwrap();

        let tx = expense("trip", 40.0, 2).category(Some(theirs.id));
        let result = db.insert_transaction("alice", &tx).await;
        assert!(matches!(result, Err(Error::Gateway(_))));
        assert!(db.fetch_transactions("alice").await.unwrap().is_empty());

        let mine = db.insert_transaction("alice", &expense("lunch", 9.0, 3)).await.unwrap();
        let update = TransactionUpdate {
            category_id: Some(Some(theirs.id)),
            ..Default::default()
        };
        let result = db.update_transaction("alice", mine.id, &update).await;
        assert!(matches!(result, Err(Error::Gateway(_))));
        assert_eq!(db.fetch_transactions("alice").await.unwrap()[0].category_id, None);

        // Clearing the category needs no lookup
        let clear = TransactionUpdate {
            category_id: Some(None),
            ..Default::default()
        };
        assert!(db.update_transaction("alice", mine.id, &clear).await.is_ok());
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let db = SqliteGateway::in_memory().unwrap();
        db.insert_category("alice", "Rent").await.unwrap();

        let reopened = SqliteGateway::open(db.path()).unwrap();
        let categories = reopened.fetch_categories("alice").await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Rent");
    }
}
