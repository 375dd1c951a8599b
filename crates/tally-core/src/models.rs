//! Domain models for Tally

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest amount accepted for a single transaction (one trillion)
pub const MAX_AMOUNT: f64 = 1e12;

/// Whether money came in or went out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-assigned importance of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn all() -> &'static [Priority] {
        &[Self::High, Self::Medium, Self::Low]
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded income or expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    /// Owner of the row
    pub user_id: String,
    pub description: String,
    /// Always non-negative; direction comes from `kind`
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// None means uncategorized
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub priority: Option<Priority>,
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.kind == TransactionKind::Income
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }
}

/// A transaction to be inserted (before the backend assigns an id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub description: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category_id: Option<i64>,
    pub priority: Option<Priority>,
    /// Defaults to the insert time when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewTransaction {
    pub fn new(description: impl Into<String>, amount: f64, kind: TransactionKind) -> Self {
        Self {
            description: description.into(),
            amount,
            kind,
            category_id: None,
            priority: None,
            created_at: None,
        }
    }

    pub fn category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::InvalidData("Description must not be empty".into()));
        }
        validate_amount(self.amount)
    }
}

/// Partial update of a transaction
///
/// `category_id` and `priority` are double options: `Some(None)` clears the
/// field, `None` leaves it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransactionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Option<Priority>>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.amount.is_none()
            && self.kind.is_none()
            && self.category_id.is_none()
            && self.priority.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidData("Update has no fields to change".into()));
        }
        if let Some(ref description) = self.description {
            if description.trim().is_empty() {
                return Err(Error::InvalidData("Description must not be empty".into()));
            }
        }
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        Ok(())
    }

    /// Apply this patch to an existing transaction
    pub fn apply_to(&self, tx: &mut Transaction) {
        if let Some(ref description) = self.description {
            tx.description = description.clone();
        }
        if let Some(amount) = self.amount {
            tx.amount = amount;
        }
        if let Some(kind) = self.kind {
            tx.kind = kind;
        }
        if let Some(category_id) = self.category_id {
            tx.category_id = category_id;
        }
        if let Some(priority) = self.priority {
            tx.priority = priority;
        }
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidData(format!(
            "Amount must be a non-negative number, got {}",
            amount
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(Error::InvalidData(format!(
            "Amount {} exceeds the maximum of {}",
            amount, MAX_AMOUNT
        )));
    }
    Ok(())
}

/// A user-defined transaction category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: String,
    pub name: String,
}

impl Category {
    /// Case-insensitive name comparison used for find-or-create
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// The signed-in identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Transaction {
        Transaction {
            id: 7,
            user_id: "user-1".to_string(),
            description: "Groceries".to_string(),
            amount: 42.5,
            kind: TransactionKind::Expense,
            category_id: Some(3),
            created_at: Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap(),
            priority: Some(Priority::High),
        }
    }

    #[test]
    fn test_transaction_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "expense");
        assert_eq!(json["priority"], "High");
        assert_eq!(json["category_id"], 3);
        assert_eq!(json["created_at"], "2024-01-05T12:00:00Z");
    }

    #[test]
    fn test_transaction_from_backend_row() {
        let row = r#"{"id":1,"user_id":"u","description":"Salary","amount":1000,
            "type":"income","category_id":null,"created_at":"2024-01-05T10:00:00.123+00:00",
            "priority":null}"#;
        let tx: Transaction = serde_json::from_str(row).unwrap();
        assert!(tx.is_income());
        assert_eq!(tx.category_id, None);
        assert_eq!(tx.priority, None);
        assert_eq!(tx.amount, 1000.0);
    }

    #[test]
    fn test_kind_and_priority_parsing() {
        assert_eq!("Income".parse::<TransactionKind>(), Ok(TransactionKind::Income));
        assert_eq!(" expense ".parse::<TransactionKind>(), Ok(TransactionKind::Expense));
        assert!("transfer".parse::<TransactionKind>().is_err());
        assert_eq!("medium".parse::<Priority>(), Ok(Priority::Medium));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_new_transaction_validation() {
        assert!(NewTransaction::new("Coffee", 3.5, TransactionKind::Expense)
            .validate()
            .is_ok());
        assert!(NewTransaction::new("Coffee", -1.0, TransactionKind::Expense)
            .validate()
            .is_err());
        assert!(NewTransaction::new("Coffee", f64::NAN, TransactionKind::Expense)
            .validate()
            .is_err());
        assert!(NewTransaction::new("  ", 1.0, TransactionKind::Expense)
            .validate()
            .is_err());
        assert!(NewTransaction::new("Big", MAX_AMOUNT, TransactionKind::Income)
            .validate()
            .is_ok());
        assert!(NewTransaction::new("Big", 5e16, TransactionKind::Income)
            .validate()
            .is_err());
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = TransactionUpdate {
            amount: Some(10.0),
            category_id: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["amount"], 10.0);
        assert!(obj["category_id"].is_null());
    }

    #[test]
    fn test_update_apply_and_validate() {
        let mut tx = sample();
        let update = TransactionUpdate {
            description: Some("Market".to_string()),
            priority: Some(None),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
        update.apply_to(&mut tx);
        assert_eq!(tx.description, "Market");
        assert_eq!(tx.priority, None);
        assert_eq!(tx.category_id, Some(3));

        assert!(TransactionUpdate::default().validate().is_err());
    }

    #[test]
    fn test_category_matches_name_case_insensitive() {
        let cat = Category {
            id: 1,
            user_id: "u".to_string(),
            name: "Food".to_string(),
        };
        assert!(cat.matches_name("food"));
        assert!(cat.matches_name(" FOOD "));
        assert!(!cat.matches_name("Foods"));
    }
}
