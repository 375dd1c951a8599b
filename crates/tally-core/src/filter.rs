//! Transaction filters
//!
//! Two layers, always applied in this order:
//! - `GlobalFilter`: the date-range window that scopes both the visible list
//!   and the totals
//! - `LocalFilter`: display-only refinement (text, type, category, priority,
//!   single day) applied on top of the global result
//!
//! "Local time" is expressed as a fixed UTC offset so results are
//! reproducible regardless of the machine the code runs on.

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{Priority, Transaction, TransactionKind};

/// Calendar day of a transaction in the given local offset
pub fn local_date(tx: &Transaction, offset: FixedOffset) -> NaiveDate {
    tx.created_at.with_timezone(&offset).date_naive()
}

/// Keep transactions whose local calendar day lies in `[start, end]`.
///
/// Comparing days rather than instants keeps the whole final day, down to
/// sub-millisecond timestamps. With neither bound set the input is returned
/// unchanged. A missing bound leaves that side of the window open.
pub fn filter_by_period(
    transactions: &[Transaction],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    offset: FixedOffset,
) -> Vec<Transaction> {
    if start.is_none() && end.is_none() {
        return transactions.to_vec();
    }

    transactions
        .iter()
        .filter(|tx| {
            let day = local_date(tx, offset);
            start.map_or(true, |s| day >= s) && end.map_or(true, |e| day <= e)
        })
        .cloned()
        .collect()
}

/// Keep transactions matching every active local predicate, preserving order
pub fn apply_local_filters(
    transactions: &[Transaction],
    filter: &LocalFilter,
    offset: FixedOffset,
) -> Vec<Transaction> {
    if !filter.is_active() {
        return transactions.to_vec();
    }

    transactions
        .iter()
        .filter(|tx| filter.matches(tx, offset))
        .cloned()
        .collect()
}

/// Date-range window scoping totals and the base list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl GlobalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first day of the window (inclusive)
    pub fn start_date(mut self, date: Option<NaiveDate>) -> Self {
        self.start_date = date;
        self
    }

    /// Set the last day of the window (inclusive)
    pub fn end_date(mut self, date: Option<NaiveDate>) -> Self {
        self.end_date = date;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }

    pub fn apply(&self, transactions: &[Transaction], offset: FixedOffset) -> Vec<Transaction> {
        filter_by_period(transactions, self.start_date, self.end_date, offset)
    }
}

/// Category predicate for local filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFilter {
    #[default]
    All,
    /// Only transactions without a category
    Uncategorized,
    Id(i64),
}

impl CategoryFilter {
    fn matches(&self, category_id: Option<i64>) -> bool {
        match self {
            Self::All => true,
            Self::Uncategorized => category_id.is_none(),
            Self::Id(id) => category_id == Some(*id),
        }
    }
}

/// Display-only refinement applied after the global filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFilter {
    /// Case-insensitive substring of the description
    pub text: Option<String>,
    /// None means all types
    pub kind: Option<TransactionKind>,
    pub category: CategoryFilter,
    /// None means all priorities
    pub priority: Option<Priority>,
    /// Exact local calendar day
    pub single_date: Option<NaiveDate>,
}

impl LocalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: Option<&str>) -> Self {
        self.text = text.map(str::to_string);
        self
    }

    pub fn kind(mut self, kind: Option<TransactionKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }

    pub fn priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn single_date(mut self, date: Option<NaiveDate>) -> Self {
        self.single_date = date;
        self
    }

    fn needle(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether any predicate would exclude something
    pub fn is_active(&self) -> bool {
        self.needle().is_some()
            || self.kind.is_some()
            || self.category != CategoryFilter::All
            || self.priority.is_some()
            || self.single_date.is_some()
    }

    pub fn matches(&self, tx: &Transaction, offset: FixedOffset) -> bool {
        let text_match = self
            .needle()
            .map_or(true, |needle| tx.description.to_lowercase().contains(&needle));
        let kind_match = self.kind.map_or(true, |kind| tx.kind == kind);
        let category_match = self.category.matches(tx.category_id);
        let priority_match = self.priority.map_or(true, |p| tx.priority == Some(p));
        let date_match = self
            .single_date
            .map_or(true, |day| local_date(tx, offset) == day);

        text_match && kind_match && category_match && priority_match && date_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn tx(id: i64, description: &str, kind: TransactionKind, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            user_id: "u".to_string(),
            description: description.to_string(),
            amount: 10.0,
            kind,
            category_id: None,
            created_at,
            priority: None,
        }
    }

    fn ids(txs: &[Transaction]) -> Vec<i64> {
        txs.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_empty_bounds_is_identity() {
        let txs = vec![
            tx(1, "a", TransactionKind::Income, at("2020-01-01T00:00:00Z")),
            tx(2, "b", TransactionKind::Expense, at("2030-12-31T23:59:59Z")),
        ];
        assert_eq!(filter_by_period(&txs, None, None, utc()), txs);
        assert!(filter_by_period(&[], None, None, utc()).is_empty());
    }

    #[test]
    fn test_window_is_inclusive_at_day_boundaries() {
        let txs = vec![
            tx(1, "before", TransactionKind::Expense, at("2024-01-09T23:59:59.999Z")),
            tx(2, "first instant", TransactionKind::Expense, at("2024-01-10T00:00:00Z")),
            tx(3, "last instant", TransactionKind::Expense, at("2024-01-20T23:59:59.999Z")),
            tx(4, "after", TransactionKind::Expense, at("2024-01-21T00:00:00Z")),
        ];

        let result = filter_by_period(&txs, Some(date(2024, 1, 10)), Some(date(2024, 1, 20)), utc());
        assert_eq!(ids(&result), vec![2, 3]);
    }

    #[test]
    fn test_end_day_keeps_sub_millisecond_timestamps() {
        let txs = vec![
            tx(1, "last micros", TransactionKind::Expense, at("2024-01-10T23:59:59.999500Z")),
            tx(2, "last nanos", TransactionKind::Income, at("2024-01-10T23:59:59.999999999Z")),
            tx(3, "next day", TransactionKind::Expense, at("2024-01-11T00:00:00Z")),
        ];

        let kept = filter_by_period(&txs, None, Some(date(2024, 1, 10)), utc());
        assert_eq!(ids(&kept), vec![1, 2]);

        let from = filter_by_period(&txs, Some(date(2024, 1, 11)), None, utc());
        assert_eq!(ids(&from), vec![3]);
    }

    #[test]
    fn test_half_open_bounds() {
        let txs = vec![
            tx(1, "old", TransactionKind::Expense, at("2023-06-01T12:00:00Z")),
            tx(2, "new", TransactionKind::Expense, at("2024-06-01T12:00:00Z")),
        ];

        let start_only = filter_by_period(&txs, Some(date(2024, 1, 1)), None, utc());
        assert_eq!(ids(&start_only), vec![2]);

        let end_only = filter_by_period(&txs, None, Some(date(2023, 12, 31)), utc());
        assert_eq!(ids(&end_only), vec![1]);
    }

    #[test]
    fn test_window_uses_local_offset() {
        // 2024-01-31T23:30 UTC is already Feb 1st at UTC+2
        let txs = vec![tx(1, "late", TransactionKind::Expense, at("2024-01-31T23:30:00Z"))];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let january = filter_by_period(&txs, Some(date(2024, 1, 1)), Some(date(2024, 1, 31)), utc());
        assert_eq!(january.len(), 1);

        let january_local =
            filter_by_period(&txs, Some(date(2024, 1, 1)), Some(date(2024, 1, 31)), plus_two);
        assert!(january_local.is_empty());
    }

    #[test]
    fn test_global_filter_builder() {
        let filter = GlobalFilter::new().start_date(Some(date(2024, 1, 1)));
        assert!(!filter.is_empty());
        assert!(GlobalFilter::new().is_empty());

        let txs = vec![tx(1, "x", TransactionKind::Income, at("2023-12-31T12:00:00Z"))];
        assert!(filter.apply(&txs, utc()).is_empty());
    }

    #[test]
    fn test_local_text_filter_case_insensitive() {
        let txs = vec![
            tx(1, "Weekly GROCERIES", TransactionKind::Expense, at("2024-01-01T10:00:00Z")),
            tx(2, "Rent", TransactionKind::Expense, at("2024-01-01T10:00:00Z")),
        ];
        let filter = LocalFilter::new().text(Some("groc"));
        assert_eq!(ids(&apply_local_filters(&txs, &filter, utc())), vec![1]);

        let blank = LocalFilter::new().text(Some("   "));
        assert!(!blank.is_active());
        assert_eq!(apply_local_filters(&txs, &blank, utc()).len(), 2);
    }

    #[test]
    fn test_local_filters_are_conjunctive() {
        let mut a = tx(1, "Lunch", TransactionKind::Expense, at("2024-03-05T12:00:00Z"));
        a.category_id = Some(4);
        a.priority = Some(Priority::Low);
        let mut b = tx(2, "Lunch refund", TransactionKind::Income, at("2024-03-05T13:00:00Z"));
        b.category_id = Some(4);
        let mut c = tx(3, "Lunch", TransactionKind::Expense, at("2024-03-06T12:00:00Z"));
        c.category_id = Some(4);
        c.priority = Some(Priority::Low);
        let txs = vec![a, b, c];

        let filter = LocalFilter::new()
            .text(Some("lunch"))
            .kind(Some(TransactionKind::Expense))
            .category(CategoryFilter::Id(4))
            .priority(Some(Priority::Low))
            .single_date(Some(date(2024, 3, 5)));

        assert_eq!(ids(&apply_local_filters(&txs, &filter, utc())), vec![1]);
    }

    #[test]
    fn test_category_filter_variants() {
        let mut a = tx(1, "a", TransactionKind::Expense, at("2024-01-01T00:00:00Z"));
        a.category_id = Some(9);
        let b = tx(2, "b", TransactionKind::Expense, at("2024-01-01T00:00:00Z"));
        let txs = vec![a, b];

        let uncategorized = LocalFilter::new().category(CategoryFilter::Uncategorized);
        assert_eq!(ids(&apply_local_filters(&txs, &uncategorized, utc())), vec![2]);

        let by_id = LocalFilter::new().category(CategoryFilter::Id(9));
        assert_eq!(ids(&apply_local_filters(&txs, &by_id, utc())), vec![1]);
    }

    #[test]
    fn test_inactive_filter_preserves_order() {
        let txs = vec![
            tx(3, "c", TransactionKind::Expense, at("2024-01-03T00:00:00Z")),
            tx(1, "a", TransactionKind::Income, at("2024-01-01T00:00:00Z")),
            tx(2, "b", TransactionKind::Expense, at("2024-01-02T00:00:00Z")),
        ];
        assert_eq!(ids(&apply_local_filters(&txs, &LocalFilter::new(), utc())), vec![3, 1, 2]);
    }

    #[test]
    fn test_local_date_respects_offset() {
        let t = tx(1, "a", TransactionKind::Expense, at("2024-05-01T01:00:00Z"));
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(local_date(&t, utc()), date(2024, 5, 1));
        assert_eq!(local_date(&t, minus_five), date(2024, 4, 30));
    }
}
