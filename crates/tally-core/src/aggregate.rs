//! Totals and breakdowns over a transaction set
//!
//! Amounts are accumulated as integer cents, so sums do not depend on input
//! order and `balance == income - expenses` holds exactly. Sums saturate at
//! the `i64` range.

use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;

use crate::filter::local_date;
use crate::models::{Priority, Transaction, TransactionKind};

/// Convert an amount to cents, rounding half away from zero
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Income, expenses and balance of a transaction set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub income_cents: i64,
    pub expense_cents: i64,
}

impl Totals {
    pub fn add(&mut self, tx: &Transaction) {
        let cents = to_cents(tx.amount);
        match tx.kind {
            TransactionKind::Income => {
                self.income_cents = self.income_cents.saturating_add(cents)
            }
            TransactionKind::Expense => {
                self.expense_cents = self.expense_cents.saturating_add(cents)
            }
        }
    }

    pub fn balance_cents(&self) -> i64 {
        self.income_cents.saturating_sub(self.expense_cents)
    }

    pub fn total_income(&self) -> f64 {
        from_cents(self.income_cents)
    }

    pub fn total_expenses(&self) -> f64 {
        from_cents(self.expense_cents)
    }

    pub fn balance(&self) -> f64 {
        from_cents(self.balance_cents())
    }
}

/// Sum income and expenses of the given transactions
pub fn aggregates(transactions: &[Transaction]) -> Totals {
    let mut totals = Totals::default();
    for tx in transactions {
        totals.add(tx);
    }
    totals
}

/// Totals over every transaction on or before `end` (local day)
pub fn balance_as_of(transactions: &[Transaction], end: NaiveDate, offset: FixedOffset) -> Totals {
    let mut totals = Totals::default();
    for tx in transactions.iter().filter(|tx| local_date(tx, offset) <= end) {
        totals.add(tx);
    }
    totals
}

/// Carry-over: totals over every transaction strictly before `start`
pub fn opening_balance(
    transactions: &[Transaction],
    start: NaiveDate,
    offset: FixedOffset,
) -> Totals {
    let mut totals = Totals::default();
    for tx in transactions.iter().filter(|tx| local_date(tx, offset) < start) {
        totals.add(tx);
    }
    totals
}

/// One group of an expense breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownEntry<K> {
    pub key: K,
    pub amount_cents: i64,
    pub transaction_count: usize,
    /// Share of the total expenses, 0-100
    pub percentage: f64,
}

impl<K> BreakdownEntry<K> {
    pub fn amount(&self) -> f64 {
        from_cents(self.amount_cents)
    }
}

/// Expenses grouped by category (None = uncategorized), largest first
pub fn expenses_by_category(transactions: &[Transaction]) -> Vec<BreakdownEntry<Option<i64>>> {
    expense_breakdown(transactions, |tx| tx.category_id)
}

/// Expenses grouped by priority (None = unset), largest first
pub fn expenses_by_priority(
    transactions: &[Transaction],
) -> Vec<BreakdownEntry<Option<Priority>>> {
    expense_breakdown(transactions, |tx| tx.priority)
}

fn expense_breakdown<K, F>(transactions: &[Transaction], key_of: F) -> Vec<BreakdownEntry<K>>
where
    K: Ord + Copy,
    F: Fn(&Transaction) -> K,
{
    let mut groups: BTreeMap<K, (i64, usize)> = BTreeMap::new();
    let mut total = 0i64;

    for tx in transactions.iter().filter(|tx| tx.is_expense()) {
        let cents = to_cents(tx.amount);
        let entry = groups.entry(key_of(tx)).or_insert((0, 0));
        entry.0 = entry.0.saturating_add(cents);
        entry.1 += 1;
        total = total.saturating_add(cents);
    }

    let mut entries: Vec<BreakdownEntry<K>> = groups
        .into_iter()
        .map(|(key, (amount_cents, transaction_count))| BreakdownEntry {
            key,
            amount_cents,
            transaction_count,
            percentage: if total > 0 {
                amount_cents as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();

    // Stable sort keeps key order for equal amounts
    entries.sort_by(|a, b| b.amount_cents.cmp(&a.amount_cents));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn tx(id: i64, amount: f64, kind: TransactionKind, created_at: &str) -> Transaction {
        Transaction {
            id,
            user_id: "u".to_string(),
            description: format!("tx {}", id),
            amount,
            kind,
            category_id: None,
            created_at: DateTime::parse_from_rfc3339(created_at)
                .unwrap()
                .with_timezone(&Utc),
            priority: None,
        }
    }

    #[test]
    fn test_totals_and_balance() {
        let txs = vec![
            tx(1, 100.0, TransactionKind::Income, "2024-01-05T10:00:00Z"),
            tx(2, 40.0, TransactionKind::Expense, "2024-01-20T10:00:00Z"),
        ];
        let totals = aggregates(&txs);
        assert_eq!(totals.total_income(), 100.0);
        assert_eq!(totals.total_expenses(), 40.0);
        assert_eq!(totals.balance(), 60.0);
    }

    #[test]
    fn test_huge_amounts_saturate() {
        let txs = vec![
            tx(1, 5e16, TransactionKind::Income, "2024-01-05T10:00:00Z"),
            tx(2, 5e16, TransactionKind::Income, "2024-01-06T10:00:00Z"),
            tx(3, 5e16, TransactionKind::Expense, "2024-01-07T10:00:00Z"),
            tx(4, 5e16, TransactionKind::Expense, "2024-01-08T10:00:00Z"),
        ];

        let totals = aggregates(&txs);
        assert_eq!(totals.income_cents, i64::MAX);
        assert_eq!(totals.expense_cents, i64::MAX);
        assert_eq!(totals.balance_cents(), 0);

        let by_category = expenses_by_category(&txs);
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].amount_cents, i64::MAX);
        assert_eq!(by_category[0].transaction_count, 2);
    }

    #[test]
    fn test_empty_set_is_zero() {
        let totals = aggregates(&[]);
        assert_eq!(totals, Totals::default());
        assert_eq!(totals.balance(), 0.0);
    }

    #[test]
    fn test_order_independent_and_exact() {
        let amounts = [0.1, 0.2, 0.3, 19.99, 1e6, 0.07, 33.33];
        let mut txs: Vec<Transaction> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let kind = if i % 2 == 0 {
                    TransactionKind::Income
                } else {
                    TransactionKind::Expense
                };
                tx(i as i64, *a, kind, "2024-01-01T00:00:00Z")
            })
            .collect();

        let forward = aggregates(&txs);
        txs.reverse();
        let backward = aggregates(&txs);
        txs.rotate_left(3);
        let rotated = aggregates(&txs);

        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
        assert_eq!(
            forward.balance_cents(),
            forward.income_cents - forward.expense_cents
        );
    }

    #[test]
    fn test_to_cents_rounding() {
        assert_eq!(to_cents(19.99), 1999);
        assert_eq!(to_cents(0.1 + 0.2), 30);
        assert_eq!(to_cents(0.005), 1);
        assert_eq!(from_cents(1999), 19.99);
    }

    #[test]
    fn test_balance_as_of_and_opening_balance() {
        let txs = vec![
            tx(1, 500.0, TransactionKind::Income, "2023-12-15T10:00:00Z"),
            tx(2, 200.0, TransactionKind::Expense, "2023-12-31T23:59:59Z"),
            tx(3, 100.0, TransactionKind::Income, "2024-01-05T10:00:00Z"),
            tx(4, 40.0, TransactionKind::Expense, "2024-01-20T10:00:00Z"),
        ];
        let jan_1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan_10 = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

        let opening = opening_balance(&txs, jan_1, utc());
        assert_eq!(opening.balance(), 300.0);

        let as_of = balance_as_of(&txs, jan_10, utc());
        assert_eq!(as_of.total_income(), 600.0);
        assert_eq!(as_of.total_expenses(), 200.0);
        assert_eq!(as_of.balance(), 400.0);
    }

    #[test]
    fn test_expenses_by_category() {
        let mut a = tx(1, 30.0, TransactionKind::Expense, "2024-01-01T00:00:00Z");
        a.category_id = Some(1);
        let mut b = tx(2, 50.0, TransactionKind::Expense, "2024-01-02T00:00:00Z");
        b.category_id = Some(2);
        let mut c = tx(3, 20.0, TransactionKind::Expense, "2024-01-03T00:00:00Z");
        c.category_id = Some(1);
        let income = tx(4, 999.0, TransactionKind::Income, "2024-01-03T00:00:00Z");
        let uncategorized = tx(5, 0.0, TransactionKind::Expense, "2024-01-04T00:00:00Z");

        let breakdown = expenses_by_category(&[a, b, c, income, uncategorized]);
        assert_eq!(breakdown.len(), 3);
        assert_eq!(breakdown[0].key, Some(1));
        assert_eq!(breakdown[0].amount(), 50.0);
        assert_eq!(breakdown[0].transaction_count, 2);
        assert_eq!(breakdown[0].percentage, 50.0);
        assert_eq!(breakdown[1].key, Some(2));
        assert_eq!(breakdown[2].key, None);
        assert_eq!(breakdown[2].percentage, 0.0);
    }

    #[test]
    fn test_expenses_by_priority() {
        let mut a = tx(1, 10.0, TransactionKind::Expense, "2024-01-01T00:00:00Z");
        a.priority = Some(Priority::High);
        let mut b = tx(2, 30.0, TransactionKind::Expense, "2024-01-01T00:00:00Z");
        b.priority = Some(Priority::Low);

        let breakdown = expenses_by_priority(&[a, b]);
        assert_eq!(breakdown[0].key, Some(Priority::Low));
        assert_eq!(breakdown[0].percentage, 75.0);
        assert_eq!(breakdown[1].key, Some(Priority::High));
    }

    #[test]
    fn test_breakdown_of_no_expenses_is_empty() {
        let income = tx(1, 10.0, TransactionKind::Income, "2024-01-01T00:00:00Z");
        assert!(expenses_by_category(&[income]).is_empty());
    }
}
