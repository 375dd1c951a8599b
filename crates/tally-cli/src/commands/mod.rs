//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Config loading, store setup, argument parsing helpers and init
//! - `transactions` - Transaction commands (add, list, update, delete)
//! - `summary` - Period totals, balances and breakdowns
//! - `categories` - Category commands (list, add)
//! - `locale` - Locale commands (show, generate)

pub mod categories;
pub mod core;
pub mod locale;
pub mod summary;
pub mod transactions;

// Re-export command functions for main.rs
pub use categories::*;
pub use core::*;
pub use locale::*;
pub use summary::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
