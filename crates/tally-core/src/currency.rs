//! Currency selection, conversion and display formatting

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default display currency
pub const DEFAULT_CURRENCY: &str = "USD";

/// Symbols for commonly used currencies; other valid codes are shown as a prefix
const SYMBOLS: &[(&str, &str)] = &[
    ("USD", "$"),
    ("EUR", "€"),
    ("GBP", "£"),
    ("JPY", "¥"),
    ("CNY", "CN¥"),
    ("INR", "₹"),
    ("KRW", "₩"),
    ("CAD", "CA$"),
    ("AUD", "A$"),
    ("ILS", "₪"),
    ("BRL", "R$"),
    ("MXN", "MX$"),
];

/// Selected display currency and its conversion rate from the base currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencySettings {
    pub selected: String,
    /// Units of base currency per unit of `selected`
    pub rate: Option<f64>,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            selected: DEFAULT_CURRENCY.to_string(),
            rate: None,
        }
    }
}

impl CurrencySettings {
    pub fn new(selected: &str, rate: Option<f64>) -> Self {
        Self {
            selected: selected.trim().to_uppercase(),
            rate,
        }
    }

    pub fn convert(&self, amount: f64) -> f64 {
        convert_amount(amount, self.rate)
    }

    pub fn format(&self, amount: f64) -> String {
        format_currency(self.convert(amount), &self.selected)
    }
}

/// Divide by the rate when one is set and usable; otherwise return the amount.
///
/// Zero, negative and non-finite rates are ignored so the result can never be
/// infinite, NaN or sign-flipped.
pub fn convert_amount(amount: f64, rate: Option<f64>) -> f64 {
    match rate {
        Some(r) if r.is_finite() && r > 0.0 => amount / r,
        Some(r) => {
            debug!(rate = r, "Ignoring unusable conversion rate");
            amount
        }
        None => amount,
    }
}

fn is_valid_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// Format with two decimals and thousands separators, e.g. `-$1,234.50`.
///
/// Invalid currency codes fall back to `"{code} {value:.2}"`.
pub fn format_currency(value: f64, code: &str) -> String {
    if !is_valid_code(code) || !value.is_finite() {
        return format!("{} {:.2}", code, value);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let digits = group_thousands(value.abs());

    match SYMBOLS.iter().find(|(c, _)| *c == code) {
        Some((_, symbol)) => format!("{}{}{}", sign, symbol, digits),
        None => format!("{}{} {}", sign, code, digits),
    }
}

fn group_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}.{}", grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_amount() {
        assert_eq!(convert_amount(100.0, Some(2.0)), 50.0);
        assert_eq!(convert_amount(100.0, None), 100.0);
    }

    #[test]
    fn test_convert_amount_rejects_unusable_rates() {
        assert_eq!(convert_amount(100.0, Some(0.0)), 100.0);
        assert_eq!(convert_amount(100.0, Some(-4.0)), 100.0);
        assert_eq!(convert_amount(100.0, Some(f64::NAN)), 100.0);
        assert_eq!(convert_amount(100.0, Some(f64::INFINITY)), 100.0);
    }

    #[test]
    fn test_format_known_symbols() {
        assert_eq!(format_currency(1234.5, "USD"), "$1,234.50");
        assert_eq!(format_currency(-40.0, "EUR"), "-€40.00");
        assert_eq!(format_currency(0.0, "GBP"), "£0.00");
        assert_eq!(format_currency(1234567.891, "USD"), "$1,234,567.89");
    }

    #[test]
    fn test_format_other_and_invalid_codes() {
        assert_eq!(format_currency(999.0, "SAR"), "SAR 999.00");
        assert_eq!(format_currency(1000.0, "SAR"), "SAR 1,000.00");
        assert_eq!(format_currency(1000.0, "dollars"), "dollars 1000.00");
    }

    #[test]
    fn test_settings_convert_and_format() {
        let settings = CurrencySettings::new("eur", Some(2.0));
        assert_eq!(settings.selected, "EUR");
        assert_eq!(settings.convert(10.0), 5.0);
        assert_eq!(settings.format(3000.0), "€1,500.00");
        assert_eq!(CurrencySettings::default().selected, "USD");
    }
}
