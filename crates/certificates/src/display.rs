//! Fixed-locale display formatting and the lenient parsers that undo it.
//!
//! Every formatter here has a parser that accepts both raw backend values and
//! its own output, which is what makes record normalization idempotent.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

pub const CURRENCY_PREFIX: &str = "$";
pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const NOT_AVAILABLE: &str = "N/A";

/// `1234567.891` → `$1,234,567.89`.
pub fn format_money(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i128;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!(
        "{sign}{CURRENCY_PREFIX}{}.{:02}",
        group_thousands(cents / 100),
        cents % 100
    )
}

/// `12.5` → `12.50%`.
pub fn format_rate(rate: f64) -> String {
    format!("{rate:.2}%")
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.format(DATE_FORMAT).to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_text(text: Option<&str>) -> String {
    text.unwrap_or(NOT_AVAILABLE).to_string()
}

fn group_thousands(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut groups = Vec::new();
    while n > 0 {
        groups.push(n % 1000);
        n /= 1000;
    }
    let mut out = groups.pop().map(|g| g.to_string()).unwrap_or_default();
    for group in groups.iter().rev() {
        out.push_str(&format!(",{group:03}"));
    }
    out
}

/// Read a number from a JSON number or from a string carrying a currency
/// prefix, thousands separators, or a trailing percent sign.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '%' | ' '))
                .collect();
            let cleaned = cleaned.replacen(CURRENCY_PREFIX, "", 1);
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Read a date from ISO (`2024-01-05`), RFC 3339, naive datetime, or the
/// display format.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    if s.is_empty() || s == NOT_AVAILABLE {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
}

/// Read free text from a string or number; blanks and `N/A` are missing.
pub fn parse_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() || text == NOT_AVAILABLE {
        None
    } else {
        Some(text)
    }
}
