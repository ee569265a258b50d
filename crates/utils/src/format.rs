//! Formatting utilities for terminal output.

use chrono::{DateTime, Utc};

/// `$1,234.56`. Negative values keep the sign in front of the dollar.
pub fn format_usd(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = (value.abs() * 100.0).round() as u128;
    let whole = group_thousands(cents / 100);
    format!("{sign}${whole}.{:02}", cents % 100)
}

fn group_thousands(n: u128) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Human balance with precision scaled to magnitude.
pub fn format_balance(value: f64) -> String {
    let abs = value.abs();
    if abs == 0.0 {
        "0".to_string()
    } else if abs >= 1_000.0 {
        format!("{value:.2}")
    } else if abs >= 1.0 {
        format!("{value:.4}")
    } else {
        format!("{value:.6}")
    }
}

pub fn format_pct(pct: f64) -> String {
    format!("{pct:.2}%")
}

/// `0x1234…abcd` for display; short inputs are returned as-is.
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[address.len() - 4..])
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
