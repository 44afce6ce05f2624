//! Formatting helpers for the printable document.
//!
//! Numbers follow Spanish conventions: `.` groups thousands and `,` separates
//! decimals. Non-finite inputs are rendered as zero so the document never shows
//! `NaN` or `inf`.

use chrono::{Datelike, NaiveDate};
use num_format::{Locale, ToFormattedString};

const MONTH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Integer with thousands separators, e.g. `1.234.567`.
pub fn format_number(value: i64) -> String {
    value.to_formatted_string(&Locale::es)
}

/// Fixed-point decimal with thousands separators, e.g. `1.234,50`.
pub fn format_decimal(value: f64, decimals: usize) -> String {
    let value = finite(value);
    let rendered = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rendered.as_str(), None),
    };
    let grouped = int_part
        .parse::<i64>()
        .map(format_number)
        .unwrap_or_else(|_| int_part.to_string());

    let sign = if value < 0.0 && rendered.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{sign}{grouped},{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Whole-peso currency, e.g. `$ 1.234.568`.
pub fn format_currency(value: f64) -> String {
    let value = finite(value).round();
    let amount = format_number(value.abs() as i64);
    if value < 0.0 {
        format!("-$ {amount}")
    } else {
        format!("$ {amount}")
    }
}

pub fn format_pct(value: f64) -> String {
    format!("{}%", format_decimal(value, 1))
}

pub fn format_pct_int(value: i64) -> String {
    format!("{value}%")
}

pub fn format_area(value: f64) -> String {
    format!("{} m²", format_decimal(value, 2))
}

/// Long Spanish date, e.g. `5 de marzo de 2025`.
pub fn format_long_date(date: NaiveDate) -> String {
    let month = MONTH_NAMES[(date.month0() as usize).min(MONTH_NAMES.len() - 1)];
    format!("{} de {} de {}", date.day(), month, date.year())
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
