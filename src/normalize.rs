//! Currency and date normalization for aggregator payloads.
//!
//! Everything downstream of ingest works on canonical values: signed
//! [`Decimal`] amounts, `mm/dd/yy` date strings and date-precision epoch
//! timestamps (00:00 UTC of the transaction date).

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime};
use regex::Regex;
use rust_decimal::Decimal;

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

const CANONICAL_DATE_FORMAT: &str = "%m/%d/%y";

static CANONICAL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{2}$").expect("canonical date regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid currency amount {0:?}")]
    InvalidAmount(String),
    #[error("invalid date {0:?}")]
    InvalidDate(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Parse a display currency string such as `"$1,234.56"` into a decimal.
///
/// Accepts an optional leading `-` and accounting-style parentheses for
/// negatives. The result is unsigned unless the string itself carries a sign.
pub fn parse_currency(raw: &str) -> Result<Decimal, NormalizeError> {
    let invalid = || NormalizeError::InvalidAmount(raw.to_string());

    let mut s = raw.trim();
    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        negative = true;
        s = inner.trim();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.trim_start();
    }
    let s = s.strip_prefix('$').unwrap_or(s);
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || cleaned.starts_with('-') || cleaned.starts_with('+') {
        return Err(invalid());
    }

    let value = Decimal::from_str(&cleaned).map_err(|_| invalid())?;
    Ok(if negative { -value } else { value })
}

/// Signed amount: negative for debits, positive for credits and refunds.
pub fn signed_amount(amount: &str, is_debit: bool) -> Result<Decimal, NormalizeError> {
    let value = parse_currency(amount)?;
    Ok(if is_debit { -value } else { value })
}

/// Normalize an aggregator date string.
///
/// `mm/dd/yy` is taken as-is. Short `"Mon D"` dates carry no year, so the
/// year of `today` is assumed, even when that lands in the future.
pub fn normalize_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, NormalizeError> {
    let trimmed = raw.trim();
    if CANONICAL_DATE.is_match(trimmed) {
        return parse_canonical_date(trimmed);
    }

    let with_year = format!("{trimmed} {}", today.year());
    NaiveDate::parse_from_str(&with_year, "%b %d %Y")
        .map_err(|_| NormalizeError::InvalidDate(raw.to_string()))
}

pub fn parse_canonical_date(raw: &str) -> Result<NaiveDate, NormalizeError> {
    NaiveDate::parse_from_str(raw.trim(), CANONICAL_DATE_FORMAT)
        .map_err(|_| NormalizeError::InvalidDate(raw.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE_FORMAT).to_string()
}

/// Seconds since the epoch at 00:00 UTC on `date`.
pub fn date_timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

pub fn timestamp_date(timestamp: i64) -> NaiveDate {
    DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .date_naive()
}

pub fn format_timestamp(timestamp: i64) -> String {
    format_date(timestamp_date(timestamp))
}

/// `YYYY-MM` bucket used by the tags-by-month aggregate.
pub fn year_month(timestamp: i64) -> String {
    timestamp_date(timestamp).format("%Y-%m").to_string()
}

pub fn days(n: u32) -> i64 {
    i64::from(n) * SECONDS_PER_DAY
}
