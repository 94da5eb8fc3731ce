//! Whole-day spans like "10d" or "1w".
//!
//! The engine works at date precision, so configuration windows are counted
//! in days rather than in arbitrary durations.

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a day span: `"10d"`, `"2w"`, or a bare number of days.
///
/// # Examples
///
/// ```
/// use thinmint::days::parse_days;
///
/// assert_eq!(parse_days("10d").unwrap(), 10);
/// assert_eq!(parse_days("1w").unwrap(), 7);
/// assert_eq!(parse_days("30").unwrap(), 30);
/// ```
pub fn parse_days(s: &str) -> Result<u32> {
    let s = s.trim().to_lowercase();
    let (num, multiplier) = if let Some(n) = s.strip_suffix('w') {
        (n, 7)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 1)
    } else {
        (s.as_str(), 1)
    };

    let num: u32 = num
        .trim()
        .parse()
        .with_context(|| format!("Invalid day count: {s:?}"))?;
    num.checked_mul(multiplier)
        .context("Day count is too large")
}

/// Render a day span, preferring weeks when it divides evenly.
///
/// ```
/// use thinmint::days::format_days;
///
/// assert_eq!(format_days(14), "2w");
/// assert_eq!(format_days(10), "10d");
/// ```
pub fn format_days(days: u32) -> String {
    if days > 0 && days % 7 == 0 {
        format!("{}w", days / 7)
    } else {
        format!("{days}d")
    }
}

/// Serde deserializer accepting either a day-span string or an integer.
///
/// Use with `#[serde(deserialize_with = "deserialize_days")]`.
pub fn deserialize_days<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Count(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Count(n) => Ok(n),
        Raw::Text(s) => parse_days(&s).map_err(de::Error::custom),
    }
}
