use rust_decimal::{Decimal, RoundingStrategy};

/// Format a dollar amount for display, e.g. `$1,234.50` or `-$12.00`.
///
/// Rounds half away from zero to cents and always renders two decimals.
pub fn format_currency(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();

    let digits = pad_cents(&rounded.abs().to_string());
    let (int_part, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut out = String::with_capacity(digits.len() + 4);
    if negative {
        out.push('-');
    }
    out.push('$');
    out.push_str(&group_thousands(int_part));
    out.push('.');
    out.push_str(cents);
    out
}

/// Display form stored on transactions: unsigned, the sign lives in `isDebit`.
pub fn format_display_amount(value: Decimal) -> String {
    format_currency(value.abs())
}

fn group_thousands(int_part: &str) -> String {
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        out.push(ch);
        let remaining = len.saturating_sub(i + 1);
        if remaining > 0 && remaining % 3 == 0 {
            out.push(',');
        }
    }
    out
}

fn pad_cents(s: &str) -> String {
    let (int_part, frac) = s.split_once('.').unwrap_or((s, ""));
    let mut cents: String = frac.chars().take(2).collect();
    while cents.len() < 2 {
        cents.push('0');
    }
    format!("{int_part}.{cents}")
}
