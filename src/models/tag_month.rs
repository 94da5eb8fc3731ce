use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Signed total and count of tagged transactions for one tag in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMonthSummary {
    pub tag: String,
    /// `YYYY-MM`
    pub year_month: String,
    pub amount: Decimal,
    pub count: u64,
}

impl TagMonthSummary {
    pub fn id(&self) -> String {
        format!("{}.{}", self.tag, self.year_month)
    }
}
