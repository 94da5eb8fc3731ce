mod account;
pub mod generation;
mod id;
mod tag_month;
mod time_series;
mod transaction;

pub use account::{Account, AccountType, AggregateAccount, Performance, PerformanceWindow};
pub use generation::{is_stale, Generational, CURRENT_MARKER, STALE_MARKER};
pub use id::{Id, IdError};
pub use tag_month::TagMonthSummary;
pub use time_series::AccountTimeSeriesRecord;
pub use transaction::{PendingTranRef, Transaction, TransactionKind};
