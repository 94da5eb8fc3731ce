//! Soft-delete detection by epoch tagging.
//!
//! At the start of a sync cycle every stored record is reset to
//! [`STALE_MARKER`]; every record present in the incoming batch is written
//! with [`CURRENT_MARKER`]. Whatever is still stale afterwards was dropped
//! or re-issued upstream.

pub const STALE_MARKER: i64 = 0;
pub const CURRENT_MARKER: i64 = 1;

/// A stored record carrying a generation marker.
pub trait Generational {
    fn generation_marker(&self) -> i64;
}

pub fn is_stale(record: &impl Generational, current_epoch: i64) -> bool {
    record.generation_marker() != current_epoch
}
