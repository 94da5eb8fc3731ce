pub mod clock;
pub mod config;
pub mod days;
pub mod engine;
pub mod format;
pub mod models;
pub mod normalize;
pub mod review;
pub mod storage;
pub mod sync;
