//! Performance support for the runtime query path
//!
//! Hierarchy walks and conversion searches happen at most once per distinct
//! runtime type; results are memoised in the caches defined here.

pub mod cache;

pub use cache::{CacheStats, DispatchCache};
