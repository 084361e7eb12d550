//! # Cache System
//!
//! Persistent per-URL storage of raw response bodies, so repeated runs
//! avoid re-downloading static resources.

mod file;
mod key;

pub use file::DiskCache;
pub use key::CacheKey;
