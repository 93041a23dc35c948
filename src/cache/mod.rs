//! In-memory caching

mod info;

pub use info::InfoCache;
