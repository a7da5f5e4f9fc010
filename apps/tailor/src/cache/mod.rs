//! Checkpoint/cache engine foundations: stage fingerprints and the
//! durable, content-addressed cache store.

pub mod fingerprint;
pub mod store;

pub use fingerprint::Fingerprint;
pub use store::{CacheEntry, CacheStore};
