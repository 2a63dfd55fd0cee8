//! Key-value cache with per-entry expiration, shared by the request
//! handlers and the analysis workers.

mod in_memory;
mod sweeper;

pub use in_memory::InMemoryCache;
pub use sweeper::run_cache_sweeper;

use sha2::{Digest, Sha256};
use std::time::Duration;

pub trait Cache: Send + Sync {
    /// Returns the value stored under `key` unless it expired.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String, ttl: Duration);

    /// Returns true if an entry was removed.
    fn delete(&self, key: &str) -> bool;

    /// Drops every expired entry and returns how many were removed.
    fn prune_expired(&self) -> usize;
}

pub fn lyrics_cache_key(artist: &str, title: &str) -> String {
    format!(
        "lyrics_{}_{}",
        artist.to_lowercase(),
        title.to_lowercase()
    )
}

pub fn analysis_cache_key(lyrics: &str) -> String {
    format!("analysis_{:x}", Sha256::digest(lyrics.as_bytes()))
}
