//! Lyrics retrieval from an external lyrics API, memoized in the cache.

mod client;
mod fetcher;

pub use client::MusixmatchClient;
pub use fetcher::{FetchedLyrics, LyricsFetcher};

use async_trait::async_trait;
use thiserror::Error;

/// Why lyrics could not be obtained. The `Display` text is what ends up in
/// the song's error message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LyricsError {
    #[error("Song not found or API error")]
    NotFound,

    #[error("No lyrics found for this song")]
    NoLyrics,

    #[error("Error fetching lyrics: request timed out")]
    Timeout,

    #[error("Error fetching lyrics: {0}")]
    Request(String),
}

/// A lyrics API backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the raw lyrics body, which may be empty when the provider
    /// knows the track but has no lyrics for it.
    async fn get_lyrics(&self, artist: &str, title: &str) -> Result<String, LyricsError>;

    /// Returns whether the provider knows a track with this artist and title.
    async fn track_exists(&self, artist: &str, title: &str) -> Result<bool, LyricsError>;
}
