use super::{LyricsError, LyricsProvider};
use crate::cache::{lyrics_cache_key, Cache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const MESSAGE_FROM_CACHE: &str = "Lyrics fetched from cache";
pub const MESSAGE_FETCHED: &str = "Lyrics fetched successfully";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedLyrics {
    pub lyrics: String,
    pub message: &'static str,
}

pub struct LyricsFetcher {
    provider: Arc<dyn LyricsProvider>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl LyricsFetcher {
    pub fn new(
        provider: Arc<dyn LyricsProvider>,
        cache: Arc<dyn Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            cache_ttl,
        }
    }

    /// Returns the lyrics for a song, from the cache when possible.
    /// Provider results with an empty body are failures and are not cached.
    pub async fn fetch_lyrics(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<FetchedLyrics, LyricsError> {
        let cache_key = lyrics_cache_key(artist, title);
        if let Some(lyrics) = self.cache.get(&cache_key).filter(|l| !l.is_empty()) {
            info!("Lyrics for {} - {} fetched from cache", artist, title);
            return Ok(FetchedLyrics {
                lyrics,
                message: MESSAGE_FROM_CACHE,
            });
        }

        let lyrics = match self.provider.get_lyrics(artist, title).await {
            Ok(lyrics) => lyrics,
            Err(err) => {
                warn!(
                    "{} failed to fetch lyrics for {} - {}: {}",
                    self.provider.name(),
                    artist,
                    title,
                    err
                );
                return Err(err);
            }
        };
        if lyrics.trim().is_empty() {
            warn!("No lyrics found for {} - {}", artist, title);
            return Err(LyricsError::NoLyrics);
        }

        self.cache.set(&cache_key, lyrics.clone(), self.cache_ttl);
        info!("Lyrics for {} - {} fetched from API and cached", artist, title);
        Ok(FetchedLyrics {
            lyrics,
            message: MESSAGE_FETCHED,
        })
    }

    /// Drops the cached lyrics of a song so the next fetch hits the provider.
    pub fn forget(&self, artist: &str, title: &str) -> bool {
        self.cache.delete(&lyrics_cache_key(artist, title))
    }

    /// Asks the provider whether the song exists, `Err` carries the reason
    /// it cannot be analyzed.
    pub async fn check_song_exists(&self, artist: &str, title: &str) -> Result<(), LyricsError> {
        match self.provider.track_exists(artist, title).await? {
            true => Ok(()),
            false => Err(LyricsError::NotFound),
        }
    }
}
