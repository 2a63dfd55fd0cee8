use crate::analysis::LyricsAnalyzer;
use crate::lyrics::LyricsFetcher;
use crate::song::{SongStatus, SongStore};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// How a single analysis run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The song was left in `Error` state with this message.
    Failed(String),
    NotFound,
}

/// Drives one song through fetch, analysis and persistence, recording each
/// status transition on the song.
pub struct AnalysisOrchestrator {
    song_store: Arc<dyn SongStore>,
    fetcher: Arc<LyricsFetcher>,
    analyzer: Arc<LyricsAnalyzer>,
}

impl AnalysisOrchestrator {
    pub fn new(
        song_store: Arc<dyn SongStore>,
        fetcher: Arc<LyricsFetcher>,
        analyzer: Arc<LyricsAnalyzer>,
    ) -> Self {
        Self {
            song_store,
            fetcher,
            analyzer,
        }
    }

    pub async fn run(&self, song_id: &str) -> RunOutcome {
        let start = Instant::now();
        let outcome = match self.try_run(song_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let message = format!("Unexpected error during analysis: {}", err);
                error!("Song {}: {}", song_id, message);
                if let Err(e) =
                    self.song_store
                        .update_status(song_id, SongStatus::Error, Some(&message))
                {
                    error!("Failed to record error state for song {}: {}", song_id, e);
                }
                RunOutcome::Failed(message)
            }
        };
        info!(
            "Analysis run for song {} finished in {:?}: {:?}",
            song_id,
            start.elapsed(),
            outcome
        );
        outcome
    }

    /// Drops the cached lyrics and analysis of a song and puts it back in
    /// `Pending`, so the next run goes through the whole pipeline again.
    /// Returns false when the song no longer exists.
    pub fn forget_cached(&self, song_id: &str) -> Result<bool> {
        let Some(song) = self.song_store.get_song(song_id)? else {
            return Ok(false);
        };
        self.fetcher.forget(&song.artist, &song.title);
        if let Some(lyrics) = song.lyrics.as_deref() {
            self.analyzer.forget(lyrics);
        }
        self.song_store.reset_for_reanalysis(song_id)
    }

    async fn try_run(&self, song_id: &str) -> Result<RunOutcome> {
        let Some(song) = self.song_store.get_song(song_id)? else {
            error!("Song {} not found, nothing to analyze", song_id);
            return Ok(RunOutcome::NotFound);
        };

        self.song_store
            .update_status(song_id, SongStatus::Processing, None)?;

        let lyrics = match self.fetcher.fetch_lyrics(&song.artist, &song.title).await {
            Ok(fetched) => {
                info!("Song {}: {}", song_id, fetched.message);
                fetched.lyrics
            }
            Err(err) => {
                return self.fail(song_id, format!("Failed to fetch lyrics: {}", err));
            }
        };
        self.song_store.set_lyrics(song_id, &lyrics)?;

        let analysis = match self.analyzer.analyze_lyrics(&lyrics).await {
            Ok(outcome) => {
                info!("Song {}: {}", song_id, outcome.message);
                outcome.analysis
            }
            Err(err) => {
                return self.fail(song_id, format!("Failed to analyze lyrics: {}", err));
            }
        };

        self.song_store
            .complete_analysis(song_id, &analysis.summary, &analysis.countries)?;
        Ok(RunOutcome::Completed)
    }

    fn fail(&self, song_id: &str, message: String) -> Result<RunOutcome> {
        warn!("Song {}: {}", song_id, message);
        self.song_store
            .update_status(song_id, SongStatus::Error, Some(&message))?;
        Ok(RunOutcome::Failed(message))
    }
}
