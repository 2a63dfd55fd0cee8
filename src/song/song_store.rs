use super::song_models::{NewSong, PageRequest, Song, SongFilter, SongStatus};
use anyhow::Result;

pub trait SongStore: Send + Sync {
    /// Inserts a new song in `Pending` state and returns it.
    fn create_song(&self, new_song: &NewSong) -> Result<Song>;

    /// Returns Ok(None) if the song does not exist.
    fn get_song(&self, song_id: &str) -> Result<Option<Song>>;

    /// Case-insensitive lookup of a user's song by artist and title.
    fn find_song(&self, owner: usize, artist: &str, title: &str) -> Result<Option<Song>>;

    /// Returns the total count of songs matching `filter` and the requested page,
    /// newest first.
    fn list_songs(&self, filter: &SongFilter, page: PageRequest) -> Result<(usize, Vec<Song>)>;

    /// Sets status and message. Returns false if the song does not exist.
    fn update_status(&self, song_id: &str, status: SongStatus, message: Option<&str>)
        -> Result<bool>;

    fn set_task_id(&self, song_id: &str, task_id: &str) -> Result<bool>;

    fn set_lyrics(&self, song_id: &str, lyrics: &str) -> Result<bool>;

    /// Writes summary, countries and the `Completed` status in one transaction,
    /// clearing any message.
    fn complete_analysis(&self, song_id: &str, summary: &str, countries: &[String])
        -> Result<bool>;

    /// Moves the song back to `Pending` with no message.
    fn reset_for_reanalysis(&self, song_id: &str) -> Result<bool>;

    fn delete_song(&self, song_id: &str) -> Result<bool>;

    /// Removes every song of a user, returns how many were deleted.
    fn delete_songs_by_owner(&self, owner: usize) -> Result<usize>;
}
