mod song_models;
mod song_store;
mod sqlite_song_store;

pub use song_models::{NewSong, PageRequest, Song, SongFilter, SongStatus};
pub use song_store::SongStore;
pub use sqlite_song_store::SqliteSongStore;
