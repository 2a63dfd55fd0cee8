//! Songlens server library
//!
//! Song lyrics analysis service: songs registered by users get their lyrics
//! fetched and summarized in the background. This library exposes the
//! internal modules to the binaries and to the end-to-end tests.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod lyrics;
pub mod pipeline;
pub mod server;
pub mod song;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use server::{run_server, RequestsLoggingLevel};
pub use song::{SongStore, SqliteSongStore};
pub use user::{SqliteUserStore, UserRole, UserStore};
