//! Song records and the analysis status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of a song analysis: `Pending -> Processing -> {Completed | Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongStatus {
    Pending,
    Processing,
    Completed,
    Error,
    /// Stored status text that is not one of the known states.
    #[serde(other)]
    Unknown,
}

impl SongStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SongStatus::Pending => "pending",
            SongStatus::Processing => "processing",
            SongStatus::Completed => "completed",
            SongStatus::Error => "error",
            SongStatus::Unknown => "unknown",
        }
    }

    /// Parses a stored status, unrecognized text maps to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => SongStatus::Pending,
            "processing" => SongStatus::Processing,
            "completed" => SongStatus::Completed,
            "error" => SongStatus::Error,
            _ => SongStatus::Unknown,
        }
    }

    /// Strict parse for user supplied filters.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match SongStatus::parse(&s.to_lowercase()) {
            SongStatus::Unknown => None,
            status => Some(status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Song {
    pub id: String,
    pub artist: String,
    pub title: String,
    pub lyrics: Option<String>,
    pub summary: Option<String>,
    pub countries: Vec<String>,
    pub status: SongStatus,
    pub message: Option<String>,
    pub task_id: Option<String>,
    pub created_by: usize,
    pub created: i64,
    pub modified: i64,
}

#[derive(Debug, Clone)]
pub struct NewSong {
    pub artist: String,
    pub title: String,
    pub created_by: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SongFilter {
    /// Restricts to songs created by this user, `None` means every owner.
    pub owner: Option<usize>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub status: Option<SongStatus>,
    /// Substring matched against artist or title.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}
