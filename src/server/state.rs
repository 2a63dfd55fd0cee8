use axum::extract::FromRef;

use crate::lyrics::LyricsFetcher;
use crate::pipeline::Dispatcher;
use crate::song::SongStore;
use crate::user::UserManager;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUserManager = Arc<Mutex<UserManager>>;
pub type GuardedSongStore = Arc<dyn SongStore>;
pub type GuardedLyricsFetcher = Arc<LyricsFetcher>;
pub type GuardedDispatcher = Arc<dyn Dispatcher>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub user_manager: GuardedUserManager,
    pub song_store: GuardedSongStore,
    pub lyrics_fetcher: GuardedLyricsFetcher,
    pub dispatcher: GuardedDispatcher,
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}
