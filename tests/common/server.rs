//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own databases and cache.

use super::constants::*;
use super::fakes::{FakeLlmProvider, FakeLyricsProvider};
use super::fixtures::create_test_db_with_users;
use songlens_server::analysis::llm::CompletionOptions;
use songlens_server::analysis::LyricsAnalyzer;
use songlens_server::cache::{Cache, InMemoryCache};
use songlens_server::lyrics::LyricsFetcher;
use songlens_server::pipeline::{AnalysisOrchestrator, WorkerPoolDispatcher};
use songlens_server::server::state::GuardedSongStore;
use songlens_server::server::{make_app, RequestsLoggingLevel, ServerConfig, SongServices};
use songlens_server::user::{SqliteUserStore, UserManager};
use songlens_server::SqliteSongStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with isolated databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Song store for direct database access in tests
    pub song_store: GuardedSongStore,

    lyrics_calls: Arc<AtomicUsize>,
    llm_calls: Arc<AtomicUsize>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the databases cannot be created, the port cannot be bound
    /// or the server doesn't become ready within the timeout.
    pub async fn spawn() -> Self {
        Self::spawn_with_config(ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        })
        .await
    }

    /// Spawns a server that rejects songs unknown to the lyrics API.
    pub async fn spawn_verifying_songs() -> Self {
        Self::spawn_with_config(ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            verify_songs_on_create: true,
            ..Default::default()
        })
        .await
    }

    async fn spawn_with_config(mut config: ServerConfig) -> Self {
        let (temp_db_dir, user_db_path) =
            create_test_db_with_users().expect("Failed to create test database");

        let user_store =
            Arc::new(SqliteUserStore::new(&user_db_path).expect("Failed to open user store"));
        let user_manager = Arc::new(Mutex::new(UserManager::new(user_store)));

        let song_store: GuardedSongStore = Arc::new(
            SqliteSongStore::new(temp_db_dir.path().join("songs.db"))
                .expect("Failed to open song store"),
        );
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());

        let lyrics_calls = Arc::new(AtomicUsize::new(0));
        let llm_calls = Arc::new(AtomicUsize::new(0));
        let lyrics_fetcher = Arc::new(LyricsFetcher::new(
            Arc::new(FakeLyricsProvider {
                calls: lyrics_calls.clone(),
            }),
            cache.clone(),
            Duration::from_secs(3600),
        ));
        let analyzer = Arc::new(LyricsAnalyzer::new(
            Arc::new(FakeLlmProvider {
                calls: llm_calls.clone(),
            }),
            cache.clone(),
            CompletionOptions::default(),
            Duration::from_secs(3600),
        ));
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            song_store.clone(),
            lyrics_fetcher.clone(),
            analyzer,
        ));
        let dispatcher = Arc::new(WorkerPoolDispatcher::new(
            orchestrator,
            song_store.clone(),
            2,
        ));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);
        config.port = port;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let app = make_app(
            config,
            user_manager,
            SongServices {
                song_store: song_store.clone(),
                lyrics_fetcher,
                dispatcher,
            },
        )
        .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            song_store,
            lyrics_calls,
            llm_calls,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// How many times the fake lyrics API was asked for lyrics.
    pub fn lyrics_calls(&self) -> usize {
        self.lyrics_calls.load(Ordering::SeqCst)
    }

    /// How many completions the fake LLM produced.
    pub fn llm_calls(&self) -> usize {
        self.llm_calls.load(Ordering::SeqCst)
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
