use anyhow::Result;
use clap::Parser;
use std::sync::{Arc, Mutex};
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use songlens_server::analysis::llm::{is_usable_api_key, OpenAIProvider};
use songlens_server::analysis::LyricsAnalyzer;
use songlens_server::cache::{run_cache_sweeper, Cache, InMemoryCache};
use songlens_server::config;
use songlens_server::lyrics::{LyricsFetcher, MusixmatchClient};
use songlens_server::pipeline::{AnalysisOrchestrator, Dispatcher, WorkerPoolDispatcher};
use songlens_server::server::{run_server, RequestsLoggingLevel, ServerConfig, SongServices};
use songlens_server::song::{SongStore, SqliteSongStore};
use songlens_server::user::{SqliteUserStore, UserManager};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing database files (user.db, songs.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// API key of the lyrics service.
    #[clap(long, env = "MUSIXMATCH_API_KEY", hide_env_values = true)]
    pub musixmatch_api_key: Option<String>,

    /// API key of the OpenAI-compatible LLM service.
    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// LLM model used for the analysis.
    #[clap(long, env = "OPENAI_MODEL")]
    pub openai_model: Option<String>,

    /// Maximum number of analyses running at the same time.
    #[clap(long)]
    pub max_concurrent_runs: Option<usize>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            lyrics_api_key: args.musixmatch_api_key.clone(),
            llm_api_key: args.openai_api_key.clone(),
            llm_model: args.openai_model.clone(),
            max_concurrent_runs: args.max_concurrent_runs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  port: {}", app_config.port);
    info!("  lyrics api: {}", app_config.lyrics.base_url);
    info!(
        "  llm api: {} (model {})",
        app_config.llm.base_url, app_config.llm.model
    );
    info!(
        "  max concurrent runs: {}",
        app_config.pipeline.max_concurrent_runs
    );
    if app_config.lyrics.api_key.is_empty() {
        error!("No lyrics API key configured, every lyrics fetch will fail");
    }
    if !is_usable_api_key(app_config.llm.api_key.as_deref()) {
        error!("LLM API key is missing or is a project key, every analysis will fail");
    }

    info!("Opening user database at {:?}", app_config.user_db_path());
    let user_store = Arc::new(SqliteUserStore::new(app_config.user_db_path())?);
    let user_manager = Arc::new(Mutex::new(UserManager::new(user_store)));

    info!("Opening songs database at {:?}", app_config.songs_db_path());
    let song_store: Arc<dyn SongStore> =
        Arc::new(SqliteSongStore::new(app_config.songs_db_path())?);

    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
    let lyrics_fetcher = Arc::new(LyricsFetcher::new(
        Arc::new(MusixmatchClient::new(
            app_config.lyrics.base_url.clone(),
            app_config.lyrics.api_key.clone(),
            app_config.lyrics.timeout(),
        )),
        cache.clone(),
        app_config.lyrics.cache_ttl(),
    ));
    let analyzer = Arc::new(LyricsAnalyzer::new(
        Arc::new(OpenAIProvider::new(
            app_config.llm.base_url.clone(),
            app_config.llm.model.clone(),
            app_config.llm.api_key.clone(),
        )),
        cache.clone(),
        app_config.llm.completion_options(),
        app_config.llm.cache_ttl(),
    ));
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        song_store.clone(),
        lyrics_fetcher.clone(),
        analyzer,
    ));
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(WorkerPoolDispatcher::new(
        orchestrator,
        song_store.clone(),
        app_config.pipeline.max_concurrent_runs,
    ));

    let shutdown_token = CancellationToken::new();
    tokio::spawn(run_cache_sweeper(
        cache.clone(),
        app_config.cache.sweep_interval(),
        shutdown_token.child_token(),
    ));

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        verify_songs_on_create: app_config.lyrics.verify_on_create,
    };
    let services = SongServices {
        song_store,
        lyrics_fetcher,
        dispatcher,
    };

    tokio::select! {
        result = run_server(server_config, user_manager, services, shutdown_token.child_token()) => {
            shutdown_token.cancel();
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            Ok(())
        }
    }
}
