mod file_config;

pub use file_config::{CacheConfig, FileConfig, LlmConfig, LyricsConfig, PipelineConfig};

use crate::analysis::llm::CompletionOptions;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LYRICS_BASE_URL: &str = "https://api.musixmatch.com/ws/1.1";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-3.5-turbo";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub lyrics_api_key: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub max_concurrent_runs: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub lyrics: LyricsSettings,
    pub llm: LlmSettings,
    pub pipeline: PipelineSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LyricsSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout_sec: u64,
    pub cache_ttl_sec: u64,
    pub verify_on_create: bool,
}

impl Default for LyricsSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LYRICS_BASE_URL.to_string(),
            api_key: String::new(),
            timeout_sec: 10,
            cache_ttl_sec: 86400, // 1 day
            verify_on_create: false,
        }
    }
}

impl LyricsSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_sec)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_sec: u64,
    pub cache_ttl_sec: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_sec: 60,
            cache_ttl_sec: 604800, // 1 week
        }
    }
}

impl LlmSettings {
    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            timeout: Duration::from_secs(self.timeout_sec),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_sec)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub max_concurrent_runs: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub sweep_interval_sec: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            sweep_interval_sec: 300,
        }
    }
}

impl CacheSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_sec)
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let lyrics_file = file.lyrics.unwrap_or_default();
        let lyrics_defaults = LyricsSettings::default();
        let lyrics = LyricsSettings {
            base_url: lyrics_file.base_url.unwrap_or(lyrics_defaults.base_url),
            api_key: lyrics_file
                .api_key
                .or_else(|| cli.lyrics_api_key.clone())
                .unwrap_or_default(),
            timeout_sec: lyrics_file.timeout_sec.unwrap_or(lyrics_defaults.timeout_sec),
            cache_ttl_sec: lyrics_file
                .cache_ttl_sec
                .unwrap_or(lyrics_defaults.cache_ttl_sec),
            verify_on_create: lyrics_file
                .verify_on_create
                .unwrap_or(lyrics_defaults.verify_on_create),
        };
        if lyrics.timeout_sec == 0 {
            bail!("lyrics.timeout_sec must be greater than 0");
        }

        let llm_file = file.llm.unwrap_or_default();
        let llm_defaults = LlmSettings::default();
        let llm = LlmSettings {
            base_url: llm_file.base_url.unwrap_or(llm_defaults.base_url),
            api_key: llm_file.api_key.or_else(|| cli.llm_api_key.clone()),
            model: llm_file
                .model
                .or_else(|| cli.llm_model.clone())
                .unwrap_or(llm_defaults.model),
            temperature: llm_file.temperature.unwrap_or(llm_defaults.temperature),
            max_tokens: llm_file.max_tokens.unwrap_or(llm_defaults.max_tokens),
            timeout_sec: llm_file.timeout_sec.unwrap_or(llm_defaults.timeout_sec),
            cache_ttl_sec: llm_file.cache_ttl_sec.unwrap_or(llm_defaults.cache_ttl_sec),
        };
        if !(0.0..=2.0).contains(&llm.temperature) {
            bail!("llm.temperature must be between 0.0 and 2.0, got {}", llm.temperature);
        }
        if llm.timeout_sec == 0 {
            bail!("llm.timeout_sec must be greater than 0");
        }

        let pipeline = PipelineSettings {
            max_concurrent_runs: file
                .pipeline
                .and_then(|p| p.max_concurrent_runs)
                .or(cli.max_concurrent_runs)
                .unwrap_or(PipelineSettings::default().max_concurrent_runs),
        };
        if pipeline.max_concurrent_runs == 0 {
            bail!("pipeline.max_concurrent_runs must be at least 1");
        }

        let cache = CacheSettings {
            sweep_interval_sec: file
                .cache
                .and_then(|c| c.sweep_interval_sec)
                .unwrap_or(CacheSettings::default().sweep_interval_sec),
        };

        if cache.sweep_interval_sec == 0 {
            bail!("cache.sweep_interval_sec must be greater than 0");
        }

        Ok(Self {
            db_dir,
            port,
            logging_level,
            frontend_dir_path,
            lyrics,
            llm,
            pipeline,
            cache,
        })
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("user.db")
    }

    pub fn songs_db_path(&self) -> PathBuf {
        self.db_dir.join("songs.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli_with_dir(dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn defaults_apply_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            port: 3001,
            lyrics_api_key: Some("mxm-key".to_string()),
            llm_api_key: Some("sk-key".to_string()),
            ..cli_with_dir(&temp_dir)
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.port, 3001);
        assert_eq!(config.lyrics.base_url, DEFAULT_LYRICS_BASE_URL);
        assert_eq!(config.lyrics.api_key, "mxm-key");
        assert_eq!(config.lyrics.timeout(), Duration::from_secs(10));
        assert_eq!(config.lyrics.cache_ttl(), Duration::from_secs(86400));
        assert!(!config.lyrics.verify_on_create);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-key"));
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.llm.cache_ttl(), Duration::from_secs(604800));
        assert_eq!(config.pipeline.max_concurrent_runs, 4);
        assert_eq!(config.cache.sweep_interval(), Duration::from_secs(300));

        let options = config.llm.completion_options();
        assert_eq!(options.max_tokens, Some(500));
        assert_eq!(options.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            port: 3001,
            logging_level: RequestsLoggingLevel::Path,
            llm_api_key: Some("sk-from-env".to_string()),
            max_concurrent_runs: Some(2),
            ..Default::default()
        };

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("body".to_string()),
            llm: Some(LlmConfig {
                api_key: Some("sk-from-file".to_string()),
                temperature: Some(0.1),
                ..Default::default()
            }),
            lyrics: Some(LyricsConfig {
                verify_on_create: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Body);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-from-file"));
        assert_eq!(config.llm.temperature, 0.1);
        assert!(config.lyrics.verify_on_create);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.pipeline.max_concurrent_runs, 2);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let cli = cli_with_dir(&temp_dir);

        let file_config = FileConfig {
            pipeline: Some(PipelineConfig {
                max_concurrent_runs: Some(0),
            }),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli, Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("max_concurrent_runs"));

        let file_config = FileConfig {
            llm: Some(LlmConfig {
                temperature: Some(3.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli, Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_db_path_helpers() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(&cli_with_dir(&temp_dir), None).unwrap();
        assert_eq!(config.user_db_path(), temp_dir.path().join("user.db"));
        assert_eq!(config.songs_db_path(), temp_dir.path().join("songs.db"));
    }
}
