/// Process configuration
///
/// Loaded from a `.env` file (if present) and `TASKFLOW_*` environment
/// variables through the `config` crate. Every option has a default, so an
/// empty environment runs a local, file-backed instance in `./data`.
///
/// # Environment Variables
///
/// - `TASKFLOW_BACKEND`: `local` (files) or `shared` (Redis) (default: local)
/// - `TASKFLOW_DATA_DIR`: Directory for the local backend and session file (default: ./data)
/// - `TASKFLOW_REDIS_URL`: Redis URL for the shared backend (falls back to `REDIS_URL`)
/// - `TASKFLOW_KEY_PREFIX`: Prefix of every Redis key (default: taskflow)
/// - `TASKFLOW_REMINDER_INTERVAL_SECS`: How often the reminder gate is checked (default: 3600)
/// - `TASKFLOW_SESSION_FILE`: Where the signed-in user is remembered (default: `{data_dir}/session.json`)
/// - `TASKFLOW_LOCATION`: Start address, may carry a `taskId` deep link
/// - `TASKFLOW_LOG_FORMAT`: `pretty` or `json` (default: pretty)
/// - `RUST_LOG`: Log filter (default: taskflow_app=debug)
///
/// # Example
///
/// ```no_run
/// use taskflow_app::config::AppConfig;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = AppConfig::from_env()?;
/// println!("Backend: {:?}, data in {}", config.backend, config.data_dir.display());
/// # Ok(())
/// # }
/// ```

use config::{Config, Environment, Source};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use taskflow_shared::redis::RedisConfig;
use url::Url;

/// Which storage backend holds the collections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON files in the data directory, one process
    #[default]
    Local,

    /// Redis hashes with pub/sub fan-out, many processes
    Shared,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Complete process configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,

    /// Local backend directory
    pub data_dir: PathBuf,

    /// Shared backend Redis URL
    pub redis_url: Option<String>,

    /// Prefix of every Redis key and channel
    pub key_prefix: String,

    /// Seconds between reminder gate checks
    pub reminder_interval_secs: u64,

    /// Session file; defaults to `session.json` in the data directory
    pub session_file: Option<PathBuf>,

    /// Start address
    pub location: Option<String>,

    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            backend: Backend::Local,
            data_dir: PathBuf::from("./data"),
            redis_url: None,
            key_prefix: "taskflow".to_string(),
            reminder_interval_secs: 3600,
            session_file: None,
            location: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has an invalid value (unknown backend,
    /// non-numeric interval, unparseable location).
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::load(
            Environment::with_prefix("TASKFLOW")
                .prefix_separator("_")
                .try_parsing(true),
        )
    }

    /// Loads configuration from any `config` source
    pub fn load<S>(source: S) -> anyhow::Result<Self>
    where
        S: Source + Send + Sync + 'static,
    {
        let config: AppConfig = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.reminder_interval_secs == 0 {
            anyhow::bail!("TASKFLOW_REMINDER_INTERVAL_SECS must be greater than zero");
        }
        if self.key_prefix.trim().is_empty() {
            anyhow::bail!("TASKFLOW_KEY_PREFIX must not be empty");
        }
        self.start_location()?;
        Ok(())
    }

    /// Session file path
    pub fn session_path(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("session.json"))
    }

    /// Parsed start address
    pub fn start_location(&self) -> anyhow::Result<Option<Url>> {
        match self.location.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(location) => Url::parse(location)
                .map(Some)
                .map_err(|e| anyhow::anyhow!("TASKFLOW_LOCATION is not a valid URL: {}", e)),
        }
    }

    /// Redis settings for the shared backend
    ///
    /// Uses `redis_url` when set, otherwise the `REDIS_*` variables.
    pub fn redis_config(&self) -> anyhow::Result<RedisConfig> {
        match &self.redis_url {
            Some(url) if !url.is_empty() => Ok(RedisConfig::with_url(url.clone())),
            _ => Ok(RedisConfig::from_env()?),
        }
    }
}
