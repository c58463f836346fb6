//! Application configuration.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file,
//! `TREESYNC__*` environment variables, then command-line flags (which also
//! carry `THINGSBOARD_URL`, `THINGSBOARD_TOKEN` and `DATABASE_URL`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use treesync_client::{ClientResult, ClientSettings, DEFAULT_BASE_URL, RetryPolicy};
use treesync_core::{DEFAULT_MAX_CONCURRENCY, SyncOptions};
use treesync_db_postgres::PostgresConfig;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "treesync.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub thingsboard: ThingsboardConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThingsboardConfig {
    #[serde(default = "default_thingsboard_url")]
    pub url: String,
    /// Used when the customer has no token stored.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ThingsboardConfig {
    fn default() -> Self {
        Self {
            url: default_thingsboard_url(),
            token: None,
        }
    }
}

fn default_thingsboard_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub postgres: Option<PostgresStorageConfig>,
}

/// PostgreSQL connection settings. Either `url` or `host`, `user` and
/// `database` must be set; `url` wins when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresStorageConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_pg_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_pg_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for PostgresStorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: default_pg_port(),
            user: None,
            password: None,
            database: None,
            pool_size: default_pg_pool_size(),
            connect_timeout_ms: default_pg_connect_timeout_ms(),
            run_migrations: true,
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}
fn default_pg_pool_size() -> u32 {
    4
}
fn default_pg_connect_timeout_ms() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}

impl PostgresStorageConfig {
    /// Builds the store configuration.
    ///
    /// # Errors
    ///
    /// Returns a message naming the missing parameters when neither a URL nor
    /// a complete host/user/database triple is configured.
    pub fn to_postgres_config(&self) -> Result<PostgresConfig, String> {
        let base = match self.url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => PostgresConfig::new(url.trim()),
            None => {
                let missing: Vec<&str> = [
                    ("host", &self.host),
                    ("user", &self.user),
                    ("database", &self.database),
                ]
                .into_iter()
                .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
                .map(|(name, _)| name)
                .collect();
                if !missing.is_empty() {
                    return Err(format!(
                        "storage.postgres needs url or host/user/database (missing: {})",
                        missing.join(", ")
                    ));
                }
                PostgresConfig::from_parts(
                    self.host.as_deref().unwrap_or_default(),
                    self.port,
                    self.user.as_deref().unwrap_or_default(),
                    self.password.as_deref(),
                    self.database.as_deref().unwrap_or_default(),
                )
                .map_err(|e| format!("storage.postgres: {e}"))?
            }
        };

        Ok(base
            .with_pool_size(self.pool_size)
            .with_connect_timeout_ms(self.connect_timeout_ms)
            .with_run_migrations(self.run_migrations))
    }
}

/// Timeouts, retries and paging for the backend client plus stage
/// concurrency. All durations are milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_asset_list_timeout_ms")]
    pub asset_list_timeout_ms: u64,
    #[serde(default = "default_device_timeout_ms")]
    pub device_timeout_ms: u64,
    #[serde(default = "default_attributes_timeout_ms")]
    pub attributes_timeout_ms: u64,
    #[serde(default = "default_relation_timeout_ms")]
    pub relation_timeout_ms: u64,
    #[serde(default = "default_relation_timeout_increment_ms")]
    pub relation_timeout_increment_ms: u64,
    #[serde(default = "default_relation_max_retries")]
    pub relation_max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            asset_list_timeout_ms: default_asset_list_timeout_ms(),
            device_timeout_ms: default_device_timeout_ms(),
            attributes_timeout_ms: default_attributes_timeout_ms(),
            relation_timeout_ms: default_relation_timeout_ms(),
            relation_timeout_increment_ms: default_relation_timeout_increment_ms(),
            relation_max_retries: default_relation_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_asset_list_timeout_ms() -> u64 {
    15_000
}
fn default_device_timeout_ms() -> u64 {
    10_000
}
fn default_attributes_timeout_ms() -> u64 {
    5_000
}
fn default_relation_timeout_ms() -> u64 {
    15_000
}
fn default_relation_timeout_increment_ms() -> u64 {
    5_000
}
fn default_relation_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    1_000
}
fn default_page_size() -> u32 {
    10_000
}
fn default_max_pages() -> u32 {
    100
}
fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl SyncConfig {
    pub fn relation_retry(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_base_timeout(Duration::from_millis(self.relation_timeout_ms))
            .with_timeout_increment(Duration::from_millis(self.relation_timeout_increment_ms))
            .with_max_retries(self.relation_max_retries)
            .with_backoff_unit(Duration::from_millis(self.retry_backoff_ms))
    }

    /// Client settings for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Fails if `base_url` is not an http(s) URL.
    pub fn client_settings(&self, base_url: &str) -> ClientResult<ClientSettings> {
        Ok(ClientSettings::new(base_url)?
            .with_asset_list_timeout(Duration::from_millis(self.asset_list_timeout_ms))
            .with_device_timeout(Duration::from_millis(self.device_timeout_ms))
            .with_attributes_timeout(Duration::from_millis(self.attributes_timeout_ms))
            .with_relation_retry(self.relation_retry())
            .with_page_size(self.page_size)
            .with_max_pages(self.max_pages))
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            max_concurrency: self.max_concurrency,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Audit log appended to in addition to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.thingsboard.url.trim().is_empty() {
            return Err("thingsboard.url must not be empty".into());
        }
        self.sync
            .client_settings(&self.thingsboard.url)
            .map_err(|e| format!("thingsboard.url: {e}"))?;

        let Some(pg) = &self.storage.postgres else {
            return Err(
                "storage.postgres is required (set DATABASE_URL or storage.postgres.*)".into(),
            );
        };
        if pg.pool_size == 0 {
            return Err("storage.postgres.pool_size must be > 0".into());
        }
        pg.to_postgres_config()?;

        let sync = &self.sync;
        for (name, value) in [
            ("asset_list_timeout_ms", sync.asset_list_timeout_ms),
            ("device_timeout_ms", sync.device_timeout_ms),
            ("attributes_timeout_ms", sync.attributes_timeout_ms),
            ("relation_timeout_ms", sync.relation_timeout_ms),
        ] {
            if value == 0 {
                return Err(format!("sync.{name} must be > 0"));
            }
        }
        if sync.page_size == 0 {
            return Err("sync.page_size must be > 0".into());
        }
        if sync.max_pages == 0 {
            return Err("sync.max_pages must be > 0".into());
        }
        if sync.max_concurrency == 0 {
            return Err("sync.max_concurrency must be > 0".into());
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            ));
        }
        Ok(())
    }

    /// Store configuration. Only valid after [`AppConfig::validate`].
    pub fn postgres_config(&self) -> Result<PostgresConfig, String> {
        self.storage
            .postgres
            .as_ref()
            .ok_or_else(|| "storage.postgres is not configured".to_string())?
            .to_postgres_config()
    }
}

/// Values taken from command-line flags and their environment variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub thingsboard_url: Option<String>,
    pub thingsboard_token: Option<String>,
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Loads, merges and validates the configuration.
///
/// An explicit `path` must exist; without one, [`DEFAULT_CONFIG_FILE`] is
/// read if present.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<AppConfig> {
    let mut builder = Config::builder();
    builder = match path {
        Some(path) => builder.add_source(File::from(path).required(true)),
        None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };
    builder = builder.add_source(
        Environment::with_prefix("TREESYNC")
            .separator("__")
            .try_parsing(true),
    );

    for (key, value) in [
        ("thingsboard.url", overrides.thingsboard_url.clone()),
        ("thingsboard.token", overrides.thingsboard_token.clone()),
        ("storage.postgres.url", overrides.database_url.clone()),
        ("logging.level", overrides.log_level.clone()),
        (
            "logging.file",
            overrides
                .log_file
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        ),
    ] {
        if let Some(value) = value {
            builder = builder
                .set_override(key, value)
                .with_context(|| format!("invalid override for {key}"))?;
        }
    }

    let config: AppConfig = builder
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("failed to parse configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}
