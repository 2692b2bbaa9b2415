//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CONTENT_ROOT: &str = "content";
const DEFAULT_DATABASE_URL: &str = "sqlite://quire.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_AUTO_THRESHOLD: u64 = 500;
const DEFAULT_CACHE_DIR: &str = "cache";
const DEFAULT_CACHE_PREFIX: &str = "quire:";
const DEFAULT_CACHE_SECRET: &str = "change-me-before-deploying";
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_SCHEDULER_CADENCE_SECS: u64 = 60;

/// Command-line arguments for the Quire binary.
#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Quire content server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUIRE_CONFIG_FILE", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Quire HTTP service and background workers.
    Serve(ServeArgs),
    /// Copy file-stored pages into the database backend.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,

    /// Override the content root directory.
    #[arg(long = "content-root", value_name = "PATH")]
    pub content_root: Option<PathBuf>,

    /// Override the content driver (file|database|hybrid|auto).
    #[arg(long = "content-driver", value_name = "DRIVER")]
    pub content_driver: Option<String>,

    /// Override the auto driver's migration threshold.
    #[arg(long = "content-auto-threshold", value_name = "COUNT")]
    pub auto_threshold: Option<u64>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the cache backend (file|memory|database|none).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the file cache directory.
    #[arg(long = "cache-directory", value_name = "PATH")]
    pub cache_directory: Option<PathBuf>,

    /// Override the cache TTL in seconds (0 disables expiry).
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the background scheduler cadence.
    #[arg(long = "scheduler-cadence-seconds", value_name = "SECONDS")]
    pub scheduler_cadence_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub cache: CacheSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    File,
    Database,
    Hybrid,
    Auto,
}

impl FromStr for DriverKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "file" => Ok(Self::File),
            "database" => Ok(Self::Database),
            "hybrid" => Ok(Self::Hybrid),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "unknown driver `{other}` (expected file|database|hybrid|auto)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    File,
    Memory,
    Database,
    None,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            "database" => Ok(Self::Database),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown cache backend `{other}` (expected file|memory|database|none)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub root: PathBuf,
    pub driver: DriverKind,
    pub database_url: String,
    pub database_max_connections: NonZeroU32,
    pub auto_threshold: u64,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub directory: PathBuf,
    pub prefix: String,
    pub secret: String,
    /// `None` means entries never expire.
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub cadence: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("QUIRE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_overrides(&args.overrides),
        None => {}
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content: RawContentSettings,
    cache: RawCacheSettings,
    scheduler: RawSchedulerSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    root: Option<PathBuf>,
    driver: Option<String>,
    database_url: Option<String>,
    database_max_connections: Option<u32>,
    auto_threshold: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    directory: Option<PathBuf>,
    prefix: Option<String>,
    secret: Option<String>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchedulerSettings {
    cadence_seconds: Option<u64>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(root) = overrides.content_root.as_ref() {
            self.content.root = Some(root.clone());
        }
        if let Some(driver) = overrides.content_driver.as_ref() {
            self.content.driver = Some(driver.clone());
        }
        if let Some(threshold) = overrides.auto_threshold {
            self.content.auto_threshold = Some(threshold);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.content.database_url = Some(url.clone());
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(directory) = overrides.cache_directory.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(cadence) = overrides.scheduler_cadence_seconds {
            self.scheduler.cadence_seconds = Some(cadence);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let host = raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = raw.server.port.unwrap_or(DEFAULT_PORT);
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|err| LoadError::invalid("server.host", format!("{err}")))?;

        let level = match raw.logging.level {
            Some(level) => LevelFilter::from_str(&level)
                .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?,
            None => LevelFilter::INFO,
        };
        let format = if raw.logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        let driver = match raw.content.driver {
            Some(driver) => DriverKind::from_str(&driver)
                .map_err(|reason| LoadError::invalid("content.driver", reason))?,
            None => DriverKind::Auto,
        };
        let database_max_connections = NonZeroU32::new(
            raw.content
                .database_max_connections
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        )
        .ok_or_else(|| {
            LoadError::invalid("content.database_max_connections", "must be greater than zero")
        })?;

        let backend = match raw.cache.backend {
            Some(backend) => CacheBackendKind::from_str(&backend)
                .map_err(|reason| LoadError::invalid("cache.backend", reason))?,
            None => CacheBackendKind::File,
        };
        let ttl_seconds = raw.cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
        let ttl = (ttl_seconds > 0).then(|| Duration::from_secs(ttl_seconds));

        let cadence_seconds = raw
            .scheduler
            .cadence_seconds
            .unwrap_or(DEFAULT_SCHEDULER_CADENCE_SECS);
        if cadence_seconds == 0 {
            return Err(LoadError::invalid(
                "scheduler.cadence_seconds",
                "must be greater than zero",
            ));
        }

        Ok(Self {
            server: ServerSettings { addr },
            logging: LoggingSettings { level, format },
            content: ContentSettings {
                root: raw
                    .content
                    .root
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_ROOT)),
                driver,
                database_url: raw
                    .content
                    .database_url
                    .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
                database_max_connections,
                auto_threshold: raw.content.auto_threshold.unwrap_or(DEFAULT_AUTO_THRESHOLD),
            },
            cache: CacheSettings {
                backend,
                directory: raw
                    .cache
                    .directory
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
                prefix: raw
                    .cache
                    .prefix
                    .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string()),
                secret: raw
                    .cache
                    .secret
                    .unwrap_or_else(|| DEFAULT_CACHE_SECRET.to_string()),
                ttl,
            },
            scheduler: SchedulerSettings {
                cadence: Duration::from_secs(cadence_seconds),
            },
        })
    }
}
