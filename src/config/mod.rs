//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    fmt,
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "userbase";
const ENV_PREFIX: &str = "USERBASE";
const DEFAULT_APP_NAME: &str = "userbase";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_BODY_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 2;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REDIS_RESPONSE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REDIS_CONNECTION_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_LIST_TTL_SECS: u64 = 120;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 100;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub environment: AppEnvironment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Staging,
    Production,
}

impl AppEnvironment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "unknown environment `{other}` (expected development, test, staging or production)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub body_limit_bytes: NonZeroU64,
    pub trust_proxy: bool,
}

impl ServerSettings {
    pub fn body_limit(&self) -> usize {
        // Range checked when the settings were built.
        usize::try_from(self.body_limit_bytes.get()).unwrap_or(usize::MAX)
    }
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

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: Option<String>,
    pub response_timeout: Duration,
    pub connection_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub default_ttl_seconds: NonZeroU64,
    pub list_ttl_seconds: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
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

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command_or_default() {
        Command::Serve(args) => raw.apply_serve_overrides(&args.overrides),
        Command::Migrate(args) => raw.apply_database_override(&args.database),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    app: RawAppSettings,
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    redis: RawRedisSettings,
    cache: RawCacheSettings,
    rate_limit: RawRateLimitSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(trust) = overrides.server_trust_proxy {
            self.server.trust_proxy = Some(trust);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
        if let Some(ttl) = overrides.cache_default_ttl_seconds {
            self.cache.default_ttl_seconds = Some(ttl);
        }
        if let Some(ttl) = overrides.cache_list_ttl_seconds {
            self.cache.list_ttl_seconds = Some(ttl);
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            app,
            server,
            logging,
            database,
            redis,
            cache,
            rate_limit,
        } = raw;

        Ok(Self {
            app: build_app_settings(app)?,
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            redis: build_redis_settings(redis)?,
            cache: build_cache_settings(cache)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
        })
    }
}

fn build_app_settings(app: RawAppSettings) -> Result<AppSettings, LoadError> {
    let name = non_empty(app.name).unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
    let environment = match app.environment {
        Some(value) => AppEnvironment::from_str(&value)
            .map_err(|reason| LoadError::invalid("app.environment", reason))?,
        None => AppEnvironment::Development,
    };

    Ok(AppSettings { name, environment })
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let body_limit_value = server.body_limit_bytes.unwrap_or(DEFAULT_BODY_LIMIT_BYTES);
    let body_limit_bytes = NonZeroU64::new(body_limit_value)
        .ok_or_else(|| LoadError::invalid("server.body_limit_bytes", "must be greater than zero"))?;
    usize::try_from(body_limit_value).map_err(|_| {
        LoadError::invalid(
            "server.body_limit_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        body_limit_bytes,
        trust_proxy: server.trust_proxy.unwrap_or(false),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_empty(database.url);

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    let min_connections = database
        .min_connections
        .unwrap_or(DEFAULT_DB_MIN_CONNECTIONS)
        .min(max_connections.get());

    let acquire_secs = database
        .acquire_timeout_seconds
        .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS);
    if acquire_secs == 0 {
        return Err(LoadError::invalid(
            "database.acquire_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        min_connections,
        acquire_timeout: Duration::from_secs(acquire_secs),
    })
}

fn build_redis_settings(redis: RawRedisSettings) -> Result<RedisSettings, LoadError> {
    let url = non_empty(redis.url);

    let response_ms = redis
        .response_timeout_ms
        .unwrap_or(DEFAULT_REDIS_RESPONSE_TIMEOUT_MS);
    if response_ms == 0 {
        return Err(LoadError::invalid(
            "redis.response_timeout_ms",
            "must be greater than zero",
        ));
    }

    let connection_ms = redis
        .connection_timeout_ms
        .unwrap_or(DEFAULT_REDIS_CONNECTION_TIMEOUT_MS);
    if connection_ms == 0 {
        return Err(LoadError::invalid(
            "redis.connection_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(RedisSettings {
        url,
        response_timeout: Duration::from_millis(response_ms),
        connection_timeout: Duration::from_millis(connection_ms),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let default_ttl_seconds = NonZeroU64::new(
        cache.default_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
    )
    .ok_or_else(|| LoadError::invalid("cache.default_ttl_seconds", "must be greater than zero"))?;

    let list_ttl_seconds = NonZeroU64::new(
        cache.list_ttl_seconds.unwrap_or(DEFAULT_CACHE_LIST_TTL_SECS),
    )
    .ok_or_else(|| LoadError::invalid("cache.list_ttl_seconds", "must be greater than zero"))?;

    Ok(CacheSettings {
        default_ttl_seconds,
        list_ttl_seconds,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds_val = rate_limit
        .window_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);
    let window_seconds = non_zero_u32(window_seconds_val, "rate_limit.window_seconds")?;

    let max_requests_val = rate_limit
        .max_requests
        .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
    let max_requests = non_zero_u32(max_requests_val, "rate_limit.max_requests")?;

    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAppSettings {
    name: Option<String>,
    environment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    body_limit_bytes: Option<u64>,
    trust_proxy: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    min_connections: Option<u32>,
    acquire_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    url: Option<String>,
    response_timeout_ms: Option<u64>,
    connection_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    default_ttl_seconds: Option<u64>,
    list_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
