use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

/// Hard cap on the identity-service call timeout.
const MAX_IDENTITY_TIMEOUT_SECS: u64 = 5;

/// Errors raised while reading the environment contract.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Where the relational store lives.
#[derive(Clone)]
pub enum DatabaseConfig {
    /// A full `postgres://` URL from `POSTGRES_URL`.
    Url(String),
    /// Discrete `POSTGRES_HOST/PORT/USER/PASSWORD/DB` settings.
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(_) => f.write_str("DatabaseConfig::Url(<redacted>)"),
            Self::Parts {
                host,
                port,
                user,
                database,
                ..
            } => f
                .debug_struct("DatabaseConfig::Parts")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("database", database)
                .finish_non_exhaustive(),
        }
    }
}

impl DatabaseConfig {
    /// Build sqlx connect options.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        match self {
            Self::Url(url) => PgConnectOptions::from_str(url).map_err(|_| ConfigError::Invalid {
                var: "POSTGRES_URL",
                value: "<redacted>".into(),
            }),
            Self::Parts {
                host,
                port,
                user,
                password,
                database,
            } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password)
                .database(database)),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Loaded once at startup and passed by value (behind `Arc`) into the
/// components that need it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// API bind port.
    pub api_port: u16,
    /// Port the static UI is served on; drives the CORS allow-list.
    pub ui_port: u16,
    /// Base URL of the identity service (`POST {url}/validate`).
    pub auth_service_url: String,
    /// Root directory for uploaded files.
    pub storage_path: PathBuf,
    /// Upload size limit in bytes (default: 10 MiB).
    pub max_file_size: u64,
    /// Lifetime of sync items and uploads in hours (default: `24`).
    pub default_expiry_hours: i64,
    /// Thumbnail edge length in pixels (default: `200`).
    pub thumbnail_size: u32,
    pub database: DatabaseConfig,
    /// Token cache backend; `None` disables caching.
    pub redis_url: Option<String>,
    /// Allowed CORS origins, derived from `ui_port`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for background tasks to drain on shutdown (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Janitor sweep interval in seconds (default: `3600`).
    pub janitor_interval_secs: u64,
    /// How long expired sync items are kept before deletion (default: `0`).
    pub item_retention_grace_secs: u64,
    /// Identity-service call timeout in seconds (default and max: `5`).
    pub identity_timeout_secs: u64,
    /// Positive token cache TTL in seconds (default: `300`).
    pub token_cache_ttl_secs: u64,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                     | Default        |
    /// |-----------------------------|----------------|
    /// | `API_PORT`                  | required       |
    /// | `UI_PORT`                   | required       |
    /// | `AUTH_SERVICE_URL`          | required       |
    /// | `STORAGE_PATH`              | required       |
    /// | `POSTGRES_URL` or `POSTGRES_HOST/PORT/USER/PASSWORD/DB` | required |
    /// | `HOST`                      | `0.0.0.0`      |
    /// | `MAX_FILE_SIZE`             | `10485760`     |
    /// | `DEFAULT_EXPIRY_HOURS`      | `24`           |
    /// | `THUMBNAIL_SIZE`            | `200`          |
    /// | `REDIS_URL`                 | unset          |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`           |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `10`           |
    /// | `JANITOR_INTERVAL_SECS`     | `3600`         |
    /// | `ITEM_RETENTION_GRACE_SECS` | `0`            |
    /// | `IDENTITY_TIMEOUT_SECS`     | `5`            |
    /// | `TOKEN_CACHE_TTL_SECS`      | `300`          |
    /// | `LOG_FORMAT`                | `text`         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_port: u16 = required(&get, "API_PORT")?;
        let ui_port: u16 = required(&get, "UI_PORT")?;
        let auth_service_url = get("AUTH_SERVICE_URL")
            .ok_or(ConfigError::Missing("AUTH_SERVICE_URL"))?
            .trim_end_matches('/')
            .to_string();
        let storage_path = PathBuf::from(
            get("STORAGE_PATH").ok_or(ConfigError::Missing("STORAGE_PATH"))?,
        );

        let database = match get("POSTGRES_URL") {
            Some(url) => DatabaseConfig::Url(url),
            None => DatabaseConfig::Parts {
                host: get("POSTGRES_HOST").ok_or(ConfigError::Missing("POSTGRES_HOST"))?,
                port: required(&get, "POSTGRES_PORT")?,
                user: get("POSTGRES_USER").ok_or(ConfigError::Missing("POSTGRES_USER"))?,
                password: get("POSTGRES_PASSWORD")
                    .ok_or(ConfigError::Missing("POSTGRES_PASSWORD"))?,
                database: get("POSTGRES_DB").ok_or(ConfigError::Missing("POSTGRES_DB"))?,
            },
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        let identity_timeout_secs: u64 = optional(&get, "IDENTITY_TIMEOUT_SECS", 5)?;

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            api_port,
            ui_port,
            auth_service_url,
            storage_path,
            max_file_size: optional(&get, "MAX_FILE_SIZE", 10 * 1024 * 1024)?,
            default_expiry_hours: optional(&get, "DEFAULT_EXPIRY_HOURS", 24)?,
            thumbnail_size: optional(&get, "THUMBNAIL_SIZE", 200)?,
            database,
            redis_url: get("REDIS_URL"),
            cors_origins: vec![
                format!("http://localhost:{ui_port}"),
                format!("http://127.0.0.1:{ui_port}"),
            ],
            request_timeout_secs: optional(&get, "REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: optional(&get, "SHUTDOWN_TIMEOUT_SECS", 10)?,
            janitor_interval_secs: optional(&get, "JANITOR_INTERVAL_SECS", 3600)?,
            item_retention_grace_secs: optional(&get, "ITEM_RETENTION_GRACE_SECS", 0)?,
            identity_timeout_secs: identity_timeout_secs.clamp(1, MAX_IDENTITY_TIMEOUT_SECS),
            token_cache_ttl_secs: optional(&get, "TOKEN_CACHE_TTL_SECS", 300)?,
            log_format,
        })
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_secs(self.identity_timeout_secs)
    }

    pub fn token_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.token_cache_ttl_secs)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs.max(1))
    }

    pub fn item_retention_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.item_retention_grace_secs.min(i64::MAX as u64) as i64)
    }
}

fn required<T, G>(get: &G, var: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(var).ok_or(ConfigError::Missing(var))?;
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value: raw })
}

fn optional<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(default),
    }
}
