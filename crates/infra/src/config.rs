//! Process configuration, read once at startup from the environment.
//!
//! A `.env` file in the working directory is loaded first when present;
//! real environment variables always win over it.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use thiserror::Error;
use tracing::{info, warn};

use assettag_auth::MIN_SECRET_LEN;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 600;
const DEFAULT_ACQUIRE_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required configuration '{0}' is missing")]
    Missing(&'static str),

    #[error("configuration '{key}' is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Connection settings for the Postgres credential store.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub connect: PgConnectOptions,
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl core::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.connect.get_host())
            .field("port", &self.connect.get_port())
            .field("database", &self.connect.get_database())
            .field("username", &self.connect.get_username())
            .field("max_connections", &self.max_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Postgres(DatabaseConfig),
    /// Process-local store; data is lost on restart. Development only.
    InMemory,
}

#[derive(Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub jwt_secret: String,
    pub store: StoreBackend,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("listen_addr", &self.listen_addr)
            .field("jwt_secret", &"<redacted>")
            .field("store", &self.store)
            .finish()
    }
}

impl AppConfig {
    /// Load `.env` (if any) and read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenv::dotenv() {
            Ok(path) => info!(path = %path.display(), "loaded environment file"),
            Err(_) => warn!("no .env file found, using process environment only"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::invalid(
                "JWT_SECRET",
                format!("must be at least {MIN_SECRET_LEN} bytes"),
            ));
        }

        let port: u16 = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let bind: IpAddr = parse_or(
            "BIND_ADDRESS",
            get("BIND_ADDRESS"),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        )?;

        let in_memory = match get("USE_IN_MEMORY_STORE") {
            Some(v) => parse_bool("USE_IN_MEMORY_STORE", &v)?,
            None => false,
        };

        let store = if in_memory {
            StoreBackend::InMemory
        } else {
            StoreBackend::Postgres(database_config(&get)?)
        };

        Ok(Self {
            listen_addr: SocketAddr::new(bind, port),
            jwt_secret,
            store,
        })
    }
}

fn database_config<G>(get: &G) -> Result<DatabaseConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let connect = match get("DATABASE_URL") {
        Some(url) => PgConnectOptions::from_str(&url)
            .map_err(|e| ConfigError::invalid("DATABASE_URL", e.to_string()))?,
        None => {
            let host = get("DB_HOST").ok_or(ConfigError::Missing("DATABASE_URL or DB_HOST"))?;
            let user = get("DB_USER").ok_or(ConfigError::Missing("DB_USER"))?;
            let name = get("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?;
            let port: u16 = parse_or("DB_PORT", get("DB_PORT"), DEFAULT_DB_PORT)?;
            let options = PgConnectOptions::new_without_pgpass()
                .host(&host)
                .port(port)
                .username(&user)
                .database(&name);
            match get("DB_PASSWORD") {
                Some(password) => options.password(&password),
                None => options,
            }
        }
    };

    let max_connections: u32 = parse_or(
        "DB_MAX_CONNECTIONS",
        get("DB_MAX_CONNECTIONS"),
        DEFAULT_MAX_CONNECTIONS,
    )?;
    if max_connections == 0 {
        return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", "must be positive"));
    }
    let idle: u64 = parse_or(
        "DB_IDLE_TIMEOUT_SECONDS",
        get("DB_IDLE_TIMEOUT_SECONDS"),
        DEFAULT_IDLE_TIMEOUT_SECONDS,
    )?;
    let acquire: u64 = parse_or(
        "DB_ACQUIRE_TIMEOUT_SECONDS",
        get("DB_ACQUIRE_TIMEOUT_SECONDS"),
        DEFAULT_ACQUIRE_TIMEOUT_SECONDS,
    )?;

    Ok(DatabaseConfig {
        connect,
        max_connections,
        idle_timeout: Duration::from_secs(idle),
        acquire_timeout: Duration::from_secs(acquire),
    })
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("'{other}' is not a boolean"))),
    }
}
