//! Server configuration read from the environment.
//!
//! A `.env` file in the working directory is loaded first if present.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use flashsale_sales::application::cache_aside::CacheWritePolicy;

use crate::error::AppError;

/// Which `SaleStore` backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL via `DATABASE_URL`.
    Postgres,
    /// Process-local store; data is lost on restart.
    Memory,
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable single line.
    Compact,
}

/// Bounds on the purchase `wait` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseSettings {
    /// Processing delay when the request does not give one.
    pub default_wait: Duration,
    /// Largest delay a request may ask for.
    pub max_wait: Duration,
}

impl Default for PurchaseSettings {
    fn default() -> Self {
        Self {
            default_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
        }
    }
}

/// Flash sale API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store backend (`STORE_BACKEND`).
    pub store_backend: StoreBackend,
    /// PostgreSQL connection string (`DATABASE_URL`).
    pub database_url: Option<String>,
    /// Bind address (`HOST`).
    pub host: String,
    /// Bind port (`PORT`).
    pub port: u16,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`).
    pub database_max_connections: u32,
    /// Row lock wait bound (`STORE_LOCK_TIMEOUT_MS`).
    pub lock_timeout: Duration,
    /// Post-mutation cache policy (`CACHE_WRITE_POLICY`).
    pub cache_write_policy: CacheWritePolicy,
    /// Purchase delay bounds (`PURCHASE_DEFAULT_WAIT_SECS`,
    /// `PURCHASE_MAX_WAIT_SECS`).
    pub purchase: PurchaseSettings,
    /// Insert demo products at startup (`SEED_DEMO_PRODUCTS`).
    pub seed_demo_products: bool,
    /// Log format (`LOG_FORMAT`).
    pub log_format: LogFormat,
    /// OTLP collector endpoint; tracing export is off when unset
    /// (`OTEL_EXPORTER_OTLP_ENDPOINT`).
    pub otel_endpoint: Option<String>,
    /// Service name reported to the collector (`OTEL_SERVICE_NAME`).
    pub otel_service_name: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is malformed or a required
    /// one is missing.
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is malformed or a required
    /// one is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let store_backend = match get("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "STORE_BACKEND must be `postgres` or `memory`, got `{other}`"
                )));
            }
        };
        let database_url = get("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config(
                "DATABASE_URL environment variable must be set".into(),
            ));
        }

        let cache_write_policy = match get("CACHE_WRITE_POLICY").as_deref() {
            None | Some("strict") => CacheWritePolicy::Strict,
            Some("log-and-continue") => CacheWritePolicy::LogAndContinue,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "CACHE_WRITE_POLICY must be `strict` or `log-and-continue`, got `{other}`"
                )));
            }
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "LOG_FORMAT must be `json` or `compact`, got `{other}`"
                )));
            }
        };

        let purchase = PurchaseSettings {
            default_wait: Duration::from_secs(parse_or(&get, "PURCHASE_DEFAULT_WAIT_SECS", 1)?),
            max_wait: Duration::from_secs(parse_or(&get, "PURCHASE_MAX_WAIT_SECS", 30)?),
        };
        if purchase.default_wait > purchase.max_wait {
            return Err(AppError::Config(
                "PURCHASE_DEFAULT_WAIT_SECS must not exceed PURCHASE_MAX_WAIT_SECS".into(),
            ));
        }

        let lock_timeout = Duration::from_millis(parse_or(&get, "STORE_LOCK_TIMEOUT_MS", 5000)?);
        // PostgreSQL reads a zero lock_timeout as "wait forever".
        if lock_timeout.is_zero() {
            return Err(AppError::Config(
                "STORE_LOCK_TIMEOUT_MS must be at least 1".into(),
            ));
        }

        Ok(Self {
            store_backend,
            database_url,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 3000)?,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            lock_timeout,
            cache_write_policy,
            purchase,
            seed_demo_products: parse_or(&get, "SEED_DEMO_PRODUCTS", false)?,
            log_format,
            otel_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
            otel_service_name: get("OTEL_SERVICE_NAME")
                .unwrap_or_else(|| "flashsale-api".to_string()),
        })
    }

    /// Address to bind the listener to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}
