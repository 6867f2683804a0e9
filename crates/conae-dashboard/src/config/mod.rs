use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::fetch::FetcherConfig;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the dashboard data service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub fetch: FetchSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let max_concurrency =
            positive_var("APP_FETCH_MAX_CONCURRENCY", FetchSettings::DEFAULT_MAX_CONCURRENCY)?;
        let request_timeout_ms = positive_var(
            "APP_FETCH_REQUEST_TIMEOUT_MS",
            FetchSettings::DEFAULT_REQUEST_TIMEOUT_MS,
        )?;
        let batch_timeout_ms = positive_var(
            "APP_FETCH_BATCH_TIMEOUT_MS",
            FetchSettings::DEFAULT_BATCH_TIMEOUT_MS,
        )?;
        let user_agent = env::var("APP_FETCH_USER_AGENT")
            .unwrap_or_else(|_| FetchSettings::default_user_agent());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            fetch: FetchSettings {
                max_concurrency: max_concurrency as usize,
                request_timeout_ms,
                batch_timeout_ms,
                user_agent,
            },
        })
    }
}

fn positive_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { name, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Worker pool and upstream request limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub max_concurrency: usize,
    pub request_timeout_ms: u64,
    pub batch_timeout_ms: u64,
    pub user_agent: String,
}

impl FetchSettings {
    pub const DEFAULT_MAX_CONCURRENCY: u64 = 8;
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
    pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 60_000;

    pub fn default_user_agent() -> String {
        format!("conae-dashboard/{}", env!("CARGO_PKG_VERSION"))
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            max_concurrency: self.max_concurrency.max(1),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            batch_timeout: Duration::from_millis(self.batch_timeout_ms),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: Self::DEFAULT_MAX_CONCURRENCY as usize,
            request_timeout_ms: Self::DEFAULT_REQUEST_TIMEOUT_MS,
            batch_timeout_ms: Self::DEFAULT_BATCH_TIMEOUT_MS,
            user_agent: Self::default_user_agent(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a positive integer (got '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
