use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;

use crate::booking::domain::length_format::MAX_HOURS;

const DEFAULT_ROOM_CAPACITY: u32 = 100;
const DEFAULT_MOVIE_MINUTES: i64 = 90;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub booking: BookingConfig,
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

        let default_room_capacity = match env::var("THEATRE_DEFAULT_CAPACITY") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidCapacity(raw))?,
            Err(_) => DEFAULT_ROOM_CAPACITY,
        };

        let default_movie_length = match env::var("THEATRE_DEFAULT_MOVIE_MINUTES") {
            Ok(raw) => match raw.trim().parse::<i64>() {
                Ok(minutes) if minutes > 0 && minutes <= MAX_HOURS * 60 => {
                    match Duration::try_minutes(minutes) {
                        Some(length) => length,
                        None => return Err(ConfigError::InvalidMovieLength(raw)),
                    }
                }
                _ => return Err(ConfigError::InvalidMovieLength(raw)),
            },
            Err(_) => Duration::minutes(DEFAULT_MOVIE_MINUTES),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            booking: BookingConfig {
                default_room_capacity,
                default_movie_length,
            },
        })
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

/// Defaults applied when a room or movie payload omits a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingConfig {
    pub default_room_capacity: u32,
    pub default_movie_length: Duration,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            default_room_capacity: DEFAULT_ROOM_CAPACITY,
            default_movie_length: Duration::minutes(DEFAULT_MOVIE_MINUTES),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCapacity(String),
    InvalidMovieLength(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must be an IP address or 'localhost'")
            }
            ConfigError::InvalidCapacity(raw) => write!(
                f,
                "THEATRE_DEFAULT_CAPACITY must be a non-negative integer, found '{raw}'"
            ),
            ConfigError::InvalidMovieLength(raw) => write!(
                f,
                "THEATRE_DEFAULT_MOVIE_MINUTES must be between 1 and {} minutes, found '{raw}'",
                MAX_HOURS * 60
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidCapacity(_)
            | ConfigError::InvalidMovieLength(_) => None,
        }
    }
}
