use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use domain::models::AttendanceWindow;
use domain::services::InsideEventPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub limits: LimitsConfig,
    pub geofence: GeofenceConfig,
    pub attendance: AttendanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply embedded migrations on startup.
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Location samples accepted per student within one window.
    #[serde(default = "default_rate_limit_samples")]
    pub rate_limit_samples: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_location_retention_days")]
    pub location_retention_days: u32,

    #[serde(default = "default_cleanup_batch_size")]
    pub cleanup_batch_size: i64,

    /// Upper bound for `limit` on event listings.
    #[serde(default = "default_max_events_page")]
    pub max_events_page: i64,

    /// How far a device capture time may run ahead of the server clock.
    #[serde(default = "default_max_clock_skew_secs")]
    pub max_clock_skew_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceConfig {
    /// INSIDE cadence: every_sample, throttled or never
    #[serde(default = "default_inside_event_mode")]
    pub inside_event_mode: String,

    #[serde(default = "default_inside_event_interval_secs")]
    pub inside_event_interval_secs: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Service-wide attendance window used by tenants without their own.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceConfig {
    #[serde(default = "default_window_start")]
    pub window_start: String,

    #[serde(default = "default_window_end")]
    pub window_end: String,

    #[serde(default = "default_late_cutoff")]
    pub late_cutoff: String,

    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    65_536
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_run_migrations() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_rate_limit_samples() -> u32 {
    20
}
fn default_rate_limit_window_secs() -> u64 {
    10
}
fn default_location_retention_days() -> u32 {
    30
}
fn default_cleanup_batch_size() -> i64 {
    10_000
}
fn default_max_events_page() -> i64 {
    500
}
/// One day.
const MAX_CLOCK_SKEW_SECS: u64 = 86_400;

fn default_max_clock_skew_secs() -> u64 {
    300
}
fn default_inside_event_mode() -> String {
    "throttled".to_string()
}
fn default_inside_event_interval_secs() -> u64 {
    600
}
fn default_cache_ttl_secs() -> u64 {
    30
}
fn default_window_start() -> String {
    "07:00".to_string()
}
fn default_window_end() -> String {
    "09:00".to_string()
}
fn default_late_cutoff() -> String {
    "08:00".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with GA__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("GA").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Builds a configuration from embedded defaults plus `overrides`,
    /// without touching the file system. Validation is skipped.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30
            max_body_size = 65536

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600
            run_migrations = false

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            rate_limit_samples = 20
            rate_limit_window_secs = 10

            [limits]
            location_retention_days = 30
            cleanup_batch_size = 10000
            max_events_page = 500
            max_clock_skew_secs = 300

            [geofence]
            inside_event_mode = "throttled"
            inside_event_interval_secs = 600
            cache_ttl_secs = 30

            [attendance]
            window_start = "07:00"
            window_end = "09:00"
            late_cutoff = "08:00"
            utc_offset_minutes = 0
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "GA__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.security.rate_limit_samples == 0 || self.security.rate_limit_window_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Rate limit samples and window must be positive".to_string(),
            ));
        }

        if self.limits.max_clock_skew_secs > MAX_CLOCK_SKEW_SECS {
            return Err(ConfigValidationError::InvalidValue(format!(
                "limits.max_clock_skew_secs cannot exceed {MAX_CLOCK_SKEW_SECS}"
            )));
        }

        self.inside_event_policy()?;
        self.default_window()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn inside_event_policy(&self) -> Result<InsideEventPolicy, ConfigValidationError> {
        match self.geofence.inside_event_mode.as_str() {
            "every_sample" => Ok(InsideEventPolicy::EverySample),
            "never" => Ok(InsideEventPolicy::Never),
            "throttled" => Ok(InsideEventPolicy::Throttled {
                interval_secs: self.geofence.inside_event_interval_secs,
            }),
            other => Err(ConfigValidationError::InvalidValue(format!(
                "geofence.inside_event_mode must be every_sample, throttled or never, got {other}"
            ))),
        }
    }

    pub fn default_window(&self) -> Result<AttendanceWindow, ConfigValidationError> {
        let parse = |field: &str, value: &str| {
            shared::validation::parse_time_of_day(value).map_err(|_| {
                ConfigValidationError::InvalidValue(format!("attendance.{field} must be HH:MM, got {value}"))
            })
        };

        let window = AttendanceWindow {
            start: parse("window_start", &self.attendance.window_start)?,
            end: parse("window_end", &self.attendance.window_end)?,
            late_cutoff: parse("late_cutoff", &self.attendance.late_cutoff)?,
            utc_offset_minutes: self.attendance.utc_offset_minutes,
        };
        window
            .validate()
            .map_err(|e| ConfigValidationError::InvalidValue(format!("attendance window: {e}")))?;
        Ok(window)
    }

    pub fn fence_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.geofence.cache_ttl_secs)
    }

    pub fn max_clock_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.limits.max_clock_skew_secs.min(MAX_CLOCK_SKEW_SECS) as i64)
    }
}
