use std::net::SocketAddr;
use std::num::ParseIntError;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(Duration::from_millis(ms)))
    }
}

/// Comma separated project ids, e.g. `1,2,5`. Empty means none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectIds(pub Vec<i64>);

impl FromStr for ProjectIds {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ids = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<i64>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProjectIds(ids))
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:8080")]
    pub address: SocketAddr,

    #[envconfig(default = "1000")]
    pub max_concurrency: usize,

    /// Base URL of the management service. Snapshot polling is off when empty.
    #[envconfig(default = "")]
    pub management_url: String,

    #[envconfig(default = "")]
    pub project_ids: ProjectIds,

    #[envconfig(default = "10000")]
    pub poll_interval: EnvMsDuration,

    #[envconfig(default = "5000")]
    pub request_timeout: EnvMsDuration,

    #[envconfig(default = "10")]
    pub s2_min_level: u8,

    #[envconfig(default = "14")]
    pub s2_max_level: u8,

    /// Used by time segmenters when neither the request nor the project
    /// names a timezone.
    #[envconfig(default = "UTC")]
    pub default_timezone: String,

    #[envconfig(default = "false")]
    pub enable_metrics: bool,

    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: FlexBool,

    pub otel_url: Option<String>,

    #[envconfig(default = "1.0")]
    pub otel_sampling_rate: f64,

    #[envconfig(default = "treatment-service")]
    pub otel_service_name: String,

    #[envconfig(from = "OTEL_LOG_LEVEL", default = "info")]
    pub otel_log_level: tracing::Level,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
            max_concurrency: 1000,
            management_url: String::new(),
            project_ids: ProjectIds::default(),
            poll_interval: EnvMsDuration(Duration::from_millis(100)),
            request_timeout: EnvMsDuration(Duration::from_secs(5)),
            s2_min_level: 10,
            s2_max_level: 14,
            default_timezone: "UTC".to_string(),
            enable_metrics: false,
            debug: FlexBool(false),
            otel_url: None,
            otel_sampling_rate: 1.0,
            otel_service_name: "treatment-service".to_string(),
            otel_log_level: tracing::Level::INFO,
        }
    }

    pub fn polling_enabled(&self) -> bool {
        !self.management_url.is_empty() && !self.project_ids.0.is_empty()
    }
}
