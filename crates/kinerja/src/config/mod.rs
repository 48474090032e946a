use crate::pipeline::{ValidationPolicy, FUZZY_MATCH_THRESHOLD};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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
    pub pipeline: PipelineConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline: PipelineConfig::from_env()?,
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

/// Import pipeline tuning shared by the CLI and the HTTP service.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub directory_csv: Option<PathBuf>,
    pub fuzzy_threshold: f64,
    pub completeness_threshold_percent: f64,
    pub required_competencies: Vec<String>,
    /// Names nobody can place become new employees instead of pausing.
    pub accept_unmatched_as_new: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            directory_csv: None,
            fuzzy_threshold: FUZZY_MATCH_THRESHOLD,
            completeness_threshold_percent: ValidationPolicy::default()
                .completeness_threshold_percent,
            required_competencies: Vec::new(),
            accept_unmatched_as_new: false,
        }
    }
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let directory_csv = env::var("KINERJA_DIRECTORY_CSV")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let fuzzy_threshold = parse_bounded(
            "KINERJA_FUZZY_THRESHOLD",
            defaults.fuzzy_threshold,
            0.0,
            1.0,
        )?;
        let completeness_threshold_percent = parse_bounded(
            "KINERJA_COMPLETENESS_THRESHOLD",
            defaults.completeness_threshold_percent,
            0.0,
            100.0,
        )?;

        let required_competencies = env::var("KINERJA_REQUIRED_COMPETENCIES")
            .map(|raw| {
                raw.split(',')
                    .map(|name| name.split_whitespace().collect::<Vec<_>>().join(" "))
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let accept_unmatched_as_new = parse_flag(
            "KINERJA_ACCEPT_UNMATCHED_AS_NEW",
            defaults.accept_unmatched_as_new,
        )?;

        Ok(Self {
            directory_csv,
            fuzzy_threshold,
            completeness_threshold_percent,
            required_competencies,
            accept_unmatched_as_new,
        })
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            required_competencies: self.required_competencies.clone(),
            completeness_threshold_percent: self.completeness_threshold_percent,
            ..ValidationPolicy::default()
        }
    }
}

fn parse_bounded(
    variable: &'static str,
    default: f64,
    min: f64,
    max: f64,
) -> Result<f64, ConfigError> {
    let Ok(raw) = env::var(variable) else {
        return Ok(default);
    };

    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && (min..=max).contains(&value) => Ok(value),
        _ => Err(ConfigError::InvalidThreshold {
            variable,
            value: raw,
        }),
    }
}

fn parse_flag(variable: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Ok(raw) = env::var(variable) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            variable,
            value: raw,
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidThreshold { variable: &'static str, value: String },
    InvalidFlag { variable: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidThreshold { variable, value } => {
                write!(f, "{variable} is out of range or not a number: '{value}'")
            }
            ConfigError::InvalidFlag { variable, value } => {
                write!(f, "{variable} must be true or false, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidThreshold { .. }
            | ConfigError::InvalidFlag { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "KINERJA_DIRECTORY_CSV",
            "KINERJA_FUZZY_THRESHOLD",
            "KINERJA_COMPLETENESS_THRESHOLD",
            "KINERJA_REQUIRED_COMPETENCIES",
            "KINERJA_ACCEPT_UNMATCHED_AS_NEW",
        ] {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.pipeline.directory_csv.is_none());
        assert_eq!(config.pipeline.fuzzy_threshold, FUZZY_MATCH_THRESHOLD);
        assert_eq!(config.pipeline.completeness_threshold_percent, 80.0);
        assert!(config.pipeline.required_competencies.is_empty());
        assert!(!config.pipeline.accept_unmatched_as_new);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn pipeline_settings_are_read_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("KINERJA_DIRECTORY_CSV", "data/pegawai.csv");
        env::set_var("KINERJA_FUZZY_THRESHOLD", "0.9");
        env::set_var("KINERJA_COMPLETENESS_THRESHOLD", "65");
        env::set_var("KINERJA_ACCEPT_UNMATCHED_AS_NEW", " Yes ");
        env::set_var(
            "KINERJA_REQUIRED_COMPETENCIES",
            " Integritas ,Kerja  Sama,,",
        );

        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.pipeline.directory_csv,
            Some(PathBuf::from("data/pegawai.csv"))
        );
        assert_eq!(config.pipeline.fuzzy_threshold, 0.9);
        assert!(config.pipeline.accept_unmatched_as_new);
        let policy = config.pipeline.validation_policy();
        assert_eq!(policy.completeness_threshold_percent, 65.0);
        assert_eq!(
            policy.required_competencies,
            vec!["Integritas".to_string(), "Kerja Sama".to_string()]
        );
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("KINERJA_FUZZY_THRESHOLD", "1.5");
        let error = AppConfig::load().expect_err("threshold above one");
        assert!(matches!(
            error,
            ConfigError::InvalidThreshold {
                variable: "KINERJA_FUZZY_THRESHOLD",
                ..
            }
        ));
        reset_env();
    }

    #[test]
    fn rejects_unrecognized_flag_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("KINERJA_ACCEPT_UNMATCHED_AS_NEW", "maybe");
        let error = AppConfig::load().expect_err("flag is not a boolean");
        assert!(matches!(
            error,
            ConfigError::InvalidFlag {
                variable: "KINERJA_ACCEPT_UNMATCHED_AS_NEW",
                ..
            }
        ));
        reset_env();
    }
}
