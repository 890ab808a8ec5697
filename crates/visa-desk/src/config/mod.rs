use chrono::{Duration, Weekday};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::scheduling::AgentSelectionPolicy;

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
    pub scheduling: SchedulingConfig,
    pub catalog: CatalogConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");

        let scheduling = SchedulingConfig::from_env()?;
        let catalog = CatalogConfig {
            csv_path: env::var("VISA_CATALOG_CSV")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scheduling,
            catalog,
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

/// Where the requirement catalog is seeded from.
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    pub csv_path: Option<PathBuf>,
}

/// Business rules for booking and moving appointments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingConfig {
    /// First hour (inclusive) an appointment may start at.
    pub office_open_hour: u32,
    /// Hour (exclusive) after which no appointment may start.
    pub office_close_hour: u32,
    pub business_days: Vec<Weekday>,
    pub max_weeks_ahead: u32,
    pub appointment_duration: Duration,
    pub min_cancel_lead_days: i64,
    pub min_reprogram_lead_days: i64,
    pub agent_policy: AgentSelectionPolicy,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            office_open_hour: 8,
            office_close_hour: 12,
            business_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
            max_weeks_ahead: 2,
            appointment_duration: Duration::minutes(60),
            min_cancel_lead_days: 3,
            min_reprogram_lead_days: 3,
            agent_policy: AgentSelectionPolicy::FirstAvailableByName,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let business_days = match env::var("VISA_BUSINESS_DAYS") {
            Ok(raw) if !raw.trim().is_empty() => parse_weekdays(&raw)?,
            _ => defaults.business_days.clone(),
        };

        let agent_policy = match env::var("VISA_AGENT_POLICY") {
            Ok(raw) if !raw.trim().is_empty() => AgentSelectionPolicy::parse(&raw)
                .ok_or_else(|| ConfigError::InvalidPolicy(raw.trim().to_string()))?,
            _ => defaults.agent_policy,
        };

        let config = Self {
            office_open_hour: int_var("VISA_OFFICE_OPEN_HOUR", defaults.office_open_hour)?,
            office_close_hour: int_var("VISA_OFFICE_CLOSE_HOUR", defaults.office_close_hour)?,
            business_days,
            max_weeks_ahead: int_var("VISA_MAX_WEEKS_AHEAD", defaults.max_weeks_ahead)?,
            appointment_duration: Duration::minutes(int_var("VISA_APPOINTMENT_MINUTES", 60)?),
            min_cancel_lead_days: int_var(
                "VISA_MIN_CANCEL_LEAD_DAYS",
                defaults.min_cancel_lead_days,
            )?,
            min_reprogram_lead_days: int_var(
                "VISA_MIN_REPROGRAM_LEAD_DAYS",
                defaults.min_reprogram_lead_days,
            )?,
            agent_policy,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.office_open_hour >= self.office_close_hour || self.office_close_hour > 24 {
            return Err(ConfigError::InvalidOfficeHours {
                open: self.office_open_hour,
                close: self.office_close_hour,
            });
        }
        if self.business_days.is_empty() {
            return Err(ConfigError::NoBusinessDays);
        }
        if self.appointment_duration <= Duration::zero() {
            return Err(ConfigError::InvalidInteger {
                variable: "VISA_APPOINTMENT_MINUTES",
                value: self.appointment_duration.num_minutes().to_string(),
            });
        }
        Ok(())
    }

    pub fn is_business_day(&self, weekday: Weekday) -> bool {
        self.business_days.contains(&weekday)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn int_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidInteger {
                    variable: key,
                    value: raw,
                })
        }
        _ => Ok(default),
    }
}

fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>, ConfigError> {
    let mut days = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let day = token
            .parse::<Weekday>()
            .map_err(|_| ConfigError::InvalidWeekday(token.to_string()))?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.is_empty() {
        return Err(ConfigError::NoBusinessDays);
    }
    Ok(days)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidInteger { variable: &'static str, value: String },
    InvalidTimestamp { variable: &'static str, value: String },
    InvalidOfficeHours { open: u32, close: u32 },
    InvalidWeekday(String),
    NoBusinessDays,
    InvalidPolicy(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidInteger { variable, value } => {
                write!(f, "{variable} must be a positive integer (got '{value}')")
            }
            ConfigError::InvalidTimestamp { variable, value } => {
                write!(f, "{variable} is not a valid local timestamp (got '{value}')")
            }
            ConfigError::InvalidOfficeHours { open, close } => write!(
                f,
                "office hours must satisfy open < close <= 24 (got {open}..{close})"
            ),
            ConfigError::InvalidWeekday(token) => {
                write!(f, "VISA_BUSINESS_DAYS contains an unknown weekday '{token}'")
            }
            ConfigError::NoBusinessDays => {
                write!(f, "VISA_BUSINESS_DAYS must name at least one weekday")
            }
            ConfigError::InvalidPolicy(value) => write!(
                f,
                "VISA_AGENT_POLICY must be 'first_available' or 'least_loaded' (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
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
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "VISA_OFFICE_OPEN_HOUR",
            "VISA_OFFICE_CLOSE_HOUR",
            "VISA_BUSINESS_DAYS",
            "VISA_MAX_WEEKS_AHEAD",
            "VISA_APPOINTMENT_MINUTES",
            "VISA_MIN_CANCEL_LEAD_DAYS",
            "VISA_MIN_REPROGRAM_LEAD_DAYS",
            "VISA_AGENT_POLICY",
            "VISA_CATALOG_CSV",
        ] {
            env::remove_var(key);
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
        assert_eq!(config.scheduling, SchedulingConfig::default());
        assert!(config.catalog.csv_path.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn scheduling_overrides_are_parsed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("VISA_OFFICE_OPEN_HOUR", "9");
        env::set_var("VISA_OFFICE_CLOSE_HOUR", "17");
        env::set_var("VISA_BUSINESS_DAYS", "mon, wed ,fri");
        env::set_var("VISA_MIN_CANCEL_LEAD_DAYS", "4");
        env::set_var("VISA_MIN_REPROGRAM_LEAD_DAYS", "8");
        env::set_var("VISA_AGENT_POLICY", "least_loaded");

        let config = SchedulingConfig::from_env().expect("overrides parse");
        assert_eq!(config.office_open_hour, 9);
        assert_eq!(config.office_close_hour, 17);
        assert_eq!(
            config.business_days,
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
        assert_eq!(config.min_cancel_lead_days, 4);
        assert_eq!(config.min_reprogram_lead_days, 8);
        assert_eq!(config.agent_policy, AgentSelectionPolicy::LeastLoaded);
        reset_env();
    }

    #[test]
    fn rejects_inverted_office_hours() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("VISA_OFFICE_OPEN_HOUR", "14");
        env::set_var("VISA_OFFICE_CLOSE_HOUR", "10");
        match SchedulingConfig::from_env() {
            Err(ConfigError::InvalidOfficeHours { open: 14, close: 10 }) => {}
            other => panic!("expected invalid office hours, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_unknown_weekday_and_policy() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("VISA_BUSINESS_DAYS", "mon,funday");
        assert!(matches!(
            SchedulingConfig::from_env(),
            Err(ConfigError::InvalidWeekday(token)) if token == "funday"
        ));

        reset_env();
        env::set_var("VISA_AGENT_POLICY", "round_robin");
        assert!(matches!(
            SchedulingConfig::from_env(),
            Err(ConfigError::InvalidPolicy(_))
        ));
        reset_env();
    }
}
