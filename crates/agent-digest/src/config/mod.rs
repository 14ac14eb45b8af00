use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::agents::DomainSite;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

/// Top-level configuration for the digest mailer.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub domain: DomainSite,
    pub search: SearchConfig,
    pub mail: MailConfig,
    pub dispatch: DispatchConfig,
    pub paths: PathsConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::parse(&var_or("APP_ENV", "development"));

        let domain = DomainSite {
            id: parse_var("DIGEST_DOMAIN_ID", 1)?,
            name: var_or("DIGEST_DOMAIN_NAME", "localhost"),
            language: var_or("DIGEST_DOMAIN_LANGUAGE", "ru"),
        };

        let search = SearchConfig {
            base_url: var_or("SEARCH_URL", "http://127.0.0.1:9200"),
            index_prefix: var_or("SEARCH_INDEX_PREFIX", "offers"),
            timeout: Duration::from_secs(parse_var("SEARCH_TIMEOUT_SECS", 10)?),
        };

        let region = var_or("MAILGUN_REGION", "us");
        let region = MailRegion::parse(&region).ok_or(ConfigError::InvalidRegion(region))?;
        let mail = MailConfig {
            api_key: var_or("MAILGUN_API_KEY", ""),
            domain: var_or("MAILGUN_DOMAIN", ""),
            region,
            from_address: var_or("MAIL_FROM", "Job Agent <agent@localhost>"),
            timeout: Duration::from_secs(parse_var("MAIL_TIMEOUT_SECS", 15)?),
            templates_dir: PathBuf::from(var_or("MAIL_TEMPLATES_DIR", "templates/mail")),
        };

        let dispatch = DispatchConfig {
            concurrency: parse_var::<usize>("DISPATCH_CONCURRENCY", 4)?.max(1),
            max_attempts: parse_var::<u32>("DISPATCH_MAX_ATTEMPTS", 3)?.max(1),
            initial_backoff: Duration::from_millis(parse_var("DISPATCH_BACKOFF_MS", 500)?),
        };

        let paths = PathsConfig {
            locale_dir: PathBuf::from(var_or("LOCALE_DIR", "locale")),
            subscribers: PathBuf::from(var_or("SUBSCRIBERS_PATH", "subscribers.json")),
        };

        let log_level = var_or("APP_LOG_LEVEL", "info");

        Ok(Self {
            environment,
            domain,
            search,
            mail,
            dispatch,
            paths,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        Err(_) => Ok(default),
    }
}

/// Search cluster endpoint and per-request limits.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: String,
    pub index_prefix: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailRegion {
    Us,
    Eu,
}

impl MailRegion {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "us" | "" => Some(Self::Us),
            "eu" => Some(Self::Eu),
            _ => None,
        }
    }

    pub const fn api_base(self) -> &'static str {
        match self {
            Self::Us => "https://api.mailgun.net",
            Self::Eu => "https://api.eu.mailgun.net",
        }
    }
}

/// Outbound mail provider settings.
#[derive(Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub domain: String,
    pub region: MailRegion,
    pub from_address: String,
    pub timeout: Duration,
    pub templates_dir: PathBuf,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("domain", &self.domain)
            .field("region", &self.region)
            .field("from_address", &self.from_address)
            .field("timeout", &self.timeout)
            .field("templates_dir", &self.templates_dir)
            .finish_non_exhaustive()
    }
}

/// Worker pool and retry controls for a run.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub locale_dir: PathBuf,
    pub subscribers: PathBuf,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    InvalidRegion(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidRegion(value) => {
                write!(f, "MAILGUN_REGION must be 'us' or 'eu', got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

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
            "APP_LOG_LEVEL",
            "DIGEST_DOMAIN_ID",
            "DIGEST_DOMAIN_NAME",
            "DIGEST_DOMAIN_LANGUAGE",
            "SEARCH_URL",
            "SEARCH_INDEX_PREFIX",
            "SEARCH_TIMEOUT_SECS",
            "MAILGUN_REGION",
            "DISPATCH_CONCURRENCY",
            "DISPATCH_MAX_ATTEMPTS",
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
        assert_eq!(config.domain.language, "ru");
        assert_eq!(config.search.index_prefix, "offers");
        assert_eq!(config.search.timeout, Duration::from_secs(10));
        assert_eq!(config.dispatch.concurrency, 4);
        assert_eq!(config.mail.region, MailRegion::Us);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn production_aliases_are_recognised() {
        assert_eq!(AppEnvironment::parse("PRODUCTION"), AppEnvironment::Production);
        assert_eq!(AppEnvironment::parse(" prod "), AppEnvironment::Production);
        assert_eq!(AppEnvironment::parse("ci"), AppEnvironment::Test);
        assert_eq!(AppEnvironment::parse("staging"), AppEnvironment::Development);
    }

    #[test]
    fn rejects_non_numeric_limits() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DISPATCH_CONCURRENCY", "many");
        let err = AppConfig::load().expect_err("invalid concurrency rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "DISPATCH_CONCURRENCY",
                ..
            }
        ));
        reset_env();
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DISPATCH_CONCURRENCY", "0");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.dispatch.concurrency, 1);
        reset_env();
    }
}
