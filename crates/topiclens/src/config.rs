//! Process settings resolved from environment-style key/value lookups.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_KAFKA_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingBrokers,
    InvalidValue { key: String, value: String },
    MissingTlsFile { key: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingBrokers => {
                write!(f, "KAFKA_BROKERS must list at least one broker address")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{value}' for {key}")
            }
            ConfigError::MissingTlsFile { key } => {
                write!(f, "{key} is required when ENABLE_TLS is true")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub brokers: Vec<String>,
    pub port: u16,
    /// Base timeout for every broker round trip.
    pub kafka_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub tls: Option<TlsSettings>,
    pub environment: String,
    pub log_level: String,
}

/// Parses `500ms`, `5s`, `2m`, `1h` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "" | "s" => Some(Duration::from_secs(amount)),
        "ms" => Some(Duration::from_millis(amount)),
        "m" => Some(Duration::from_secs(amount.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(amount.checked_mul(3600)?)),
        _ => None,
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Splits a comma-separated broker list, trimming entries and dropping empties.
pub fn parse_brokers(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a timeout, rejecting zero.
pub fn parse_timeout(input: &str) -> Option<Duration> {
    parse_duration(input).filter(|d| !d.is_zero())
}

/// Typed, not yet validated settings. Absent values fall back to defaults in [`build`].
///
/// [`build`]: SettingsBuilder::build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsBuilder {
    pub brokers: Option<String>,
    pub port: Option<u16>,
    pub kafka_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub enable_tls: bool,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub environment: Option<String>,
    pub log_level: Option<String>,
}

impl SettingsBuilder {
    pub fn build(self) -> Result<Settings, ConfigError> {
        let brokers = self
            .brokers
            .map(|raw| parse_brokers(&raw))
            .unwrap_or_default();
        if brokers.is_empty() {
            return Err(ConfigError::MissingBrokers);
        }

        let tls = if self.enable_tls {
            let file = |path: Option<PathBuf>, key: &str| {
                path.filter(|p| !p.as_os_str().is_empty())
                    .ok_or_else(|| ConfigError::MissingTlsFile {
                        key: key.to_string(),
                    })
            };
            Some(TlsSettings {
                cert_file: file(self.cert_file, "CERT_FILE")?,
                key_file: file(self.key_file, "KEY_FILE")?,
            })
        } else {
            None
        };

        Ok(Settings {
            brokers,
            port: self.port.unwrap_or(DEFAULT_PORT),
            kafka_timeout: self.kafka_timeout.unwrap_or(DEFAULT_KAFKA_TIMEOUT),
            read_timeout: self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT),
            write_timeout: self.write_timeout.unwrap_or(DEFAULT_WRITE_TIMEOUT),
            tls,
            environment: self
                .environment
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            log_level: self
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

impl Settings {
    /// Builds settings from any key lookup using the environment variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let invalid = |key: &str, value: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let timeout = |key: &str| {
            lookup(key)
                .map(|raw| parse_timeout(&raw).ok_or_else(|| invalid(key, &raw)))
                .transpose()
        };

        let port = lookup("PORT")
            .map(|raw| raw.trim().parse::<u16>().map_err(|_| invalid("PORT", &raw)))
            .transpose()?;
        let enable_tls = lookup("ENABLE_TLS")
            .map(|raw| parse_bool(&raw).ok_or_else(|| invalid("ENABLE_TLS", &raw)))
            .transpose()?
            .unwrap_or(false);

        SettingsBuilder {
            brokers: lookup("KAFKA_BROKERS"),
            port,
            kafka_timeout: timeout("KAFKA_TIMEOUT")?,
            read_timeout: timeout("READ_TIMEOUT")?,
            write_timeout: timeout("WRITE_TIMEOUT")?,
            enable_tls,
            cert_file: lookup("CERT_FILE").map(PathBuf::from),
            key_file: lookup("KEY_FILE").map(PathBuf::from),
            environment: lookup("ENVIRONMENT"),
            log_level: lookup("LOG_LEVEL"),
        }
        .build()
    }

    /// Upper bound for handling one HTTP request.
    pub fn request_timeout(&self) -> Duration {
        self.read_timeout
            .max(self.write_timeout)
            .max(self.kafka_timeout * 2)
    }
}
