use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use crate::core::ModelIdentifier;

const DEFAULT_PORT: u16 = 8000;

pub struct ScribeConfig {
    pub host: Host,
    pub lock_timeout: Duration,
    pub lock_file: Option<PathBuf>,
    pub models_dir: PathBuf,
    pub device: DevicePreference,
    pub default_model: ModelIdentifier,
    pub preload: bool,
    pub prediction_timeout: Option<Duration>,
    pub log_level: Level,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePreference {
    Cpu,
    Auto,
}

impl FromStr for DevicePreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(DevicePreference::Cpu),
            "auto" | "" => Ok(DevicePreference::Auto),
            other => anyhow::bail!("unknown device preference: {other}"),
        }
    }
}

impl ScribeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; invalid values fall back
    /// to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: Host::parse(&parsed("SCRIBE_HOST").unwrap_or_else(|| "127.0.0.1:8000".to_string())),
            lock_timeout: Duration::from_secs(
                parsed("SCRIBE_LOCK_TIMEOUT")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(10),
            ),
            lock_file: parsed("SCRIBE_LOCK_FILE").map(|p| expand_home(&p)),
            models_dir: parsed("SCRIBE_MODELS")
                .map(|p| expand_home(&p))
                .unwrap_or_else(default_models_dir),
            device: parsed("SCRIBE_DEVICE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DevicePreference::Auto),
            default_model: parsed("SCRIBE_DEFAULT_MODEL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(ModelIdentifier::Gpt2),
            preload: parsed("SCRIBE_PRELOAD")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
            prediction_timeout: parsed("SCRIBE_PREDICTION_TIMEOUT")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis),
            log_level: parsed("SCRIBE_LOG")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(Level::INFO),
        }
    }
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Host {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.rsplit_once(':') {
            Some((host, port)) => Self {
                host: host.to_string(),
                port: port.parse().unwrap_or(DEFAULT_PORT),
            },
            None => Self {
                host: value.to_string(),
                port: DEFAULT_PORT,
            },
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off")
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

pub fn default_models_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cache")
        .join("scribe")
}
