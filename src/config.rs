use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::notifier::{
    normalizer::NoticeDefaults,
    types::{DEFAULT_TIMEOUT_MS, NoticeMap, ReporterOptions},
};

pub const ENV_PROJECT: &str = "FAULTLINE_PROJECT";
pub const ENV_API_KEY: &str = "FAULTLINE_API_KEY";
pub const ENV_ENDPOINT: &str = "FAULTLINE_ENDPOINT";
pub const ENV_TIMEOUT_MS: &str = "FAULTLINE_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotifierConfig {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1, max = 600_000))]
    pub timeout_ms: u64,
    #[serde(default)]
    pub context: NoticeMap,
    #[serde(default)]
    pub environment: NoticeMap,
    #[serde(default)]
    pub params: NoticeMap,
    #[serde(default)]
    pub session: NoticeMap,
    #[serde(default)]
    pub start_offline: bool,
    #[serde(default)]
    #[validate(nested)]
    pub connectivity_probe: Option<ProbeConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_probe_interval_ms() -> u64 {
    5_000
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_enabled_true() -> bool {
    true
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            project: None,
            api_key: None,
            endpoint: None,
            timeout_ms: default_timeout_ms(),
            context: NoticeMap::new(),
            environment: NoticeMap::new(),
            params: NoticeMap::new(),
            session: NoticeMap::new(),
            start_offline: false,
            connectivity_probe: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// TCP reachability check used to drive connectivity when the host has no
/// signal of its own.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct ProbeConfig {
    #[validate(length(min = 1))]
    pub address: String,
    #[serde(default = "default_probe_interval_ms")]
    #[validate(range(min = 10))]
    pub interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    /// JSON log files are written here when set.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_enabled_true")]
    pub stderr_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_logging_filter(),
            dir: None,
            rotation: default_logging_rotation(),
            stderr_enabled: true,
        }
    }
}

impl NotifierConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let mut config = Self::parse(&config_content)
            .with_context(|| format!("failed to load {}", config_path.display()))?;

        if let Some(dir) = config.logging.dir.as_mut()
            && dir.is_relative()
        {
            let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
            *dir = config_base.join(&*dir);
        }

        Ok(config)
    }

    /// Parses and validates JSON5 text.
    pub fn parse(text: &str) -> Result<Self> {
        let config_value: Value = json5::from_str(text).context("failed to parse notifier config")?;
        let config: NotifierConfig = serde_json::from_value(config_value)
            .context("failed to deserialize notifier config")?;
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|errors| anyhow!("notifier config validation failed: {errors}"))
    }

    /// Applies `FAULTLINE_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(project) = lookup(ENV_PROJECT) {
            self.project = Some(project);
        }
        if let Some(api_key) = lookup(ENV_API_KEY) {
            self.api_key = Some(api_key);
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = Some(endpoint);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = timeout
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_MS} must be an integer, got '{timeout}'"))?;
        }
        self.check()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reporter_options(&self) -> ReporterOptions {
        ReporterOptions {
            project: self.project.clone(),
            api_key: self.api_key.clone(),
            endpoint: self.endpoint.clone(),
            timeout: self.timeout(),
        }
    }

    pub fn notice_defaults(&self) -> NoticeDefaults {
        NoticeDefaults {
            context: self.context.clone(),
            environment: self.environment.clone(),
            params: self.params.clone(),
            session: self.session.clone(),
        }
    }
}
