use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

/// Prefix of environment variables configuring the job queue.
pub const JOB_QUEUE_ENV_PREFIX: &str = "JOBHUB_JOB_QUEUE_";

/// Backend keys may only use these characters (compiled once at first use)
static BACKEND_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:-]*$").expect("backend key regex"));

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub job_queue: Option<JobQueueSection>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

/// `[job_queue]`: `class` selects the backend, every other key is a backend option.
#[derive(Debug, Deserialize)]
pub struct JobQueueSection {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
pub fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    Err(ConfigError::Parse(
        "failed to parse config as any supported format".into(),
    ))
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub job_queue: JobQueueConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

/// Job queue selection. An empty `class` means no queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobQueueConfig {
    pub class: String,
    pub options: BTreeMap<String, Value>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(()),
    }
}

/// Interpret an environment value as a backend option.
///
/// `true`/`false` become booleans and numbers become numbers; anything else
/// is kept as a string.
pub fn parse_option_value(s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(s.to_string())
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
}

/// Merge a parsed file over the defaults.
pub fn apply_raw(cfg: &mut Config, raw: RawConfigFile) {
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
    }
    if let Some(queue) = raw.job_queue {
        apply_opt!(cfg.job_queue.class, queue.class);
        cfg.job_queue.options.extend(queue.options);
    }
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        apply_raw(&mut cfg, raw);
    }

    apply_env_overrides(&mut cfg, env::vars())?;

    Ok(cfg)
}

/// Apply `JOBHUB_*` overrides taken from `vars` to config
pub fn apply_env_overrides<I>(cfg: &mut Config, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        match key.as_str() {
            "JOBHUB_LOG_LEVEL" => cfg.logging.level = value,
            "JOBHUB_LOG_JSON" => {
                cfg.logging.json = parse_bool(&value)
                    .map_err(|_| ConfigError::Parse(format!("invalid {}", key)))?;
            }
            _ => {
                let Some(option) = key.strip_prefix(JOB_QUEUE_ENV_PREFIX) else {
                    continue;
                };
                if option.is_empty() {
                    continue;
                }
                if option == "CLASS" {
                    cfg.job_queue.class = value;
                } else {
                    cfg.job_queue
                        .options
                        .insert(option.to_ascii_lowercase(), parse_option_value(&value));
                }
            }
        }
    }
    Ok(())
}

/// Validate constraints whose violation must stop startup.
///
/// The `[job_queue]` section is checked separately by [`validate_job_queue`]:
/// a bad queue configuration only disables the queue.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.logging.level.trim().is_empty() {
        return Err(ConfigError::Validation("logging.level must not be empty".into()));
    }
    Ok(())
}

/// Validate the `[job_queue]` section.
pub fn validate_job_queue(cfg: &JobQueueConfig) -> Result<(), ConfigError> {
    if !BACKEND_KEY_REGEX.is_match(cfg.class.trim()) {
        return Err(ConfigError::Validation(format!(
            "invalid job_queue.class: {}",
            cfg.class
        )));
    }

    if let Some(url) = cfg.options.get("url") {
        let Some(url) = url.as_str() else {
            return Err(ConfigError::Validation("job_queue.url must be a string".into()));
        };
        match url::Url::parse(url) {
            Ok(u) => {
                let scheme = u.scheme();
                if scheme != "redis" && scheme != "rediss" {
                    return Err(ConfigError::Validation(format!(
                        "job_queue.url must use redis or rediss: {}",
                        url
                    )));
                }
            }
            Err(_) => {
                return Err(ConfigError::Validation(format!(
                    "invalid job_queue.url: {}",
                    url
                )))
            }
        }
    }
    Ok(())
}
