use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::{InsightsError, Result};
use crate::model::DataOrigin;

// ======================================================
// CONSTANTS
// ======================================================

const HOME_ENV: &str = "CLOUD_INSIGHTS_HOME";
const API_URL_ENV: &str = "CLOUD_INSIGHTS_API_URL";
const API_TIMEOUT_ENV: &str = "CLOUD_INSIGHTS_API_TIMEOUT";
const DATA_SOURCE_ENV: &str = "CLOUD_INSIGHTS_DATA_SOURCE";
const OUTPUT_DIR_ENV: &str = "CLOUD_INSIGHTS_OUTPUT_DIR";

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GENERATION_DELAY_MS: u64 = 1500;

// ======================================================
// CONFIG FILE
// ======================================================

/// Contents of `~/.cloud-insights/config.yaml`. Every key is optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_timeout_secs: Option<u64>,

    /// `sample` or `live`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataOrigin>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// Length of the simulated generation step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_delay_ms: Option<u64>,

    /// Keep a reload cache of the wizard session (never includes the secret).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cache: Option<bool>,
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url:          Option<String>,
    pub api_timeout_secs: Option<u64>,
    pub data_source:      Option<DataOrigin>,
    pub output_dir:       Option<String>,
}

// ======================================================
// PATHS
// ======================================================

/// `$CLOUD_INSIGHTS_HOME`, or `~/.cloud-insights`.
pub fn app_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = dirs::home_dir()
        .ok_or_else(|| InsightsError::Config("Could not determine home directory".to_string()))?;
    Ok(home.join(".cloud-insights"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("config.yaml"))
}

pub fn session_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("session.json"))
}

// ======================================================
// LOAD / SAVE
// ======================================================

/// Missing file means defaults. An unreadable file is reported and ignored.
pub fn load_config(path: &Path) -> AppConfig {
    let raw = match fs::read_to_string(path) {
        Ok(r) => r,
        Err(_) => return AppConfig::default(),
    };
    match serde_yaml::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(config)
        .map_err(|e| InsightsError::Config(format!("Failed to serialize config: {}", e)))?;
    fs::write(path, yaml)?;
    Ok(())
}

/// Apply `config set <key> <value>` to a loaded file.
pub fn set_value(config: &mut AppConfig, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    let number = |v: &str| {
        v.parse::<u64>()
            .map_err(|_| InsightsError::Config(format!("'{}' expects a number, got '{}'", key, v)))
    };

    match key {
        "api_url" => {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(InsightsError::Config(format!(
                    "API URL must start with http:// or https://, got '{}'",
                    value
                )));
            }
            config.api_url = Some(value.to_string());
        }
        "api_timeout_secs"    => config.api_timeout_secs = Some(number(value)?),
        "data_source"         => config.data_source = Some(value.parse()?),
        "output_dir"          => config.output_dir = Some(value.to_string()),
        "generation_delay_ms" => config.generation_delay_ms = Some(number(value)?),
        "session_cache" => {
            config.session_cache = Some(match value.to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1"  => true,
                "false" | "off" | "no" | "0" => false,
                other => {
                    return Err(InsightsError::Config(format!(
                        "'session_cache' expects true or false, got '{}'",
                        other
                    )))
                }
            });
        }
        other => {
            return Err(InsightsError::Config(format!(
                "Unknown config key '{}'. Supported: api_url, api_timeout_secs, data_source, \
                 output_dir, generation_delay_ms, session_cache",
                other
            )))
        }
    }
    Ok(())
}

// ======================================================
// RESOLUTION
// ======================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env(&'static str),
    File,
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Flag     => write!(f, "command line"),
            ValueSource::Env(var) => write!(f, "{} env var", var),
            ValueSource::File     => write!(f, "config file"),
            ValueSource::Default  => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_url:          String,
    pub api_timeout:      Duration,
    pub data_source:      DataOrigin,
    pub output_dir:       PathBuf,
    pub generation_delay: Duration,
    pub session_cache:    bool,
    /// Where each user-settable value came from, for `config show`.
    pub sources:          Vec<(&'static str, ValueSource)>,
}

/// Pick the first value present: flag, environment variable, config file.
fn pick<T>(
    flag: Option<T>,
    env_var: &'static str,
    env: &dyn Fn(&str) -> Option<String>,
    parse: impl Fn(&str) -> Result<T>,
    file: Option<T>,
) -> Result<Option<(T, ValueSource)>> {
    if let Some(v) = flag {
        return Ok(Some((v, ValueSource::Flag)));
    }
    if let Some(raw) = env(env_var).filter(|v| !v.trim().is_empty()) {
        return Ok(Some((parse(raw.trim())?, ValueSource::Env(env_var))));
    }
    Ok(file.map(|v| (v, ValueSource::File)))
}

/// Resolve with precedence: flag > environment variable > config file > default.
pub fn resolve(
    file: &AppConfig,
    overrides: &Overrides,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let mut sources = Vec::new();

    let (api_url, src) = pick(
        overrides.api_url.clone(),
        API_URL_ENV,
        env,
        |s| Ok(s.to_string()),
        file.api_url.clone(),
    )?
    .unwrap_or_else(|| (DEFAULT_API_URL.to_string(), ValueSource::Default));
    if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
        return Err(InsightsError::Config(format!(
            "API URL must start with http:// or https://, got '{}'",
            api_url
        )));
    }
    sources.push(("api_url", src));

    let (timeout_secs, src) = pick(
        overrides.api_timeout_secs,
        API_TIMEOUT_ENV,
        env,
        |s| {
            s.parse::<u64>()
                .map_err(|_| InsightsError::Config(format!("Invalid {}: '{}'", API_TIMEOUT_ENV, s)))
        },
        file.api_timeout_secs,
    )?
    .unwrap_or((DEFAULT_API_TIMEOUT_SECS, ValueSource::Default));
    if timeout_secs == 0 {
        return Err(InsightsError::Config("API timeout must be at least 1 second".to_string()));
    }
    sources.push(("api_timeout_secs", src));

    let (data_source, src) = pick(
        overrides.data_source,
        DATA_SOURCE_ENV,
        env,
        |s| s.parse::<DataOrigin>(),
        file.data_source,
    )?
    .unwrap_or((DataOrigin::Sample, ValueSource::Default));
    sources.push(("data_source", src));

    let (output_dir, src) = pick(
        overrides.output_dir.clone(),
        OUTPUT_DIR_ENV,
        env,
        |s| Ok(s.to_string()),
        file.output_dir.clone(),
    )?
    .unwrap_or_else(|| (".".to_string(), ValueSource::Default));
    sources.push(("output_dir", src));

    Ok(ResolvedConfig {
        api_url,
        api_timeout: Duration::from_secs(timeout_secs),
        data_source,
        output_dir: PathBuf::from(output_dir),
        generation_delay: Duration::from_millis(
            file.generation_delay_ms.unwrap_or(DEFAULT_GENERATION_DELAY_MS),
        ),
        session_cache: file.session_cache.unwrap_or(true),
        sources,
    })
}

/// Resolve against the real process environment and config file.
pub fn resolve_from_environment(overrides: &Overrides) -> Result<ResolvedConfig> {
    let file = load_config(&config_path()?);
    resolve(&file, overrides, &|key| std::env::var(key).ok())
}

pub fn show_config(resolved: &ResolvedConfig) -> Result<()> {
    let path = config_path()?;
    let source_of = |key: &str| {
        resolved
            .sources
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, s)| s.to_string())
            .unwrap_or_else(|| "default".to_string())
    };

    println!();
    println!("Cloud Insights Config");
    println!("{}", "─".repeat(50));
    println!("  config file       : {}", path.display());
    println!("  api_url           : {} ({})", resolved.api_url, source_of("api_url"));
    println!(
        "  api_timeout_secs  : {} ({})",
        resolved.api_timeout.as_secs(),
        source_of("api_timeout_secs")
    );
    println!("  data_source       : {} ({})", resolved.data_source, source_of("data_source"));
    println!(
        "  output_dir        : {} ({})",
        resolved.output_dir.display(),
        source_of("output_dir")
    );
    println!("  generation_delay  : {}ms", resolved.generation_delay.as_millis());
    println!("  session_cache     : {}", resolved.session_cache);
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let resolved = resolve(&AppConfig::default(), &Overrides::default(), &env_from(&[])).unwrap();
        assert_eq!(resolved.api_url, DEFAULT_API_URL);
        assert_eq!(resolved.api_timeout, Duration::from_secs(30));
        assert_eq!(resolved.data_source, DataOrigin::Sample);
        assert!(resolved.session_cache);
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let file = AppConfig {
            api_url: Some("http://file:1".into()),
            api_timeout_secs: Some(10),
            ..AppConfig::default()
        };
        let env = env_from(&[(API_URL_ENV, "http://env:2"), (API_TIMEOUT_ENV, "20")]);

        let resolved = resolve(&file, &Overrides::default(), &env).unwrap();
        assert_eq!(resolved.api_url, "http://env:2");
        assert_eq!(resolved.api_timeout, Duration::from_secs(20));

        let flags = Overrides { api_url: Some("http://flag:3".into()), ..Overrides::default() };
        let resolved = resolve(&file, &flags, &env).unwrap();
        assert_eq!(resolved.api_url, "http://flag:3");
        assert!(resolved.sources.contains(&("api_url", ValueSource::Flag)));
    }

    #[test]
    fn invalid_env_values_are_config_errors() {
        let env = env_from(&[(API_TIMEOUT_ENV, "soon")]);
        let err = resolve(&AppConfig::default(), &Overrides::default(), &env).unwrap_err();
        assert!(matches!(err, InsightsError::Config(_)));

        let env = env_from(&[(API_URL_ENV, "ftp://nope")]);
        assert!(resolve(&AppConfig::default(), &Overrides::default(), &env).is_err());
    }

    #[test]
    fn config_file_round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = AppConfig {
            api_url: Some("https://reports.internal:8443".into()),
            data_source: Some(DataOrigin::Live),
            session_cache: Some(false),
            ..AppConfig::default()
        };
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn set_value_validates_keys_and_values() {
        let mut config = AppConfig::default();
        set_value(&mut config, "data_source", "live").unwrap();
        set_value(&mut config, "session_cache", "off").unwrap();
        set_value(&mut config, "generation_delay_ms", "0").unwrap();
        assert_eq!(config.data_source, Some(DataOrigin::Live));
        assert_eq!(config.session_cache, Some(false));
        assert_eq!(config.generation_delay_ms, Some(0));

        assert!(set_value(&mut config, "api_timeout_secs", "fast").is_err());
        assert!(set_value(&mut config, "colour", "blue").is_err());
        assert!(set_value(&mut config, "api_url", "localhost").is_err());
    }

    #[test]
    fn unreadable_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "api_timeout_secs: [not a number").unwrap();
        assert_eq!(load_config(&path), AppConfig::default());
    }
}
