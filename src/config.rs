use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "POST_BROWSER";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: None,
        }
    }
}

fn default_user_agent() -> String {
    format!("post-browser/{}", crate::VERSION)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("post-browser").join("post-browser.log"))
}

fn default_log_filter() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if !path.exists() {
            bail!("config file {} not found", path.display());
        }
        let from_file = read_config_file(path)?;
        cfg = merge_config(cfg, from_file);
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix));

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if other.api.timeout.is_some() {
        base.api.timeout = other.api.timeout;
    }

    if other.storage.path.is_some() {
        base.storage.path = other.storage.path;
    }

    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }
    if !other.log.filter.is_empty() {
        base.log.filter = other.log.filter;
    }

    base
}

fn load_env(prefix: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    let mut cfg = unset_config();
    if map.is_empty() {
        return cfg;
    }

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    cfg
}

// Every field empty, so merging it over a loaded config changes nothing.
fn unset_config() -> Config {
    Config {
        api: ApiConfig {
            user_agent: String::new(),
            timeout: None,
        },
        storage: StorageConfig { path: None },
        log: LogConfig {
            file: None,
            filter: String::new(),
        },
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = Some(duration);
            }
        }
        "storage.path" => cfg.storage.path = Some(PathBuf::from(value)),
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "log.filter" => cfg.log.filter = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("post-browser").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated(prefix: &str, config_file: Option<PathBuf>) -> LoadOptions {
        LoadOptions {
            config_file,
            env_prefix: Some(prefix.to_string()),
        }
    }

    #[test]
    fn load_defaults_from_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "{}\n").unwrap();
        let cfg = load(isolated("PB_TEST_DEFAULTS", Some(path))).unwrap();
        assert_eq!(cfg.api.timeout, None);
        assert_eq!(cfg.log.filter, "info");
        assert!(cfg.api.user_agent.starts_with("post-browser/"));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  timeout: 15s\n  user_agent: tester/1.0\nstorage:\n  path: /tmp/pb.db\nlog:\n  filter: debug\n",
        )
        .unwrap();
        let cfg = load(isolated("PB_TEST_FILE", Some(path))).unwrap();
        assert_eq!(cfg.api.timeout, Some(Duration::from_secs(15)));
        assert_eq!(cfg.api.user_agent, "tester/1.0");
        assert_eq!(cfg.storage.path, Some(PathBuf::from("/tmp/pb.db")));
        assert_eq!(cfg.log.filter, "debug");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("typo.yaml");
        let err = load(isolated("PB_TEST_MISSING", Some(missing.clone()))).unwrap_err();
        assert!(format!("{err:#}").contains(&format!(
            "config file {} not found",
            missing.display()
        )));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "api: [unclosed").unwrap();
        assert!(load(isolated("PB_TEST_BROKEN", Some(path))).is_err());
    }

    #[test]
    fn env_overrides() {
        env::set_var("PB_TEST_ENV_API__TIMEOUT", "2s");
        env::set_var("PB_TEST_ENV_LOG__FILTER", "post_browser=trace");
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "{}\n").unwrap();
        let cfg = load(isolated("PB_TEST_ENV", Some(path))).unwrap();
        assert_eq!(cfg.api.timeout, Some(Duration::from_secs(2)));
        assert_eq!(cfg.log.filter, "post_browser=trace");
        env::remove_var("PB_TEST_ENV_API__TIMEOUT");
        env::remove_var("PB_TEST_ENV_LOG__FILTER");
    }
}
