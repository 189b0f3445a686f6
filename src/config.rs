use anyhow::Result;
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: SourceConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub terminate: TerminateConfig,
}

/// Which discovery sources run, plus extra roots to scan.
#[derive(Deserialize, Debug, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub registry: bool,
    #[serde(default = "default_true")]
    pub start_menu: bool,
    #[serde(default = "default_true")]
    pub program_dirs: bool,
    #[serde(default = "default_true")]
    pub store: bool,
    #[serde(default = "default_true")]
    pub steam: bool,
    #[serde(default = "default_true")]
    pub desktop: bool,
    #[serde(default = "default_true")]
    pub system: bool,
    #[serde(default)]
    pub extra_program_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub extra_steam_libraries: Vec<PathBuf>,
}

fn default_true() -> bool { true }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            registry: true,
            start_menu: true,
            program_dirs: true,
            store: true,
            steam: true,
            desktop: true,
            system: true,
            extra_program_dirs: Vec::new(),
            extra_steam_libraries: Vec::new(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DiscoveryConfig {
    /// Wall-clock budget of the registry scan.
    #[serde(default = "default_registry_budget")]
    pub registry_budget_secs: u64,
    /// Overall budget of one discovery pass.
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
}

fn default_registry_budget() -> u64 { 15 }
fn default_deadline() -> u64 { 60 }

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            registry_budget_secs: default_registry_budget(),
            deadline_secs: default_deadline(),
        }
    }
}

impl DiscoveryConfig {
    pub fn registry_budget(&self) -> Duration {
        Duration::from_secs(self.registry_budget_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    /// Overrides the platform cache location.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_ttl_hours() -> u64 { 6 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            path: None,
        }
    }
}

impl CacheConfig {
    /// Configured TTL, saturating instead of overflowing for huge values.
    pub fn ttl(&self) -> chrono::Duration {
        i64::try_from(self.ttl_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(default_cache_path)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default = "default_suggestion_threshold")]
    pub suggestion_threshold: u8,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_threshold() -> u8 { 70 }
fn default_suggestion_threshold() -> u8 { 50 }
fn default_max_results() -> usize { 10 }
fn default_max_suggestions() -> usize { 5 }

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            suggestion_threshold: default_suggestion_threshold(),
            max_results: default_max_results(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TerminateConfig {
    #[serde(default = "default_graceful_timeout")]
    pub graceful_timeout_ms: u64,
    #[serde(default = "default_force_timeout")]
    pub force_timeout_ms: u64,
}

fn default_graceful_timeout() -> u64 { 3000 }
fn default_force_timeout() -> u64 { 2000 }

impl Default for TerminateConfig {
    fn default() -> Self {
        Self {
            graceful_timeout_ms: default_graceful_timeout(),
            force_timeout_ms: default_force_timeout(),
        }
    }
}

impl TerminateConfig {
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_timeout_ms)
    }

    pub fn force_timeout(&self) -> Duration {
        Duration::from_millis(self.force_timeout_ms)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "appctl", "appctl")
}

pub fn default_cache_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().join("applications.json"))
}

pub fn default_config_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

/// Loads `config.toml` from `path` or the platform config dir.
/// A missing file yields the defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config_path = path.unwrap_or_else(default_config_path);

    if !config_path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.matching.threshold, 70);
        assert_eq!(config.matching.suggestion_threshold, 50);
        assert_eq!(config.cache.ttl_hours, 6);
        assert_eq!(config.discovery.registry_budget_secs, 15);
        assert_eq!(config.terminate.graceful_timeout(), Duration::from_secs(3));
        assert_eq!(config.terminate.force_timeout(), Duration::from_secs(2));
        assert!(config.sources.registry && config.sources.system);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sources]
            store = false
            extra_program_dirs = ["/opt/games"]

            [matching]
            threshold = 80
            "#,
        )
        .unwrap();
        assert!(!config.sources.store);
        assert!(config.sources.steam);
        assert_eq!(config.sources.extra_program_dirs, vec![PathBuf::from("/opt/games")]);
        assert_eq!(config.matching.threshold, 80);
        assert_eq!(config.matching.max_results, 10);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.cache.ttl_hours, 6);
    }

    #[test]
    fn huge_ttl_saturates() {
        let config: Config = toml::from_str("[cache]\nttl_hours = 9223372036854775807\n").unwrap();
        assert_eq!(config.cache.ttl(), chrono::Duration::MAX);
        let long = CacheConfig { ttl_hours: 24 * 365, path: None };
        assert_eq!(long.ttl(), chrono::Duration::days(365));
        assert_eq!(CacheConfig { ttl_hours: u64::MAX, path: None }.ttl(), chrono::Duration::MAX);
    }
}
