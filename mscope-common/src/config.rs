//! Configuration loading
//!
//! Resolution priority, highest first:
//! 1. Command-line overrides (applied by the binary after `resolve()`)
//! 2. Environment variables (`MSCOPE_DATA_ROOTS`, `MSCOPE_DATABASE`, `MSCOPE_ROOT_POLICY`)
//! 3. TOML config file (`--config` or `<config_dir>/mscope/config.toml`)
//! 4. Compiled defaults
//!
//! A missing default TOML file is not an error: the resolver logs a warning and
//! continues with defaults. An explicitly requested file that cannot be read is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Path list of candidate data roots, separated like `PATH`
pub const ENV_DATA_ROOTS: &str = "MSCOPE_DATA_ROOTS";
/// SQLite database file
pub const ENV_DATABASE: &str = "MSCOPE_DATABASE";
/// `first-match` or `error-on-ambiguous`
pub const ENV_ROOT_POLICY: &str = "MSCOPE_ROOT_POLICY";

/// How the path resolver treats a recording directory present under several roots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootPolicy {
    /// Use the first root (in configured order) that contains the directory
    #[default]
    FirstMatch,
    /// Refuse to pick when more than one root contains the directory
    ErrorOnAmbiguous,
}

impl RootPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootPolicy::FirstMatch => "first-match",
            RootPolicy::ErrorOnAmbiguous => "error-on-ambiguous",
        }
    }
}

impl FromStr for RootPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "first-match" | "first" => Ok(RootPolicy::FirstMatch),
            "error-on-ambiguous" | "error" | "strict" => Ok(RootPolicy::ErrorOnAmbiguous),
            other => Err(Error::Config(format!(
                "Unknown root policy '{}' (expected 'first-match' or 'error-on-ambiguous')",
                other
            ))),
        }
    }
}

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Process-wide ingest configuration, set once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Candidate root directories, tried in order
    pub data_roots: Vec<PathBuf>,

    /// Behaviour when several roots contain a recording directory
    pub root_policy: RootPolicy,

    /// SQLite database file; `None` uses the platform data directory
    pub database_path: Option<PathBuf>,

    /// Coefficient of variation of inter-frame intervals above which a
    /// recording is flagged with an inconsistent frame rate warning
    pub frame_rate_cv_threshold: f64,

    /// Recordings processed concurrently by one scheduler
    pub max_concurrent_recordings: usize,

    /// Age after which another worker may take over a claim
    pub claim_ttl_seconds: u64,

    pub logging: LoggingConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_roots: Vec::new(),
            root_policy: RootPolicy::FirstMatch,
            database_path: None,
            frame_rate_cv_threshold: 0.1,
            max_concurrent_recordings: 1,
            claim_ttl_seconds: 3600,
            logging: LoggingConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Configured database path, or the platform default
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.frame_rate_cv_threshold.is_finite() || self.frame_rate_cv_threshold < 0.0 {
            return Err(Error::Config(format!(
                "frame_rate_cv_threshold must be a non-negative number, got {}",
                self.frame_rate_cv_threshold
            )));
        }
        if self.max_concurrent_recordings == 0 {
            return Err(Error::Config(
                "max_concurrent_recordings must be at least 1".to_string(),
            ));
        }
        if self.data_roots.iter().any(|r| r.as_os_str().is_empty()) {
            return Err(Error::Config("data_roots contains an empty path".to_string()));
        }
        Ok(())
    }

    /// Apply environment overrides on top of the current values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(roots) = std::env::var_os(ENV_DATA_ROOTS) {
            let roots: Vec<PathBuf> = std::env::split_paths(&roots)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            if !roots.is_empty() {
                debug!(count = roots.len(), "Data roots taken from {}", ENV_DATA_ROOTS);
                self.data_roots = roots;
            }
        }

        if let Some(db) = std::env::var_os(ENV_DATABASE) {
            if !db.is_empty() {
                self.database_path = Some(PathBuf::from(db));
            }
        }

        if let Ok(policy) = std::env::var(ENV_ROOT_POLICY) {
            self.root_policy = policy.parse()?;
        }

        Ok(())
    }
}

/// Resolves [`IngestConfig`] from file, environment and defaults
#[derive(Debug, Default)]
pub struct ConfigResolver {
    config_file: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit config file instead of the platform default
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn resolve(&self) -> Result<IngestConfig> {
        let mut config = match &self.config_file {
            Some(path) => load_toml_config(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => match load_toml_config(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("Ignoring config file {}: {}", path.display(), e);
                        IngestConfig::default()
                    }
                },
                _ => {
                    info!("No config file found, using defaults");
                    IngestConfig::default()
                }
            },
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<IngestConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: IngestConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// `<config_dir>/mscope/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mscope").join("config.toml"))
}

/// `<data_local_dir>/mscope/mscope.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mscope"))
        .unwrap_or_else(|| PathBuf::from("./mscope_data"))
        .join("mscope.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_policy_parsing() {
        assert_eq!("first-match".parse::<RootPolicy>().unwrap(), RootPolicy::FirstMatch);
        assert_eq!(
            "Error_On_Ambiguous".parse::<RootPolicy>().unwrap(),
            RootPolicy::ErrorOnAmbiguous
        );
        assert!("sometimes".parse::<RootPolicy>().is_err());
    }

    #[test]
    fn test_defaults_validate() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.root_policy, RootPolicy::FirstMatch);
        assert_eq!(config.max_concurrent_recordings, 1);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = IngestConfig {
            max_concurrent_recordings: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: IngestConfig = toml::from_str(
            r#"
            data_roots = ["/mnt/a", "/mnt/b"]
            root_policy = "error-on-ambiguous"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_roots, vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")]);
        assert_eq!(config.root_policy, RootPolicy::ErrorOnAmbiguous);
        assert_eq!(config.frame_rate_cv_threshold, 0.1);
        assert_eq!(config.logging.level, "info");
    }
}
