//! Run configuration, persisted as TOML.

use std::path::Path;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::AdapterConfig;
use crate::interpreter::InterpreterConfig;

/// Errors loading or saving a config file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(sem::config::read),
        help("Ensure the config file exists, or create one with `sem-rewrite init-config <path>`.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(sem::config::parse),
        help("Check the TOML syntax; unknown keys are ignored and missing keys take defaults.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(sem::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Settings for one rewrite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Rule applications allowed per sentence before giving up.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Ontology call timeout for guards; no timeout when unset.
    #[serde(default)]
    pub guard_timeout_ms: Option<u64>,
    /// Skip rules whose mandatory predicates and constants are absent.
    #[serde(default = "default_true")]
    pub term_coverage: bool,
    #[serde(default = "default_true")]
    pub pos_literals: bool,
    #[serde(default = "default_true")]
    pub lemma_literals: bool,
    #[serde(default = "default_true")]
    pub sense_literals: bool,
    /// Drop dependencies on numeric tokens when augmentation clauses exist.
    #[serde(default = "default_true")]
    pub scrub_numeric_dependencies: bool,
    /// `tracing` filter used by the binary when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_max_iterations() -> usize {
    1000
}
fn default_true() -> bool {
    true
}
fn default_log_filter() -> String {
    "info".into()
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            guard_timeout_ms: None,
            term_coverage: true,
            pos_literals: true,
            lemma_literals: true,
            sense_literals: true,
            scrub_numeric_dependencies: true,
            log_filter: default_log_filter(),
        }
    }
}

impl RewriteConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_guard_timeout(mut self, timeout: Duration) -> Self {
        self.guard_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_term_coverage(mut self, enabled: bool) -> Self {
        self.term_coverage = enabled;
        self
    }

    pub fn with_adapter(mut self, adapter: &AdapterConfig) -> Self {
        self.pos_literals = adapter.pos_literals;
        self.lemma_literals = adapter.lemma_literals;
        self.sense_literals = adapter.sense_literals;
        self
    }

    pub fn guard_timeout(&self) -> Option<Duration> {
        self.guard_timeout_ms.map(Duration::from_millis)
    }

    pub fn interpreter(&self) -> InterpreterConfig {
        InterpreterConfig {
            max_iterations: self.max_iterations,
            term_coverage: self.term_coverage,
        }
    }

    pub fn adapter(&self) -> AdapterConfig {
        AdapterConfig {
            pos_literals: self.pos_literals,
            lemma_literals: self.lemma_literals,
            sense_literals: self.sense_literals,
        }
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = RewriteConfig::default();
        assert_eq!(cfg.max_iterations, 1000);
        assert!(cfg.guard_timeout().is_none());
        assert!(cfg.term_coverage && cfg.scrub_numeric_dependencies);
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.adapter(), AdapterConfig::default());
    }

    #[test]
    fn config_roundtrip_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("sem.toml");

        let cfg = RewriteConfig::default()
            .with_max_iterations(50)
            .with_guard_timeout(Duration::from_millis(250))
            .with_term_coverage(false);
        cfg.save(&path).unwrap();

        let loaded = RewriteConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.interpreter().max_iterations, 50);
        assert!(!loaded.interpreter().term_coverage);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let cfg: RewriteConfig = toml::from_str("max_iterations = 12\nlemma_literals = false\n").unwrap();
        assert_eq!(cfg.max_iterations, 12);
        assert!(!cfg.adapter().lemma_literals);
        assert!(cfg.adapter().pos_literals);
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn bad_toml_reports_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "max_iterations = \"many\"").unwrap();
        let err = RewriteConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(matches!(
            RewriteConfig::load(&tmp.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
