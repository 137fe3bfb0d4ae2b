//! core::config
//!
//! Repository config (`.pancake/config`) and global config
//! (`~/.config/pancake/config.toml`), grounded in the teacher's
//! `core::config::schema` layering (global defaults overridden per-repo),
//! rewritten around pancake's own TOML shape (spec §6).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no home directory available for global config")]
    NoHomeDir,
}

/// `.pancake/config`, per spec §6.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepoConfig {
    #[serde(default)]
    pub repository: RepositorySection,
    #[serde(default)]
    pub pr: PrSection,
    #[serde(default)]
    pub stack: StackSection,
    #[serde(default)]
    pub forge: ForgeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySection {
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_main_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Default for RepositorySection {
    fn default() -> Self {
        Self {
            main_branch: default_main_branch(),
            remote: default_remote(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrSection {
    #[serde(default)]
    pub auto_submit: bool,
    #[serde(default)]
    pub draft_by_default: bool,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSection {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_max_depth() -> usize {
    20
}

impl Default for StackSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ForgeSection {
    #[serde(default)]
    pub api_token: Option<String>,
}

impl RepoConfig {
    pub fn load(pancake_dir: &Path) -> Result<Self, ConfigError> {
        let path = pancake_dir.join("config");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn save(&self, pancake_dir: &Path) -> Result<(), ConfigError> {
        let path = pancake_dir.join("config");
        let toml = toml::to_string_pretty(self).expect("RepoConfig always serializes");
        std::fs::write(&path, toml).map_err(|source| ConfigError::Io { path, source })
    }

    /// Resolve the forge API token: repo config wins, then `GITHUB_TOKEN`,
    /// then `GITLAB_TOKEN`, per spec §6 environment variable fallbacks.
    pub fn resolve_api_token(&self) -> Option<String> {
        self.forge
            .api_token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .or_else(|| std::env::var("GITLAB_TOKEN").ok())
    }
}

/// `~/.config/pancake/config.toml`: user-wide preferences that apply across
/// repositories, grounded in the teacher's global config layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default)]
    pub pager: Option<String>,
    #[serde(default)]
    pub aliases: std::collections::BTreeMap<String, String>,
}

impl GlobalConfig {
    /// The path honoring `PANCAKE_CONFIG`, else `~/.config/pancake/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Ok(p) = std::env::var("PANCAKE_CONFIG") {
            return Ok(PathBuf::from(p));
        }
        let home = dirs::config_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join("pancake").join("config.toml"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RepoConfig::default();
        assert_eq!(cfg.repository.main_branch, "main");
        assert_eq!(cfg.repository.remote, "origin");
        assert_eq!(cfg.stack.max_depth, 20);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = RepoConfig::default();
        cfg.repository.main_branch = "trunk".into();
        cfg.pr.auto_submit = true;
        cfg.save(dir.path()).unwrap();

        let loaded = RepoConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.repository.main_branch, "trunk");
        assert!(loaded.pr.auto_submit);
    }

    #[test]
    fn token_falls_back_to_env() {
        std::env::set_var("GITHUB_TOKEN", "test-token-123");
        let cfg = RepoConfig::default();
        assert_eq!(cfg.resolve_api_token(), Some("test-token-123".to_string()));
        std::env::remove_var("GITHUB_TOKEN");
    }
}
