//! Batch configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.config/salsa2lp-sync/
//!   config.yaml        (optional, every key optional)
//!   Credentials.txt    (OAuth credential, mode 0600)
//!   Packages.txt       (overrides: "<package> <group>" per line)
//! ~/.cache/salsa2lp-sync/
//!   <package>/         (one staging workspace per in-flight package)
//! ```
//!
//! # API pattern
//!
//! Every loader has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{PackageName, PackageRef};

/// Directory name used under `~/.config` and `~/.cache`.
pub const APP_NAME: &str = "salsa2lp-sync";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.config/salsa2lp-sync`
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(".config").join(APP_NAME)
}

/// `<home>/.cache/salsa2lp-sync`
pub fn cache_dir_at(home: &Path) -> PathBuf {
    home.join(".cache").join(APP_NAME)
}

/// `<home>/.config/salsa2lp-sync/config.yaml`
pub fn config_file_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// 2. Types
// ---------------------------------------------------------------------------

/// Identity recorded on commits pushed to the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

impl Default for Committer {
    fn default() -> Self {
        Self {
            name: APP_NAME.to_string(),
            email: format!("{APP_NAME}@localhost"),
        }
    }
}

/// Everything the batch runner needs; passed explicitly, never global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Parent of all per-package staging workspaces.
    pub staging_root: PathBuf,
    pub credential_path: PathBuf,
    pub overrides_path: PathBuf,
    /// Destination owner (Launchpad team).
    pub team: String,
    /// Archive the daily recipe builds into.
    pub ppa_name: String,
    /// Distribution series recipes are created against.
    pub target_series: String,
    pub distribution: String,
    /// Host serving packaging repositories.
    pub source_host: String,
    pub default_source_group: String,
    /// Host serving destination git repositories.
    pub git_host: String,
    pub default_branch: String,
    /// Lifetime requested for destination access tokens.
    pub token_ttl_secs: u64,
    /// Number of packages processed concurrently.
    pub jobs: usize,
    pub committer: Committer,
}

/// On-disk shape of `config.yaml`. Absent keys keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppa_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_source_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Committer>,
}

impl SyncConfig {
    /// Built-in defaults rooted at `home`.
    pub fn defaults_at(home: &Path) -> Self {
        let config_dir = config_dir_at(home);
        Self {
            staging_root: cache_dir_at(home),
            credential_path: config_dir.join("Credentials.txt"),
            overrides_path: config_dir.join("Packages.txt"),
            team: "lomiri".to_string(),
            ppa_name: "builds".to_string(),
            target_series: "24.04".to_string(),
            distribution: "ubuntu".to_string(),
            source_host: "salsa.debian.org".to_string(),
            default_source_group: "ubports-team".to_string(),
            git_host: "git.launchpad.net".to_string(),
            default_branch: "main".to_string(),
            token_ttl_secs: 3600,
            jobs: 1,
            committer: Committer::default(),
        }
    }

    /// Destination repository path: `~<team>/+git/<package>`.
    pub fn repository_path(&self, package: &PackageName) -> String {
        format!("~{}/+git/{}", self.team, package)
    }

    /// Clone URL of a package's packaging repository.
    pub fn source_url(&self, package: &PackageRef) -> String {
        format!(
            "https://{}/{}/{}.git",
            self.source_host, package.source_group, package.name
        )
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "jobs",
                message: "must be at least 1".to_string(),
            });
        }
        if self.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "token_ttl_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        for (field, value) in [
            ("team", &self.team),
            ("ppa_name", &self.ppa_name),
            ("default_branch", &self.default_branch),
            ("default_source_group", &self.default_source_group),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field,
                    message: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    fn apply(mut self, file: ConfigFile, home: &Path) -> Self {
        if let Some(path) = file.staging_root {
            self.staging_root = expand_home(&path, home);
        }
        if let Some(path) = file.credential_path {
            self.credential_path = expand_home(&path, home);
        }
        if let Some(path) = file.overrides_path {
            self.overrides_path = expand_home(&path, home);
        }
        if let Some(v) = file.team {
            self.team = v;
        }
        if let Some(v) = file.ppa_name {
            self.ppa_name = v;
        }
        if let Some(v) = file.target_series {
            self.target_series = v;
        }
        if let Some(v) = file.distribution {
            self.distribution = v;
        }
        if let Some(v) = file.source_host {
            self.source_host = v;
        }
        if let Some(v) = file.default_source_group {
            self.default_source_group = v;
        }
        if let Some(v) = file.git_host {
            self.git_host = v;
        }
        if let Some(v) = file.default_branch {
            self.default_branch = v;
        }
        if let Some(v) = file.token_ttl_secs {
            self.token_ttl_secs = v;
        }
        if let Some(v) = file.jobs {
            self.jobs = v;
        }
        if let Some(v) = file.committer {
            self.committer = v;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load configuration for `home`: defaults, then `config.yaml` if present.
///
/// Returns `ConfigError::Parse` (with path + line context) if malformed.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    let defaults = SyncConfig::defaults_at(home);
    let path = config_file_at(home);
    if !path.exists() {
        return Ok(defaults);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let file: ConfigFile = if contents.trim().is_empty() {
        ConfigFile::default()
    } else {
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            source: e,
        })?
    };
    tracing::debug!("loaded configuration from {}", path.display());
    let config = defaults.apply(file, home);
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home()?)
}

/// The current user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
