//! Configuration file support.
//!
//! The orchestrator reads `krysalis.toml` from the workspace root (or the
//! file given with `--config`). Values from the file serve as defaults that
//! CLI arguments override.
//!
//! # Layering
//!
//! The precedence order is: **CLI argument > config file > hardcoded default**.
//!
//! # Example config
//!
//! ```toml
//! configuration = "release"
//! fail_fast = true
//!
//! [host]
//! install = true
//! mods_directory = "~/.steam/steam/steamapps/common/Resonite/rml_mods"
//! payload = ["KrysalisManaged", "KrysalisNative"]
//!
//! [cmake]
//! fresh = true
//! generator = "Ninja"
//!
//! [[projects]]
//! name = "KrysalisNative"
//!
//! [[projects]]
//! name = "KrysalisManagedTests"
//!
//! [[copies]]
//! from = "KrysalisNative"
//! to = "KrysalisManagedTests"
//!
//! [[copies]]
//! from = "KrysalisManagedTestApplication"
//! to = "KrysalisManagedTestRunner"
//! artifact = "KrysalisManagedTestApplication.exe"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::options::{CopySpec, CopyTarget, OrchestratorConfig, ProjectSpec};
use super::platform::{Configuration, HostPlatform};

/// Name of the configuration file looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "krysalis.toml";

/// Top-level configuration file structure.
///
/// All scalar fields are `Option<T>` so that only values present in the file
/// override the defaults.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub configuration: Option<Configuration>,

    pub platform: Option<HostPlatform>,

    pub fail_fast: Option<bool>,

    #[serde(default)]
    pub host: FileHostConfig,

    #[serde(default)]
    pub cmake: FileCmakeConfig,

    #[serde(default)]
    pub projects: Vec<ProjectSpec>,

    #[serde(default)]
    pub copies: Vec<FileCopyConfig>,
}

/// Host application install options.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileHostConfig {
    pub install: Option<bool>,

    pub mods_directory: Option<PathBuf>,

    pub payload: Option<Vec<String>>,
}

/// CMake options.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileCmakeConfig {
    /// Wipe the build directory before configuring
    pub fresh: Option<bool>,

    pub generator: Option<String>,

    pub architecture: Option<String>,
}

/// One `[[copies]]` entry. Exactly one of `to` and `external` must be set.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileCopyConfig {
    pub from: String,
    pub to: Option<String>,
    pub external: Option<PathBuf>,
    pub artifact: Option<String>,
}

impl FileCopyConfig {
    fn into_spec(self) -> Result<CopySpec> {
        let to = match (self.to, self.external) {
            (Some(project), None) => CopyTarget::Project(project),
            (None, Some(dir)) => CopyTarget::External(expand_tilde(&dir)),
            (Some(_), Some(_)) => {
                return Err(Error::Config(format!(
                    "copy from '{}' sets both `to` and `external`",
                    self.from
                )));
            }
            (None, None) => {
                return Err(Error::Config(format!(
                    "copy from '{}' needs either `to` or `external`",
                    self.from
                )));
            }
        };

        Ok(CopySpec {
            from: self.from,
            to,
            artifact: self.artifact,
        })
    }
}

/// Expand a leading `~` in a path to the user's home directory.
///
/// Paths that don't start with `~` are returned unchanged.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

impl FileConfig {
    /// Returns the path where the configuration file is expected for a workspace.
    #[must_use]
    pub fn config_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_FILE_NAME)
    }

    /// Load configuration from `path`.
    ///
    /// A missing file yields the default (empty) configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not valid.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Layer this file's values over `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a `[[copies]]` entry is malformed.
    pub fn apply(self, config: &mut OrchestratorConfig) -> Result<()> {
        if let Some(configuration) = self.configuration {
            config.configuration = configuration;
        }
        if let Some(platform) = self.platform {
            config.platform = platform;
        }
        if let Some(fail_fast) = self.fail_fast {
            config.fail_fast = fail_fast;
        }

        if let Some(install) = self.host.install {
            config.install_to_host = install;
        }
        if let Some(dir) = self.host.mods_directory {
            config.host_mods_directory = expand_tilde(&dir);
        }
        if let Some(payload) = self.host.payload {
            config.host_payload = payload;
        }

        if let Some(fresh) = self.cmake.fresh {
            config.fresh_cmake_builds = fresh;
        }
        config.cmake_generator = self.cmake.generator.or(config.cmake_generator.take());
        config.cmake_architecture = self
            .cmake
            .architecture
            .or(config.cmake_architecture.take());

        if !self.projects.is_empty() {
            config.projects = self.projects;
        }

        if !self.copies.is_empty() {
            config.copies = self
                .copies
                .into_iter()
                .map(FileCopyConfig::into_spec)
                .collect::<Result<_>>()?;
        }

        Ok(())
    }
}
