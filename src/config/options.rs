//! Resolved orchestrator configuration.
//!
//! [`OrchestratorConfig`] is the fully layered result of CLI flags, the
//! configuration file and built-in defaults. It is built once in `main` and
//! passed by reference into every phase.

use std::path::PathBuf;

use serde::Deserialize;

use super::platform::{Configuration, HostPlatform};

/// Where the Resonite mod loader picks up plugins on a default Steam install.
pub const DEFAULT_HOST_MODS_DIRECTORY: &str =
    "C:/Program Files (x86)/Steam/steamapps/common/Resonite/rml_mods/";

/// A project declared in the configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSpec {
    /// Project name, also the directory name under the workspace root.
    pub name: String,

    /// Whether this project is a test suite run by the test phase.
    ///
    /// Defaults to `true` for names ending in `Tests`.
    #[serde(default)]
    pub test: Option<bool>,

    /// Test binary to execute, relative to the project's output directory.
    #[serde(default)]
    pub test_executable: Option<String>,
}

impl ProjectSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test: None,
            test_executable: None,
        }
    }

    #[must_use]
    pub fn is_test(&self) -> bool {
        self.test.unwrap_or_else(|| self.name.ends_with("Tests"))
    }
}

/// Destination of an artifact copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyTarget {
    /// Another project's output directory.
    Project(String),
    /// A directory outside the workspace, used verbatim.
    External(PathBuf),
}

/// An artifact copy declared in the configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopySpec {
    pub from: String,
    pub to: CopyTarget,
    /// Copy this file from the source's output directory instead of the
    /// project's shared library.
    pub artifact: Option<String>,
}

/// Configuration for a complete orchestration run.
#[derive(Clone, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct OrchestratorConfig {
    /// Directory containing the solution, the cargo workspace and all projects.
    pub workspace_root: PathBuf,

    pub configuration: Configuration,

    /// Platform whose artifact naming conventions apply.
    pub platform: HostPlatform,

    /// Stop at the first build failure instead of collecting every failure.
    pub fail_fast: bool,

    /// Copy the mod payload into [`Self::host_mods_directory`] after building.
    pub install_to_host: bool,

    pub host_mods_directory: PathBuf,

    /// Projects whose artifacts form the host payload. Empty means every
    /// non-test project.
    pub host_payload: Vec<String>,

    /// Ordered project list. Empty means discover from the workspace root.
    pub projects: Vec<ProjectSpec>,

    /// Artifact copies. Empty means every non-test native library is copied
    /// into every managed project.
    pub copies: Vec<CopySpec>,

    /// Wipe CMake build directories before configuring.
    pub fresh_cmake_builds: bool,

    /// CMake generator and architecture; platform default when `None`.
    pub cmake_generator: Option<String>,
    pub cmake_architecture: Option<String>,
}

impl OrchestratorConfig {
    /// Default configuration for a workspace rooted at `workspace_root`.
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            configuration: Configuration::default(),
            platform: HostPlatform::current(),
            fail_fast: true,
            install_to_host: false,
            host_mods_directory: PathBuf::from(DEFAULT_HOST_MODS_DIRECTORY),
            host_payload: Vec::new(),
            projects: Vec::new(),
            copies: Vec::new(),
            fresh_cmake_builds: true,
            cmake_generator: None,
            cmake_architecture: None,
        }
    }

    /// Effective CMake generator and architecture.
    ///
    /// The platform default architecture only applies together with the
    /// platform default generator; an explicit generator gets `-A` only when
    /// an architecture is configured too.
    #[must_use]
    pub fn cmake_generator(&self) -> (Option<String>, Option<String>) {
        match &self.cmake_generator {
            Some(generator) => (Some(generator.clone()), self.cmake_architecture.clone()),
            None => {
                let default = self.platform.default_cmake_generator();
                let architecture = self
                    .cmake_architecture
                    .clone()
                    .or_else(|| default.map(|(_, a)| a.to_string()));
                (default.map(|(g, _)| g.to_string()), architecture)
            }
        }
    }
}
