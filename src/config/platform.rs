//! Host platform and build configuration selection.

use std::fmt::{self, Display, Formatter};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Operating system the artifacts are built for.
///
/// Only affects artifact naming and the default CMake generator; the
/// orchestrator itself runs the same way everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPlatform {
    Windows,
    Linux,
    #[value(alias = "darwin")]
    #[serde(alias = "darwin")]
    Macos,
}

impl HostPlatform {
    /// The platform this binary was compiled for.
    #[cfg(target_os = "windows")]
    #[must_use]
    pub const fn current() -> Self {
        Self::Windows
    }

    #[cfg(target_os = "macos")]
    #[must_use]
    pub const fn current() -> Self {
        Self::Macos
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    #[must_use]
    pub const fn current() -> Self {
        Self::Linux
    }

    /// Suffix appended to executables (`.exe` on Windows, nothing elsewhere).
    #[must_use]
    pub const fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux | Self::Macos => "",
        }
    }

    /// CMake generator used when none is configured.
    ///
    /// Windows builds go through MSBuild; elsewhere CMake picks its own
    /// default (usually Makefiles or Ninja).
    #[must_use]
    pub const fn default_cmake_generator(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Windows => Some(("Visual Studio 17 2022", "x64")),
            Self::Linux | Self::Macos => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Macos => "macos",
        }
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::current()
    }
}

impl Display for HostPlatform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build configuration passed to every toolchain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Configuration {
    #[default]
    Release,
    Debug,
}

impl Configuration {
    /// Name used by `dotnet` and multi-config CMake generators.
    #[must_use]
    pub const fn msbuild_name(self) -> &'static str {
        match self {
            Self::Release => "Release",
            Self::Debug => "Debug",
        }
    }

    /// Directory cargo writes this profile to, under `target/`.
    #[must_use]
    pub const fn cargo_profile_dir(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Debug => "debug",
        }
    }

    #[must_use]
    pub const fn is_release(self) -> bool {
        matches!(self, Self::Release)
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.msbuild_name())
    }
}
