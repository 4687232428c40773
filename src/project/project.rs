//! Core project data structures and types.
//!
//! This module defines how a single sub-project of the workspace is
//! represented once its kind has been resolved.

use std::{
    fmt::{Display, Formatter, Result},
    path::PathBuf,
};

use serde::Serialize;

/// Toolchain that builds a native project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeToolchain {
    /// A crate with a `Cargo.toml`, possibly a member of the root workspace
    Cargo,

    /// A C/C++ project with a `CMakeLists.txt`
    CMake,
}

/// Build-system kind of a project.
///
/// Produced by a single classification function and matched exhaustively
/// everywhere else, so a project is never treated as two kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "toolchain")]
pub enum ProjectKind {
    /// .NET project identified by `<name>/<name>.csproj`
    Managed,

    /// Native project identified by a `Cargo.toml` or `CMakeLists.txt`
    Native(NativeToolchain),

    /// No marker file was found
    Unknown,
}

impl ProjectKind {
    #[must_use]
    pub const fn is_managed(self) -> bool {
        matches!(self, Self::Managed)
    }

    #[must_use]
    pub const fn is_native(self) -> bool {
        matches!(self, Self::Native(_))
    }
}

impl Display for ProjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Managed => write!(f, "managed"),
            Self::Native(NativeToolchain::Cargo) => write!(f, "native (cargo)"),
            Self::Native(NativeToolchain::CMake) => write!(f, "native (cmake)"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A resolved sub-project of the workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Project {
    /// Project name; also its directory name and artifact base name
    pub name: String,

    pub kind: ProjectKind,

    /// Directory holding the project's marker file
    pub root_path: PathBuf,

    /// Whether the test phase runs this project
    pub is_test: bool,

    /// Test binary relative to the output directory, when not the default
    pub test_executable: Option<String>,
}

impl Project {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ProjectKind, root_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            kind,
            root_path,
            is_test: false,
            test_executable: None,
        }
    }

    /// Mark this project as a test suite.
    #[must_use]
    pub fn with_test(mut self, is_test: bool, test_executable: Option<String>) -> Self {
        self.is_test = is_test;
        self.test_executable = test_executable;
        self
    }

    /// Path of the `.csproj` for managed projects.
    #[must_use]
    pub fn csproj_path(&self) -> PathBuf {
        self.root_path.join(format!("{}.csproj", self.name))
    }
}

impl Display for Project {
    /// Format the project with an icon for its kind, e.g. `🦀 KrysalisNative (./KrysalisNative)`.
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let icon = match self.kind {
            ProjectKind::Managed => "🔷",
            ProjectKind::Native(NativeToolchain::Cargo) => "🦀",
            ProjectKind::Native(NativeToolchain::CMake) => "⚙️",
            ProjectKind::Unknown => "❓",
        };

        write!(f, "{icon} {} ({})", self.name, self.root_path.display())
    }
}
