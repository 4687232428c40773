//! Error types for the build orchestrator.
//!
//! Every failure the orchestrator can hit is a variant of [`Error`]. Nothing
//! below `main` terminates the process; errors travel up the call chain and
//! `main` decides the exit code through [`Error::exit_code`].

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::builder::BuildReport;
use crate::runner::ExecutionError;

/// Exit code for build, resolution and copy failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code used when everything built but at least one test suite failed.
pub const EXIT_TESTS_FAILED: u8 = 2;

/// Errors that can occur while orchestrating a build.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(
        "Cannot determine the kind of project '{name}': no {name}.csproj, Cargo.toml or CMakeLists.txt in {}",
        .path.display()
    )]
    UnknownProjectKind { name: String, path: PathBuf },

    #[error("Cannot resolve the output directory of '{name}': {reason}")]
    OutputPathUnresolved { name: String, reason: String },

    #[error("No artifact produced by '{name}' (searched: {})", display_paths(.searched))]
    ArtifactNotFound { name: String, searched: Vec<PathBuf> },

    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    CopyIo {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Test executable for '{name}' not found at {}", .path.display())]
    TestExecutableNotFound { name: String, path: PathBuf },

    #[error("{} build step(s) failed", .0.failures().count())]
    BuildFailed(BuildReport),

    #[error("Tests failed for: {}", .0.join(", "))]
    TestsFailed(Vec<String>),

    #[error("Project '{0}' is not part of the project list")]
    UnknownProject(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Test failures get their own code so CI can tell a red test suite apart
    /// from a broken build.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::TestsFailed(_) => EXIT_TESTS_FAILED,
            _ => EXIT_FAILURE,
        }
    }

    pub(crate) fn copy_io(from: &Path, to: &Path, source: std::io::Error) -> Self {
        Self::CopyIo {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }

    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
