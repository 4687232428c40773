//! Artifact location and copying.
//!
//! A project's shared library is found by probing a platform-specific list
//! of file names in its output directory, then copied into another project's
//! output directory or into an external directory such as the host
//! application's mods folder.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::HostPlatform;
use crate::error::{Error, Result};
use crate::project::{NativeToolchain, Project, ProjectKind};
use crate::resolver::Resolver;

/// File name stem of a native library.
///
/// Cargo replaces `-` with `_` in library file names; CMake keeps the
/// target name as is.
#[must_use]
pub fn library_stem(name: &str, toolchain: NativeToolchain) -> String {
    match toolchain {
        NativeToolchain::Cargo => name.replace('-', "_"),
        NativeToolchain::CMake => name.to_string(),
    }
}

/// Artifact file names for a project, in search order.
///
/// Unknown projects have no candidates.
#[must_use]
pub fn candidate_filenames(name: &str, kind: ProjectKind, platform: HostPlatform) -> Vec<String> {
    match kind {
        ProjectKind::Managed => vec![format!("{name}.dll")],
        ProjectKind::Native(toolchain) => {
            let stem = library_stem(name, toolchain);
            match platform {
                HostPlatform::Windows => vec![format!("{stem}.dll"), format!("lib{stem}.dll")],
                HostPlatform::Linux => vec![format!("lib{stem}.so")],
                HostPlatform::Macos => vec![format!("lib{stem}.dylib")],
            }
        }
        ProjectKind::Unknown => Vec::new(),
    }
}

/// A located build artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtifactReference {
    pub project: String,

    /// Every path that was searched, in order
    pub candidates: Vec<PathBuf>,

    /// The first candidate that exists
    pub path: PathBuf,
}

/// Where a copy task puts its artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// The output directory of another project
    Project(Project),

    /// A directory outside the workspace, used verbatim
    External(PathBuf),
}

/// One artifact copy between projects or into an external directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyTask {
    pub source: Project,
    pub destination: Destination,

    /// Copy this file instead of the source's shared library
    pub artifact: Option<String>,
}

impl CopyTask {
    #[must_use]
    pub const fn new(source: Project, destination: Destination) -> Self {
        Self {
            source,
            destination,
            artifact: None,
        }
    }

    #[must_use]
    pub fn with_artifact(mut self, artifact: Option<String>) -> Self {
        self.artifact = artifact;
        self
    }

    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self.destination, Destination::External(_))
    }

    /// Human-readable destination label.
    #[must_use]
    pub fn destination_label(&self) -> String {
        match &self.destination {
            Destination::Project(project) => project.name.clone(),
            Destination::External(dir) => dir.display().to_string(),
        }
    }
}

/// Record of a completed copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CopiedArtifact {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub size: u64,
    pub external: bool,
}

/// Locates and copies artifacts using a [`Resolver`] for output paths.
pub struct ArtifactCopier<'a> {
    resolver: &'a Resolver,
    platform: HostPlatform,
}

impl<'a> ArtifactCopier<'a> {
    #[must_use]
    pub const fn new(resolver: &'a Resolver, platform: HostPlatform) -> Self {
        Self { resolver, platform }
    }

    /// Find the artifact `project` produced.
    ///
    /// With `artifact` set, only that file name is searched for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactNotFound`] when no candidate exists, or the
    /// resolver's error when the output directory cannot be determined.
    pub fn locate(&self, project: &Project, artifact: Option<&str>) -> Result<ArtifactReference> {
        if project.kind == ProjectKind::Unknown {
            return Err(Error::UnknownProjectKind {
                name: project.name.clone(),
                path: project.root_path.clone(),
            });
        }

        let output_dir = self.resolver.output_dir(project)?;
        let names = match artifact {
            Some(name) => vec![name.to_string()],
            None => candidate_filenames(&project.name, project.kind, self.platform),
        };
        let candidates: Vec<PathBuf> = names.iter().map(|n| output_dir.join(n)).collect();

        let found = candidates.iter().find(|path| path.is_file()).cloned();

        match found {
            Some(path) => Ok(ArtifactReference {
                project: project.name.clone(),
                path,
                candidates,
            }),
            None => Err(Error::ArtifactNotFound {
                name: project.name.clone(),
                searched: candidates,
            }),
        }
    }

    /// Directory a copy task writes into, before creation.
    ///
    /// # Errors
    ///
    /// Propagates output-path resolution errors for project destinations.
    pub fn destination_dir(&self, destination: &Destination) -> Result<PathBuf> {
        match destination {
            Destination::Project(project) => self.resolver.output_dir(project),
            Destination::External(dir) => Ok(dir.clone()),
        }
    }

    /// Execute one copy task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactNotFound`] when the source artifact is missing
    /// and [`Error::CopyIo`] on filesystem failures.
    pub fn copy(&self, task: &CopyTask) -> Result<CopiedArtifact> {
        let artifact = self.locate(&task.source, task.artifact.as_deref())?;
        let dest_dir = self.destination_dir(&task.destination)?;

        let destination = copy_into(&artifact.path, &dest_dir)?;
        let size = fs::metadata(&destination)
            .map_err(|e| Error::copy_io(&artifact.path, &destination, e))?
            .len();

        info!(
            from = %artifact.path.display(),
            to = %destination.display(),
            "copied artifact"
        );

        Ok(CopiedArtifact {
            source: artifact.path,
            destination,
            size,
            external: task.is_external(),
        })
    }
}

/// Copy `source` into `dest_dir`, keeping its file name.
///
/// The directory tree is created if needed. The data goes to a temporary
/// file in `dest_dir` first and is renamed over the final path, so a
/// concurrently starting process never loads a half-written library. The
/// source's permissions and modification time are carried over.
///
/// # Errors
///
/// Returns [`Error::CopyIo`] on any filesystem failure.
pub fn copy_into(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| {
        Error::copy_io(
            source,
            dest_dir,
            io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"),
        )
    })?;
    let destination = dest_dir.join(file_name);
    let io_err = |e: io::Error| Error::copy_io(source, &destination, e);

    fs::create_dir_all(dest_dir).map_err(io_err)?;

    let mut input = File::open(source).map_err(io_err)?;
    let metadata = input.metadata().map_err(io_err)?;

    let mut staged = NamedTempFile::new_in(dest_dir).map_err(io_err)?;
    io::copy(&mut input, staged.as_file_mut()).map_err(io_err)?;
    staged.as_file().sync_all().map_err(io_err)?;

    if let Ok(modified) = metadata.modified() {
        staged.as_file().set_modified(modified).map_err(io_err)?;
    }
    fs::set_permissions(staged.path(), metadata.permissions()).map_err(io_err)?;

    staged
        .persist(&destination)
        .map_err(|e| Error::copy_io(source, &destination, e.error))?;

    debug!(path = %destination.display(), "artifact in place");

    Ok(destination)
}
