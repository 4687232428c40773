//! Project classification and output-path resolution.
//!
//! The [`Resolver`] answers two questions about a project: what kind of
//! build system owns it, and where that build system puts its output for the
//! current configuration. Nothing is cached; every answer is recomputed from
//! the filesystem so a stale path from another configuration is never used.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::{
    config::{Configuration, OrchestratorConfig, ProjectSpec},
    error::{Error, Result},
    project::{NativeToolchain, Project, ProjectKind, Projects},
};

/// Directories that never hold a sub-project.
const EXCLUDED_DIRECTORIES: &[&str] = &["target", "bin", "obj", "build", "node_modules"];

/// Resolves project kinds and output directories under a workspace root.
#[derive(Clone, Debug)]
pub struct Resolver {
    root: PathBuf,
    configuration: Configuration,
    cmake_generator: Option<String>,
}

impl Resolver {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, configuration: Configuration) -> Self {
        Self {
            root: root.into(),
            configuration,
            cmake_generator: None,
        }
    }

    /// Build a resolver matching an orchestrator configuration.
    #[must_use]
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let (generator, _) = config.cmake_generator();
        Self::new(&config.workspace_root, config.configuration).with_cmake_generator(generator)
    }

    /// Set the CMake generator, which decides whether CMake output lands in a
    /// per-configuration subdirectory.
    #[must_use]
    pub fn with_cmake_generator(mut self, generator: Option<String>) -> Self {
        self.cmake_generator = generator;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the project called `name`.
    #[must_use]
    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Determine the build-system kind of the project called `name`.
    ///
    /// Looks, in order, for `<name>/<name>.csproj`, `<name>/Cargo.toml`
    /// and `<name>/CMakeLists.txt`. The first match wins.
    #[must_use]
    pub fn classify(&self, name: &str) -> ProjectKind {
        let dir = self.project_dir(name);

        if dir.join(format!("{name}.csproj")).is_file() {
            ProjectKind::Managed
        } else if dir.join("Cargo.toml").is_file() {
            ProjectKind::Native(NativeToolchain::Cargo)
        } else if dir.join("CMakeLists.txt").is_file() {
            ProjectKind::Native(NativeToolchain::CMake)
        } else {
            ProjectKind::Unknown
        }
    }

    /// Resolve a declared project.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProjectKind`] if no marker file exists.
    pub fn resolve(&self, spec: &ProjectSpec) -> Result<Project> {
        let kind = self.classify(&spec.name);
        let root_path = self.project_dir(&spec.name);

        if kind == ProjectKind::Unknown {
            return Err(Error::UnknownProjectKind {
                name: spec.name.clone(),
                path: root_path,
            });
        }

        debug!(project = %spec.name, kind = %kind, "classified project");

        Ok(Project::new(spec.name.clone(), kind, root_path)
            .with_test(spec.is_test(), spec.test_executable.clone()))
    }

    /// Resolve every declared project, keeping declaration order.
    ///
    /// # Errors
    ///
    /// Fails on the first project whose kind cannot be determined.
    pub fn resolve_all(&self, specs: &[ProjectSpec]) -> Result<Projects> {
        specs
            .iter()
            .map(|spec| self.resolve(spec))
            .collect::<Result<Vec<_>>>()
            .map(Projects::from)
    }

    /// Find projects by scanning the workspace root one level deep.
    ///
    /// Native projects are listed before managed ones so that standalone
    /// builds produce native libraries first.
    #[must_use]
    pub fn discover(&self) -> Vec<ProjectSpec> {
        let mut found: Vec<(ProjectKind, String)> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(Self::is_candidate_dir)
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter_map(|name| match self.classify(&name) {
                ProjectKind::Unknown => None,
                kind => Some((kind, name)),
            })
            .collect();

        found.sort_by_key(|(kind, _)| kind.is_managed());

        found
            .into_iter()
            .map(|(_, name)| ProjectSpec::new(name))
            .collect()
    }

    fn is_candidate_dir(entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }

        entry.file_name().to_str().is_some_and(|name| {
            !name.starts_with('.') && !EXCLUDED_DIRECTORIES.contains(&name)
        })
    }

    /// `[workspace]` table of the root `Cargo.toml`, if the root is a cargo
    /// workspace.
    fn workspace_table(&self) -> Option<toml::Table> {
        let manifest = self.root.join("Cargo.toml");
        let content = fs::read_to_string(&manifest).ok()?;

        match content.parse::<toml::Table>() {
            Ok(mut table) => match table.remove("workspace") {
                Some(toml::Value::Table(workspace)) => Some(workspace),
                _ => None,
            },
            Err(e) => {
                warn!(path = %manifest.display(), "unparsable workspace manifest: {e}");
                None
            }
        }
    }

    /// Whether `project` is a member of the root cargo workspace.
    ///
    /// Members share the root's output directory and are built by one
    /// `cargo build --workspace`. A crate is a member when a `members`
    /// entry matches its directory, no `exclude` entry does, and its own
    /// manifest does not declare a separate `[workspace]`.
    #[must_use]
    pub fn is_workspace_member(&self, project: &Project) -> bool {
        if project.kind != ProjectKind::Native(NativeToolchain::Cargo) {
            return false;
        }
        let Some(workspace) = self.workspace_table() else {
            return false;
        };
        let Ok(relative) = project.root_path.strip_prefix(&self.root) else {
            return false;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");

        let matches = |key: &str| {
            workspace
                .get(key)
                .and_then(toml::Value::as_array)
                .is_some_and(|entries| {
                    entries
                        .iter()
                        .filter_map(toml::Value::as_str)
                        .any(|pattern| member_pattern_matches(pattern, &relative))
                })
        };

        if !matches("members") || matches("exclude") {
            return false;
        }

        let own_manifest = project.root_path.join("Cargo.toml");
        let declares_own_workspace = fs::read_to_string(own_manifest)
            .ok()
            .and_then(|content| content.parse::<toml::Table>().ok())
            .is_some_and(|table| table.contains_key("workspace"));

        !declares_own_workspace
    }

    /// The solution file in the workspace root, if any.
    #[must_use]
    pub fn solution_file(&self) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.root).ok()?;

        let mut solutions: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|ext| ext == "sln" || ext == "slnx")
            })
            .collect();

        solutions.sort();
        solutions.into_iter().next()
    }

    /// CMake build tree of a native C/C++ project.
    #[must_use]
    pub fn cmake_build_dir(&self, project: &Project) -> PathBuf {
        project.root_path.join("build")
    }

    fn is_multi_config_generator(&self) -> bool {
        self.cmake_generator.as_deref().is_some_and(|generator| {
            generator.starts_with("Visual Studio")
                || generator == "Xcode"
                || generator.contains("Multi-Config")
        })
    }

    /// Directory the project's build artifacts are written to.
    ///
    /// - Managed: `<project>/bin/<Configuration>/<target framework>`, or
    ///   `<project>/bin/<Configuration>` with a warning when the `.csproj`
    ///   declares no target framework.
    /// - Native (cargo): `<root>/target/<profile>` for members of the root
    ///   cargo workspace, `<project>/target/<profile>` otherwise.
    /// - Native (cmake): `<project>/build/<Configuration>` for multi-config
    ///   generators, `<project>/build` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutputPathUnresolved`] if the `.csproj` cannot be
    /// read, or [`Error::UnknownProjectKind`] for unclassified projects.
    pub fn output_dir(&self, project: &Project) -> Result<PathBuf> {
        match project.kind {
            ProjectKind::Managed => self.managed_output_dir(project),
            ProjectKind::Native(NativeToolchain::Cargo) => {
                let base = if self.is_workspace_member(project) {
                    &self.root
                } else {
                    &project.root_path
                };
                Ok(base
                    .join("target")
                    .join(self.configuration.cargo_profile_dir()))
            }
            ProjectKind::Native(NativeToolchain::CMake) => {
                let build_dir = self.cmake_build_dir(project);
                if self.is_multi_config_generator() {
                    Ok(build_dir.join(self.configuration.msbuild_name()))
                } else {
                    Ok(build_dir)
                }
            }
            ProjectKind::Unknown => Err(Error::UnknownProjectKind {
                name: project.name.clone(),
                path: project.root_path.clone(),
            }),
        }
    }

    fn managed_output_dir(&self, project: &Project) -> Result<PathBuf> {
        let csproj = project.csproj_path();
        let content = fs::read_to_string(&csproj).map_err(|e| Error::OutputPathUnresolved {
            name: project.name.clone(),
            reason: format!("cannot read {}: {e}", csproj.display()),
        })?;

        let bin = project
            .root_path
            .join("bin")
            .join(self.configuration.msbuild_name());

        match target_framework(&content) {
            Some(framework) if !framework.contains("$(") => Ok(bin.join(framework)),
            Some(framework) => {
                warn!(
                    project = %project.name,
                    "TargetFramework `{framework}` in {} depends on an MSBuild property, using {}",
                    csproj.display(),
                    bin.display()
                );
                Ok(bin)
            }
            None => {
                warn!(
                    project = %project.name,
                    "no TargetFramework declared in {}, using {}",
                    csproj.display(),
                    bin.display()
                );
                Ok(bin)
            }
        }
    }
}

/// Match a workspace `members`/`exclude` entry against a crate directory
/// relative to the workspace root. A trailing `*` matches any suffix.
fn member_pattern_matches(pattern: &str, relative: &str) -> bool {
    let pattern = pattern.trim_start_matches("./").trim_end_matches('/');

    match pattern.strip_suffix('*') {
        Some(prefix) => relative.starts_with(prefix) && !relative[prefix.len()..].contains('/'),
        None => pattern == relative,
    }
}

/// Extract the first target framework declared in a `.csproj` document.
///
/// Reads `<TargetFramework>` first, then the first entry of
/// `<TargetFrameworks>`. Commented-out declarations are ignored.
#[must_use]
pub fn target_framework(content: &str) -> Option<String> {
    let content = strip_xml_comments(content);

    if let Some(framework) = element_text(&content, "TargetFramework") {
        return Some(framework);
    }

    element_text(&content, "TargetFrameworks").and_then(|list| {
        list.split(';')
            .map(str::trim)
            .find(|f| !f.is_empty())
            .map(str::to_string)
    })
}

/// Text of the first non-empty `<tag>` element (attributes allowed).
fn element_text(content: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut rest = content;

    while let Some(start) = rest.find(&open) {
        let after_name = &rest[start + open.len()..];

        // `<TargetFramework` is a prefix of `<TargetFrameworks`
        if !after_name.starts_with(['>', ' ', '\t', '\r', '\n']) {
            rest = after_name;
            continue;
        }

        let body_start = after_name.find('>')? + 1;
        let body = &after_name[body_start..];
        let end = body.find(&close)?;
        let value = body[..end].trim();

        if !value.is_empty() {
            return Some(value.to_string());
        }
        rest = &body[end..];
    }

    None
}

fn strip_xml_comments(content: &str) -> String {
    let mut output = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("<!--") {
        output.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => return output,
        }
    }

    output.push_str(rest);
    output
}
