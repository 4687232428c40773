//! Build orchestration.
//!
//! Projects are partitioned by build system. The solution build and the
//! cargo workspace build each run as one task on a dedicated pool, since
//! both toolchains already parallelize across the projects they own.
//! Everything else is built by its own commands, one after the other in
//! declaration order. Standalone managed projects load the native libraries,
//! so they only start once every native build has finished.

use std::{
    fs,
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::{
    config::OrchestratorConfig,
    error::{Error, Result},
    project::{NativeToolchain, Project, ProjectKind, Projects},
    resolver::Resolver,
    runner::{CommandRunner, CommandSpec},
};

/// Build system that owns a group of build steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildSystem {
    /// One `dotnet build` of the solution in the workspace root
    DotnetSolution,

    /// One `cargo build` of the workspace in the workspace root
    CargoWorkspace,

    /// Per-project builds run sequentially
    Standalone,
}

/// A unit of build work: optional directory reset, then commands in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildStep {
    pub label: String,

    /// Directory wiped and recreated before the commands run
    pub fresh_dir: Option<PathBuf>,

    pub commands: Vec<CommandSpec>,
}

/// Steps owned by one build system, run sequentially by one task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildGroup {
    pub system: BuildSystem,
    pub steps: Vec<BuildStep>,

    /// Start only after every group without this flag has finished
    pub after_native: bool,
}

#[derive(Debug)]
pub enum BuildStatus {
    Success,
    Failed(Error),
    /// Not started because another step failed first
    Skipped,
}

/// Outcome of one build step.
#[derive(Debug)]
pub struct BuildResult {
    pub label: String,
    pub system: BuildSystem,
    pub status: BuildStatus,
    pub duration: Duration,
}

impl BuildResult {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.status, BuildStatus::Failed(_))
    }
}

/// Outcome of a whole build phase, in group order.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub results: Vec<BuildResult>,
}

impl BuildReport {
    /// True when no step failed or was skipped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.status, BuildStatus::Success))
    }

    pub fn failures(&self) -> impl Iterator<Item = &BuildResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, BuildStatus::Skipped))
            .count()
    }
}

/// Plans and runs the build phase.
pub struct Builder<'a, R: CommandRunner> {
    runner: &'a R,
    resolver: &'a Resolver,
    config: &'a OrchestratorConfig,
}

impl<'a, R: CommandRunner> Builder<'a, R> {
    #[must_use]
    pub const fn new(runner: &'a R, resolver: &'a Resolver, config: &'a OrchestratorConfig) -> Self {
        Self {
            runner,
            resolver,
            config,
        }
    }

    /// Partition `projects` into build groups.
    ///
    /// Group order is solution, cargo workspace, standalone native,
    /// standalone managed; empty groups are omitted. Only crates that belong
    /// to the root cargo workspace are covered by the workspace build.
    #[must_use]
    pub fn plan(&self, projects: &Projects) -> Vec<BuildGroup> {
        let root = self.resolver.root();
        let configuration = self.config.configuration;
        let solution = self.resolver.solution_file();

        let mut groups = Vec::new();
        let mut native = Vec::new();
        let mut managed = Vec::new();

        if let Some(solution) = &solution
            && projects.managed().next().is_some()
        {
            let label = solution
                .file_name()
                .map_or_else(|| "solution".to_string(), |n| n.to_string_lossy().into_owned());

            groups.push(BuildGroup {
                system: BuildSystem::DotnetSolution,
                steps: vec![BuildStep {
                    label,
                    fresh_dir: None,
                    commands: vec![
                        CommandSpec::new("dotnet")
                            .arg("build")
                            .path_arg(solution)
                            .args(["--configuration", configuration.msbuild_name()])
                            .current_dir(root),
                    ],
                }],
                after_native: false,
            });
        }

        let mut has_members = false;

        for project in projects {
            match project.kind {
                ProjectKind::Managed if solution.is_some() => {}
                ProjectKind::Managed => managed.push(BuildStep {
                    label: project.name.clone(),
                    fresh_dir: None,
                    commands: vec![
                        CommandSpec::new("dotnet")
                            .arg("build")
                            .path_arg(&project.csproj_path())
                            .args(["--configuration", configuration.msbuild_name()])
                            .current_dir(&project.root_path),
                    ],
                }),
                ProjectKind::Native(NativeToolchain::Cargo)
                    if self.resolver.is_workspace_member(project) =>
                {
                    has_members = true;
                }
                ProjectKind::Native(NativeToolchain::Cargo) => native.push(BuildStep {
                    label: project.name.clone(),
                    fresh_dir: None,
                    commands: vec![self.cargo_build().current_dir(&project.root_path)],
                }),
                ProjectKind::Native(NativeToolchain::CMake) => native.push(self.cmake_step(project)),
                ProjectKind::Unknown => {}
            }
        }

        if has_members {
            groups.push(BuildGroup {
                system: BuildSystem::CargoWorkspace,
                steps: vec![BuildStep {
                    label: "cargo workspace".to_string(),
                    fresh_dir: None,
                    commands: vec![self.cargo_build().arg("--workspace").current_dir(root)],
                }],
                after_native: false,
            });
        }

        for (steps, after_native) in [(native, false), (managed, true)] {
            if !steps.is_empty() {
                groups.push(BuildGroup {
                    system: BuildSystem::Standalone,
                    steps,
                    after_native,
                });
            }
        }

        groups
    }

    fn cargo_build(&self) -> CommandSpec {
        let command = CommandSpec::new("cargo").arg("build");
        if self.config.configuration.is_release() {
            command.arg("--release")
        } else {
            command
        }
    }

    fn cmake_step(&self, project: &Project) -> BuildStep {
        let build_dir = self.resolver.cmake_build_dir(project);
        let configuration = self.config.configuration.msbuild_name();
        let (generator, architecture) = self.config.cmake_generator();

        let mut configure = CommandSpec::new("cmake");
        if let Some(generator) = generator {
            configure = configure.args(["-G".to_string(), generator]);
        }
        if let Some(architecture) = architecture {
            configure = configure.args(["-A".to_string(), architecture]);
        }
        let configure = configure
            .arg("-S")
            .path_arg(&project.root_path)
            .arg("-B")
            .path_arg(&build_dir)
            .arg(format!("-DCMAKE_BUILD_TYPE={configuration}"))
            .current_dir(&project.root_path);

        let build = CommandSpec::new("cmake")
            .arg("--build")
            .path_arg(&build_dir)
            .args(["--config", configuration])
            .current_dir(&project.root_path);

        BuildStep {
            label: project.name.clone(),
            fresh_dir: self.config.fresh_cmake_builds.then_some(build_dir),
            commands: vec![configure, build],
        }
    }

    /// Build every project.
    ///
    /// Each group runs on its own worker; groups flagged `after_native` wait
    /// for the others to finish first. A failing step never kills a
    /// sibling that is already running. With `fail_fast`, steps that have
    /// not started yet are skipped once any step fails; otherwise every
    /// step runs.
    ///
    /// # Errors
    ///
    /// Only fails if the worker pool cannot be created. Build failures are
    /// reported in the returned [`BuildReport`].
    pub fn build_all(&self, projects: &Projects) -> Result<BuildReport> {
        let groups = self.plan(projects);
        if groups.is_empty() {
            return Ok(BuildReport::default());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(groups.len())
            .thread_name(|i| format!("krysalis-build-{i}"))
            .build()?;
        let abort = AtomicBool::new(false);

        let (first, second): (Vec<&BuildGroup>, Vec<&BuildGroup>) =
            groups.iter().partition(|group| !group.after_native);

        let results: Vec<Vec<BuildResult>> = pool.install(|| {
            let mut results: Vec<Vec<BuildResult>> = first
                .par_iter()
                .map(|group| self.run_group(group, &abort))
                .collect();

            if !second.is_empty() {
                debug!("native builds finished, building standalone managed projects");
                results.extend(
                    second
                        .par_iter()
                        .map(|group| self.run_group(group, &abort))
                        .collect::<Vec<_>>(),
                );
            }

            results
        });

        Ok(BuildReport {
            results: results.into_iter().flatten().collect(),
        })
    }

    fn run_group(&self, group: &BuildGroup, abort: &AtomicBool) -> Vec<BuildResult> {
        let mut results = Vec::with_capacity(group.steps.len());

        for step in &group.steps {
            if self.config.fail_fast && abort.load(Ordering::SeqCst) {
                debug!(step = %step.label, "skipped after earlier failure");
                results.push(BuildResult {
                    label: step.label.clone(),
                    system: group.system,
                    status: BuildStatus::Skipped,
                    duration: Duration::ZERO,
                });
                continue;
            }

            let start = Instant::now();
            let status = match self.run_step(step) {
                Ok(()) => {
                    info!(step = %step.label, "build succeeded");
                    BuildStatus::Success
                }
                Err(e) => {
                    error!(step = %step.label, "build failed: {e}");
                    abort.store(true, Ordering::SeqCst);
                    BuildStatus::Failed(e)
                }
            };

            results.push(BuildResult {
                label: step.label.clone(),
                system: group.system,
                status,
                duration: start.elapsed(),
            });
        }

        results
    }

    fn run_step(&self, step: &BuildStep) -> Result<()> {
        if let Some(dir) = &step.fresh_dir {
            if dir.exists() {
                debug!(dir = %dir.display(), "cleaning build directory");
                fs::remove_dir_all(dir)?;
            }
            fs::create_dir_all(dir)?;
        }

        for command in &step.commands {
            self.runner.run(command)?;
        }

        Ok(())
    }
}
