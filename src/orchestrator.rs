//! End-to-end orchestration: build, copy, test.
//!
//! Phase ordering is strict. Every build must succeed before any artifact
//! is copied, and every copy must succeed before any test runs.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::{
    artifacts::{ArtifactCopier, CopiedArtifact, CopyTask, Destination},
    builder::{BuildReport, Builder},
    config::{CopyTarget, OrchestratorConfig},
    error::{Error, Result},
    output,
    project::{Project, Projects},
    resolver::Resolver,
    runner::{CommandRunner, SystemRunner},
    tester::{TestReport, Tester},
};

/// Which phases a run executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Phases {
    pub build: bool,
    pub copy: bool,
    pub test: bool,
}

impl Default for Phases {
    fn default() -> Self {
        Self {
            build: true,
            copy: true,
            test: true,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub projects: Projects,
    pub builds: Option<BuildReport>,
    pub copies: Vec<CopiedArtifact>,
    pub tests: Option<TestReport>,
}

impl RunSummary {
    /// Final verdict of the run, accounting for test results.
    ///
    /// # Errors
    ///
    /// See [`TestReport::check`].
    pub fn check(&self) -> Result<()> {
        self.tests.as_ref().map_or(Ok(()), TestReport::check)
    }
}

/// Drives a complete run against one workspace.
pub struct Orchestrator<R: CommandRunner = SystemRunner> {
    config: OrchestratorConfig,
    resolver: Resolver,
    runner: R,
    quiet: bool,
}

impl Orchestrator<SystemRunner> {
    /// Orchestrator that runs real toolchain processes.
    #[must_use]
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_runner(config, SystemRunner)
    }
}

impl<R: CommandRunner> Orchestrator<R> {
    #[must_use]
    pub fn with_runner(config: OrchestratorConfig, runner: R) -> Self {
        Self {
            resolver: Resolver::from_config(&config),
            config,
            runner,
            quiet: false,
        }
    }

    /// Suppress all human-readable output (used by `--json`).
    #[must_use]
    pub const fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Resolve the configured project list, or discover one.
    ///
    /// # Errors
    ///
    /// Fails if a declared project cannot be classified or nothing is found.
    pub fn projects(&self) -> Result<Projects> {
        let specs = if self.config.projects.is_empty() {
            self.resolver.discover()
        } else {
            self.config.projects.clone()
        };

        let projects = self.resolver.resolve_all(&specs)?;
        if projects.is_empty() {
            return Err(Error::Config(format!(
                "no projects found in {}",
                self.resolver.root().display()
            )));
        }

        Ok(projects)
    }

    /// Copy tasks for a run, in execution order.
    ///
    /// Configured copies come first (or, without any, every non-test native
    /// library into every managed project), followed by the host payload
    /// when installing to the host application.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProject`] if a copy names an undeclared project.
    pub fn copy_tasks(&self, projects: &Projects) -> Result<Vec<CopyTask>> {
        let lookup = |name: &str| -> Result<Project> {
            projects
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnknownProject(name.to_string()))
        };

        let mut tasks = Vec::new();

        if self.config.copies.is_empty() {
            for native in projects.native().filter(|p| !p.is_test) {
                for managed in projects.managed() {
                    tasks.push(CopyTask::new(
                        native.clone(),
                        Destination::Project(managed.clone()),
                    ));
                }
            }
        } else {
            for spec in &self.config.copies {
                let destination = match &spec.to {
                    CopyTarget::Project(name) => Destination::Project(lookup(name)?),
                    CopyTarget::External(dir) => Destination::External(dir.clone()),
                };
                tasks.push(
                    CopyTask::new(lookup(&spec.from)?, destination)
                        .with_artifact(spec.artifact.clone()),
                );
            }
        }

        if self.config.install_to_host {
            let payload: Vec<Project> = if self.config.host_payload.is_empty() {
                projects.iter().filter(|p| !p.is_test).cloned().collect()
            } else {
                self.config
                    .host_payload
                    .iter()
                    .map(|name| lookup(name))
                    .collect::<Result<_>>()?
            };

            for project in payload {
                tasks.push(CopyTask::new(
                    project,
                    Destination::External(self.config.host_mods_directory.clone()),
                ));
            }
        }

        Ok(tasks)
    }

    fn spinner(&self, message: &'static str) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb
    }

    /// Build phase.
    ///
    /// # Errors
    ///
    /// [`Error::BuildFailed`] if any step failed or was skipped.
    pub fn build(&self, projects: &Projects) -> Result<BuildReport> {
        let progress = self.spinner("Building...");
        let report = Builder::new(&self.runner, &self.resolver, &self.config).build_all(projects);
        progress.finish_and_clear();
        let report = report?;

        if !self.quiet {
            output::print_build_report(&report);
        }

        if report.is_success() {
            Ok(report)
        } else {
            Err(Error::BuildFailed(report))
        }
    }

    /// Copy phase. Stops at the first failing copy.
    ///
    /// # Errors
    ///
    /// Artifact lookup and copy errors.
    pub fn copy(&self, projects: &Projects) -> Result<Vec<CopiedArtifact>> {
        let copier = ArtifactCopier::new(&self.resolver, self.config.platform);
        let copies = self
            .copy_tasks(projects)?
            .iter()
            .map(|task| {
                info!(
                    from = %task.source.name,
                    to = %task.destination_label(),
                    "copying artifact"
                );
                copier.copy(task)
            })
            .collect::<Result<Vec<_>>>()?;

        if !self.quiet {
            output::print_copies(&copies);
        }

        Ok(copies)
    }

    /// Test phase. Every test project runs regardless of other failures.
    ///
    /// # Errors
    ///
    /// Only fails when a test invocation cannot be planned.
    pub fn test(&self, projects: &Projects) -> Result<TestReport> {
        let progress = self.spinner("Running tests...");
        let report = Tester::new(&self.runner, &self.resolver, &self.config).test_all(projects);
        progress.finish_and_clear();
        let report = report?;

        if !self.quiet {
            output::print_test_report(&report);
        }

        Ok(report)
    }

    /// Run the selected phases in order.
    ///
    /// Test failures are recorded in the summary rather than returned; use
    /// [`RunSummary::check`] for the final verdict.
    ///
    /// # Errors
    ///
    /// Any build, resolution or copy failure aborts the run.
    pub fn run(&self, phases: Phases) -> Result<RunSummary> {
        let projects = self.projects()?;

        if !self.quiet {
            println!("{}", format!("Found {} projects", projects.len()).bold());
            projects.print_summary();
        }

        let builds = if phases.build {
            Some(self.build(&projects)?)
        } else {
            None
        };

        let copies = if phases.copy {
            self.copy(&projects)?
        } else {
            Vec::new()
        };

        let tests = if phases.test {
            Some(self.test(&projects)?)
        } else {
            None
        };

        Ok(RunSummary {
            projects,
            builds,
            copies,
            tests,
        })
    }
}
