//! Test orchestration.
//!
//! Each test project is dispatched to the command matching its kind and run
//! as an independent task. A failing suite never stops the others; a test
//! binary that does not exist is recorded separately from a failing one.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::{
    config::OrchestratorConfig,
    error::{Error, Result},
    project::{NativeToolchain, Project, ProjectKind, Projects},
    resolver::Resolver,
    runner::{CommandOutput, CommandRunner, CommandSpec, ExecutionError},
};

/// How a test project is run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestInvocation {
    Run(CommandSpec),
    /// The test binary is not on disk
    Missing(PathBuf),
}

#[derive(Debug)]
pub enum TestStatus {
    Passed(CommandOutput),
    Failed(ExecutionError),
    ExecutableNotFound(PathBuf),
}

/// Outcome of one project's tests.
#[derive(Debug)]
pub struct TestResult {
    pub project: String,
    pub status: TestStatus,
    pub duration: Duration,
}

impl TestResult {
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.status, TestStatus::Passed(_))
    }
}

/// Outcome of the test phase, in declaration order.
#[derive(Debug, Default)]
pub struct TestReport {
    pub results: Vec<TestResult>,
}

impl TestReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.results.iter().all(TestResult::passed)
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Names of projects whose tests ran and failed.
    #[must_use]
    pub fn failed(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, TestStatus::Failed(_)))
            .map(|r| r.project.clone())
            .collect()
    }

    /// Convert the report into the run's final verdict.
    ///
    /// A missing test binary takes precedence over failing tests since it
    /// means an earlier phase did not do its job.
    ///
    /// # Errors
    ///
    /// [`Error::TestExecutableNotFound`] for the first missing binary,
    /// otherwise [`Error::TestsFailed`] listing every failed project.
    pub fn check(&self) -> Result<()> {
        if let Some((project, path)) = self.results.iter().find_map(|r| match &r.status {
            TestStatus::ExecutableNotFound(path) => Some((&r.project, path)),
            _ => None,
        }) {
            return Err(Error::TestExecutableNotFound {
                name: project.clone(),
                path: path.clone(),
            });
        }

        let failed = self.failed();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::TestsFailed(failed))
        }
    }
}

/// Plans and runs the test phase.
pub struct Tester<'a, R: CommandRunner> {
    runner: &'a R,
    resolver: &'a Resolver,
    config: &'a OrchestratorConfig,
}

impl<'a, R: CommandRunner> Tester<'a, R> {
    #[must_use]
    pub const fn new(runner: &'a R, resolver: &'a Resolver, config: &'a OrchestratorConfig) -> Self {
        Self {
            runner,
            resolver,
            config,
        }
    }

    /// Decide how to run `project`'s tests.
    ///
    /// - an explicit `test_executable`, or any CMake project: run the binary
    ///   from the project's output directory
    /// - managed: `dotnet test` on the `.csproj`, without rebuilding
    /// - cargo: `cargo test -p <name>`
    ///
    /// # Errors
    ///
    /// Propagates output-path resolution errors.
    pub fn invocation(&self, project: &Project) -> Result<TestInvocation> {
        let configuration = self.config.configuration;

        if let Some(executable) = &project.test_executable {
            return self.executable(project, executable);
        }

        match project.kind {
            ProjectKind::Managed => Ok(TestInvocation::Run(
                CommandSpec::new("dotnet")
                    .arg("test")
                    .path_arg(&project.csproj_path())
                    .args(["--configuration", configuration.msbuild_name(), "--no-build"])
                    .current_dir(self.resolver.root()),
            )),
            ProjectKind::Native(NativeToolchain::Cargo) => {
                let mut command = CommandSpec::new("cargo")
                    .args(["test", "-p", project.name.as_str()]);
                if configuration.is_release() {
                    command = command.arg("--release");
                }

                let cwd = if self.resolver.is_workspace_member(project) {
                    self.resolver.root()
                } else {
                    project.root_path.as_path()
                };
                Ok(TestInvocation::Run(command.current_dir(cwd)))
            }
            ProjectKind::Native(NativeToolchain::CMake) => {
                let name = format!("{}{}", project.name, self.config.platform.exe_suffix());
                self.executable(project, &name)
            }
            ProjectKind::Unknown => Err(Error::UnknownProjectKind {
                name: project.name.clone(),
                path: project.root_path.clone(),
            }),
        }
    }

    fn executable(&self, project: &Project, file_name: &str) -> Result<TestInvocation> {
        let output_dir = self.resolver.output_dir(project)?;
        let path = output_dir.join(file_name);

        if !path.is_file() {
            return Ok(TestInvocation::Missing(path));
        }

        // Run from the output directory so copied libraries next to the
        // binary are found at load time.
        Ok(TestInvocation::Run(
            CommandSpec::new(path.to_string_lossy()).current_dir(output_dir),
        ))
    }

    /// Run the tests of every test project.
    ///
    /// All invocations are planned first; then every project runs as its
    /// own task, even if others fail.
    ///
    /// # Errors
    ///
    /// Fails only if an invocation cannot be planned. Test failures and
    /// missing binaries are reported in the returned [`TestReport`].
    pub fn test_all(&self, projects: &Projects) -> Result<TestReport> {
        let plans = projects
            .tests()
            .map(|project| {
                self.invocation(project)
                    .map(|invocation| (project.name.clone(), invocation))
            })
            .collect::<Result<Vec<_>>>()?;

        let results = plans
            .into_par_iter()
            .map(|(project, invocation)| self.run_one(project, invocation))
            .collect();

        Ok(TestReport { results })
    }

    fn run_one(&self, project: String, invocation: TestInvocation) -> TestResult {
        let start = Instant::now();

        let status = match invocation {
            TestInvocation::Missing(path) => {
                warn!(project = %project, path = %path.display(), "test executable not found");
                TestStatus::ExecutableNotFound(path)
            }
            TestInvocation::Run(command) => match self.runner.run(&command) {
                Ok(output) => {
                    info!(project = %project, "tests passed");
                    TestStatus::Passed(output)
                }
                Err(e) => {
                    warn!(project = %project, "tests failed: {e}");
                    TestStatus::Failed(e)
                }
            },
        };

        TestResult {
            project,
            status,
            duration: start.elapsed(),
        }
    }
}
