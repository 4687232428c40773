//! Human-readable and JSON reporting.

use colored::Colorize;
use humansize::{DECIMAL, format_size};
use serde::Serialize;

use crate::{
    artifacts::CopiedArtifact,
    builder::{BuildReport, BuildResult, BuildStatus, BuildSystem},
    error::Error,
    orchestrator::RunSummary,
    project::Project,
    runner::ExecutionError,
    tester::{TestReport, TestStatus},
};

/// Print a failed command with both of its captured streams.
pub fn print_execution_error(error: &ExecutionError) {
    eprintln!("  {} {}", "Command:".bold(), error.command);
    if let Some(code) = error.exit_code {
        eprintln!("  {} {code}", "Exit code:".bold());
    }
    if !error.stdout.trim().is_empty() {
        eprintln!("  {}\n{}", "Standard Output:".bold(), error.stdout.trim_end());
    }
    if !error.stderr.trim().is_empty() {
        eprintln!("  {}\n{}", "Standard Error:".bold(), error.stderr.trim_end().red());
    }
}

fn print_error(error: &Error) {
    match error {
        Error::Execution(e) => print_execution_error(e),
        other => eprintln!("  {}", other.to_string().red()),
    }
}

/// Print one line per build step and the details of every failure.
pub fn print_build_report(report: &BuildReport) {
    println!("\n{}", "🔨 Build Summary:".bold());

    for result in &report.results {
        let system = match result.system {
            BuildSystem::DotnetSolution => "dotnet",
            BuildSystem::CargoWorkspace => "cargo",
            BuildSystem::Standalone => "standalone",
        };
        let elapsed = format!("{:.1}s", result.duration.as_secs_f64());

        match &result.status {
            BuildStatus::Success => println!(
                "  ✅ {} [{system}] {}",
                result.label.green(),
                elapsed.bright_black()
            ),
            BuildStatus::Failed(_) => println!(
                "  ❌ {} [{system}] {}",
                result.label.red(),
                elapsed.bright_black()
            ),
            BuildStatus::Skipped => println!("  ⏭️  {} [{system}] skipped", result.label.yellow()),
        }
    }

    for result in report.failures() {
        if let BuildStatus::Failed(error) = &result.status {
            eprintln!("\n{} {}", "Error building".red().bold(), result.label.bold());
            print_error(error);
        }
    }
}

/// Print every copied artifact with its size.
pub fn print_copies(copies: &[CopiedArtifact]) {
    if copies.is_empty() {
        return;
    }

    println!("\n{}", "📦 Copied artifacts:".bold());
    for copy in copies {
        let marker = if copy.external { "🎮" } else { "➡️ " };
        println!(
            "  {marker} {} → {} ({})",
            copy.source.display(),
            copy.destination.display().to_string().cyan(),
            format_size(copy.size, DECIMAL)
        );
    }
}

/// Print per-project test results and the output of failing suites.
pub fn print_test_report(report: &TestReport) {
    println!("\n{}", "🧪 Test Summary:".bold());

    for result in &report.results {
        match &result.status {
            TestStatus::Passed(_) => println!("  ✅ {}", result.project.green()),
            TestStatus::Failed(_) => println!("  ❌ {}", result.project.red()),
            TestStatus::ExecutableNotFound(path) => println!(
                "  ⚠️  {} test executable not found at {}",
                result.project.yellow(),
                path.display()
            ),
        }
    }

    for result in &report.results {
        if let TestStatus::Failed(error) = &result.status {
            eprintln!("\n{} {}", "Tests failed for".red().bold(), result.project.bold());
            print_execution_error(error);
        }
    }

    let total = report.results.len();
    let passed = report.passed_count();
    let passed_text = format!("{passed}/{total}");
    println!(
        "  {} suites passed",
        if passed == total {
            passed_text.green()
        } else {
            passed_text.red()
        }
    );
}

#[derive(Serialize)]
struct JsonBuild {
    label: String,
    system: BuildSystem,
    status: &'static str,
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
}

impl JsonBuild {
    fn from_result(result: &BuildResult) -> Self {
        let mut build = Self {
            label: result.label.clone(),
            system: result.system,
            status: "success",
            duration_ms: result.duration.as_millis(),
            error: None,
            command: None,
            exit_code: None,
            stdout: None,
            stderr: None,
        };

        match &result.status {
            BuildStatus::Success => {}
            BuildStatus::Skipped => build.status = "skipped",
            BuildStatus::Failed(error) => {
                build.status = "failed";
                build.error = Some(error.to_string());
                if let Error::Execution(e) = error {
                    build.command = Some(e.command.clone());
                    build.exit_code = e.exit_code;
                    build.stdout = Some(e.stdout.clone());
                    build.stderr = Some(e.stderr.clone());
                }
            }
        }

        build
    }
}

fn json_builds<'a>(reports: impl IntoIterator<Item = &'a BuildReport>) -> Vec<JsonBuild> {
    reports
        .into_iter()
        .flat_map(|report| &report.results)
        .map(JsonBuild::from_result)
        .collect()
}

#[derive(Serialize)]
struct JsonTest {
    project: String,
    status: &'static str,
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
}

/// Machine-readable summary of a run, printed with `--json`.
#[derive(Serialize)]
pub struct JsonOutput {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    projects: Vec<Project>,
    builds: Vec<JsonBuild>,
    copies: Vec<CopiedArtifact>,
    tests: Vec<JsonTest>,
}

impl JsonOutput {
    #[must_use]
    pub fn from_summary(summary: &RunSummary) -> Self {
        let builds = json_builds(&summary.builds);

        let tests = summary
            .tests
            .iter()
            .flat_map(|report| &report.results)
            .map(|result| {
                let (status, stdout, stderr) = match &result.status {
                    TestStatus::Passed(output) => {
                        ("passed", Some(output.stdout.clone()), Some(output.stderr.clone()))
                    }
                    TestStatus::Failed(e) => {
                        ("failed", Some(e.stdout.clone()), Some(e.stderr.clone()))
                    }
                    TestStatus::ExecutableNotFound(_) => ("executable-not-found", None, None),
                };
                JsonTest {
                    project: result.project.clone(),
                    status,
                    duration_ms: result.duration.as_millis(),
                    stdout,
                    stderr,
                }
            })
            .collect();

        let verdict = summary.check();

        Self {
            success: verdict.is_ok(),
            error: verdict.err().map(|e| e.to_string()),
            projects: summary.projects.as_slice().to_vec(),
            builds,
            copies: summary.copies.clone(),
            tests,
        }
    }

    /// Document for a run that aborted before producing a summary.
    ///
    /// A failed build keeps every step's status together with the failing
    /// commands and their captured output.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        let builds = match error {
            Error::BuildFailed(report) => json_builds([report]),
            _ => Vec::new(),
        };

        Self {
            success: false,
            error: Some(error.to_string()),
            projects: Vec::new(),
            builds,
            copies: Vec::new(),
            tests: Vec::new(),
        }
    }
}
