//! Integration tests for krysalis-build
//!
//! These tests lay out temporary workspaces on disk and drive the
//! orchestrator end to end. Toolchain processes are replaced by a scripted
//! runner, except for the stream isolation tests which spawn real processes.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use tempfile::TempDir;

use krysalis_build::{
    Error, Orchestrator, Phases,
    config::{Configuration, CopySpec, CopyTarget, HostPlatform, OrchestratorConfig, ProjectSpec},
    output::JsonOutput,
    project::{NativeToolchain, ProjectKind},
    resolver::Resolver,
    runner::{CommandOutput, CommandRunner, CommandSpec, ExecutionError},
    tester::TestStatus,
};

/// Runner that records every command and fails those containing `fail_on`.
struct ScriptedRunner {
    fail_on: Option<&'static str>,
    log: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn succeeding() -> Self {
        Self {
            fail_on: None,
            log: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(needle: &'static str) -> Self {
        Self {
            fail_on: Some(needle),
            log: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
        let text = command.to_string();
        self.log.lock().unwrap().push(text.clone());

        match self.fail_on {
            Some(needle) if text.contains(needle) => Err(ExecutionError {
                command: text,
                exit_code: Some(1),
                stdout: "1 failed".to_string(),
                stderr: "assertion failed".to_string(),
            }),
            _ => Ok(CommandOutput {
                stdout: "ok".to_string(),
                stderr: String::new(),
            }),
        }
    }
}

/// Helper function to create a file with specified content
fn create_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    fs::write(path, content).expect("Failed to write file");
}

fn csproj(framework: Option<&str>) -> String {
    let framework = framework
        .map(|f| format!("    <TargetFramework>{f}</TargetFramework>\n"))
        .unwrap_or_default();
    format!(
        "<Project Sdk=\"Microsoft.NET.Sdk\">\n  <PropertyGroup>\n{framework}  </PropertyGroup>\n</Project>\n"
    )
}

/// Workspace with a cargo workspace root, one native crate, a managed
/// project and a managed test project.
fn create_mixed_workspace() -> TempDir {
    let tmp = TempDir::new().expect("Failed to create temporary directory");
    let root = tmp.path();

    create_file(
        &root.join("Cargo.toml"),
        "[workspace]\nmembers = [\"NativeLib\"]\nresolver = \"2\"\n",
    );
    create_file(
        &root.join("NativeLib/Cargo.toml"),
        "[package]\nname = \"NativeLib\"\nversion = \"0.1.0\"\n",
    );
    create_file(&root.join("ManagedApp/ManagedApp.csproj"), &csproj(Some("net8.0")));
    create_file(
        &root.join("ManagedAppTests/ManagedAppTests.csproj"),
        &csproj(Some("net8.0")),
    );
    create_file(&root.join("Krysalis.sln"), "");

    tmp
}

fn windows_config(root: &Path) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::new(root);
    config.platform = HostPlatform::Windows;
    config.configuration = Configuration::Release;
    config
}

#[test]
fn test_native_library_lands_next_to_managed_assembly() {
    let tmp = create_mixed_workspace();
    let root = tmp.path();
    let library = b"MZ native library bytes";
    fs::create_dir_all(root.join("target/release")).unwrap();
    fs::write(root.join("target/release/NativeLib.dll"), library).unwrap();

    let mut config = windows_config(root);
    config.projects = vec![ProjectSpec::new("NativeLib"), ProjectSpec::new("ManagedApp")];

    let orchestrator = Orchestrator::with_runner(config, ScriptedRunner::succeeding()).with_quiet(true);
    let summary = orchestrator.run(Phases::default()).unwrap();

    let copied = root.join("ManagedApp/bin/Release/net8.0/NativeLib.dll");
    assert_eq!(fs::read(&copied).unwrap(), library);
    assert_eq!(summary.copies.len(), 1);
    assert_eq!(summary.copies[0].destination, copied);
    assert!(summary.check().is_ok());
}

#[test]
fn test_builds_run_once_per_build_system() {
    let tmp = create_mixed_workspace();
    let root = tmp.path();

    let orchestrator =
        Orchestrator::with_runner(windows_config(root), ScriptedRunner::succeeding()).with_quiet(true);
    let summary = orchestrator
        .run(Phases {
            build: true,
            copy: false,
            test: false,
        })
        .unwrap();

    let commands = orchestrator.runner().commands();
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().any(|c| c.starts_with("dotnet build") && c.contains("Krysalis.sln")));
    assert!(commands.iter().any(|c| c == "cargo build --release --workspace"));
    assert_eq!(summary.builds.unwrap().results.len(), 2);
}

#[test]
fn test_missing_target_framework_falls_back_to_configuration_dir() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    create_file(&root.join("ManagedApp/ManagedApp.csproj"), &csproj(None));

    let resolver = Resolver::new(root, Configuration::Release);
    let project = resolver.resolve(&ProjectSpec::new("ManagedApp")).unwrap();

    assert_eq!(project.kind, ProjectKind::Managed);
    assert_eq!(
        resolver.output_dir(&project).unwrap(),
        root.join("ManagedApp/bin/Release")
    );
}

#[test]
fn test_unclassifiable_project_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    create_file(&root.join("Mystery/README.md"), "nothing to build here");

    let mut config = windows_config(root);
    config.projects = vec![ProjectSpec::new("Mystery")];

    let orchestrator = Orchestrator::with_runner(config, ScriptedRunner::succeeding()).with_quiet(true);
    let err = orchestrator.run(Phases::default()).unwrap_err();

    assert!(matches!(err, Error::UnknownProjectKind { ref name, .. } if name == "Mystery"));
    assert!(orchestrator.runner().commands().is_empty());
}

fn create_cmake_test_workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    create_file(
        &tmp.path().join("NativeLibTests/CMakeLists.txt"),
        "add_executable(NativeLibTests tests.cpp)\n",
    );
    tmp
}

fn linux_test_only(root: &Path) -> (OrchestratorConfig, Phases) {
    let mut config = OrchestratorConfig::new(root);
    config.platform = HostPlatform::Linux;
    config.projects = vec![ProjectSpec::new("NativeLibTests")];

    let phases = Phases {
        build: false,
        copy: false,
        test: true,
    };
    (config, phases)
}

#[test]
fn test_missing_test_binary_is_not_a_test_failure() {
    let tmp = create_cmake_test_workspace();
    let (config, phases) = linux_test_only(tmp.path());

    let orchestrator = Orchestrator::with_runner(config, ScriptedRunner::succeeding()).with_quiet(true);
    let summary = orchestrator.run(phases).unwrap();

    let report = summary.tests.as_ref().unwrap();
    assert!(matches!(
        report.results[0].status,
        TestStatus::ExecutableNotFound(ref path)
            if *path == tmp.path().join("NativeLibTests/build/NativeLibTests")
    ));

    let err = summary.check().unwrap_err();
    assert!(matches!(err, Error::TestExecutableNotFound { ref name, .. } if name == "NativeLibTests"));
    assert_eq!(err.exit_code(), 1);
    assert!(orchestrator.runner().commands().is_empty());
}

#[test]
fn test_failing_test_binary_is_a_test_failure() {
    let tmp = create_cmake_test_workspace();
    create_file(&tmp.path().join("NativeLibTests/build/NativeLibTests"), "");
    let (config, phases) = linux_test_only(tmp.path());

    let orchestrator =
        Orchestrator::with_runner(config, ScriptedRunner::failing_on("NativeLibTests")).with_quiet(true);
    let summary = orchestrator.run(phases).unwrap();

    let report = summary.tests.as_ref().unwrap();
    match &report.results[0].status {
        TestStatus::Failed(error) => {
            assert_eq!(error.exit_code, Some(1));
            assert_eq!(error.stderr, "assertion failed");
        }
        other => panic!("expected a test failure, got {other:?}"),
    }

    let err = summary.check().unwrap_err();
    assert!(matches!(err, Error::TestsFailed(ref names) if names == &["NativeLibTests".to_string()]));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_failed_build_prevents_copy_and_tests() {
    let tmp = create_mixed_workspace();
    let root = tmp.path();
    // Stale library from an earlier build must not be propagated.
    fs::create_dir_all(root.join("target/release")).unwrap();
    fs::write(root.join("target/release/NativeLib.dll"), b"stale").unwrap();

    let orchestrator =
        Orchestrator::with_runner(windows_config(root), ScriptedRunner::failing_on("cargo build"))
            .with_quiet(true);
    let err = orchestrator.run(Phases::default()).unwrap_err();

    let Error::BuildFailed(report) = err else {
        panic!("expected a build failure");
    };
    assert_eq!(report.failures().count(), 1);
    assert!(!root.join("ManagedApp/bin/Release/net8.0/NativeLib.dll").exists());
    assert!(
        orchestrator
            .runner()
            .commands()
            .iter()
            .all(|c| !c.starts_with("dotnet test"))
    );
}

#[test]
fn test_quiet_build_failure_still_exposes_captured_output() {
    let tmp = create_mixed_workspace();
    let root = tmp.path();

    let orchestrator =
        Orchestrator::with_runner(windows_config(root), ScriptedRunner::failing_on("cargo build"))
            .with_quiet(true);
    let err = orchestrator.run(Phases::default()).unwrap_err();

    let json = serde_json::to_value(JsonOutput::from_error(&err)).unwrap();

    assert_eq!(json["success"], false);
    let failed: Vec<_> = json["builds"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|b| b["status"] == "failed")
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["command"], "cargo build --release --workspace");
    assert_eq!(failed[0]["stdout"], "1 failed");
    assert_eq!(failed[0]["stderr"], "assertion failed");
}

#[test]
fn test_standalone_managed_project_builds_after_cargo_workspace() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    create_file(
        &root.join("Cargo.toml"),
        "[workspace]\nmembers = [\"NativeLib\"]\n",
    );
    create_file(&root.join("NativeLib/Cargo.toml"), "[package]\nname = \"NativeLib\"\n");
    create_file(&root.join("ManagedApp/ManagedApp.csproj"), &csproj(Some("net8.0")));

    let mut config = windows_config(root);
    config.projects = vec![ProjectSpec::new("ManagedApp"), ProjectSpec::new("NativeLib")];

    let orchestrator = Orchestrator::with_runner(config, ScriptedRunner::succeeding()).with_quiet(true);
    orchestrator
        .run(Phases {
            build: true,
            copy: false,
            test: false,
        })
        .unwrap();

    let commands = orchestrator.runner().commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0], "cargo build --release --workspace");
    assert!(commands[1].starts_with("dotnet build"));
}

#[test]
fn test_crate_outside_workspace_members_is_built_and_copied() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    create_file(
        &root.join("Cargo.toml"),
        "[workspace]\nmembers = [\"Member\"]\n",
    );
    create_file(&root.join("Member/Cargo.toml"), "[package]\nname = \"Member\"\n");
    create_file(&root.join("Outsider/Cargo.toml"), "[package]\nname = \"Outsider\"\n");
    create_file(&root.join("ManagedApp/ManagedApp.csproj"), &csproj(Some("net8.0")));
    create_file(&root.join("Outsider/target/release/Outsider.dll"), "outsider");
    create_file(&root.join("target/release/Member.dll"), "member");

    let mut config = windows_config(root);
    config.projects = vec![
        ProjectSpec::new("Member"),
        ProjectSpec::new("Outsider"),
        ProjectSpec::new("ManagedApp"),
    ];

    let orchestrator = Orchestrator::with_runner(config, ScriptedRunner::succeeding()).with_quiet(true);
    let summary = orchestrator
        .run(Phases {
            build: true,
            copy: true,
            test: false,
        })
        .unwrap();

    let commands = orchestrator.runner().commands();
    assert!(commands.contains(&"cargo build --release --workspace".to_string()));
    assert!(commands.contains(&"cargo build --release".to_string()));
    assert_eq!(summary.copies.len(), 2);
    assert_eq!(
        fs::read_to_string(root.join("ManagedApp/bin/Release/net8.0/Outsider.dll")).unwrap(),
        "outsider"
    );
}

#[test]
fn test_keep_going_reports_every_failure() {
    let tmp = create_mixed_workspace();
    let root = tmp.path();

    let mut config = windows_config(root);
    config.fail_fast = false;

    let orchestrator =
        Orchestrator::with_runner(config, ScriptedRunner::failing_on("build")).with_quiet(true);
    let err = orchestrator.run(Phases::default()).unwrap_err();

    let Error::BuildFailed(report) = err else {
        panic!("expected a build failure");
    };
    assert_eq!(report.failures().count(), 2);
}

#[test]
fn test_explicit_artifact_and_host_install() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let mods = TempDir::new().unwrap();

    create_file(
        &root.join("TestApplication/TestApplication.csproj"),
        &csproj(Some("net472")),
    );
    create_file(&root.join("TestRunner/TestRunner.csproj"), &csproj(Some("net8.0")));
    create_file(
        &root.join("TestApplication/bin/Release/net472/TestApplication.exe"),
        "exe",
    );
    create_file(
        &root.join("TestApplication/bin/Release/net472/TestApplication.dll"),
        "dll",
    );

    let mut config = windows_config(root);
    config.projects = vec![
        ProjectSpec::new("TestApplication"),
        ProjectSpec::new("TestRunner"),
    ];
    config.copies = vec![CopySpec {
        from: "TestApplication".to_string(),
        to: CopyTarget::Project("TestRunner".to_string()),
        artifact: Some("TestApplication.exe".to_string()),
    }];
    config.install_to_host = true;
    config.host_mods_directory = mods.path().to_path_buf();
    config.host_payload = vec!["TestApplication".to_string()];

    let orchestrator = Orchestrator::with_runner(config, ScriptedRunner::succeeding()).with_quiet(true);
    let summary = orchestrator
        .run(Phases {
            build: false,
            copy: true,
            test: false,
        })
        .unwrap();

    assert_eq!(summary.copies.len(), 2);
    assert_eq!(
        fs::read_to_string(root.join("TestRunner/bin/Release/net8.0/TestApplication.exe")).unwrap(),
        "exe"
    );
    assert_eq!(
        fs::read_to_string(mods.path().join("TestApplication.dll")).unwrap(),
        "dll"
    );
    assert!(summary.copies[1].external);
}

#[test]
fn test_discovery_classifies_every_toolchain() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    create_file(&root.join("Rusty/Cargo.toml"), "[package]\nname = \"Rusty\"\n");
    create_file(&root.join("Cpp/CMakeLists.txt"), "");
    create_file(&root.join("Managed/Managed.csproj"), &csproj(Some("net8.0")));
    create_file(&root.join(".git/config"), "");
    create_file(&root.join("target/Cargo.toml"), "");

    let orchestrator =
        Orchestrator::with_runner(OrchestratorConfig::new(root), ScriptedRunner::succeeding());
    let projects = orchestrator.projects().unwrap();

    let kind_of = |name: &str| projects.get(name).map(|p| p.kind);
    assert_eq!(projects.len(), 3);
    assert_eq!(kind_of("Rusty"), Some(ProjectKind::Native(NativeToolchain::Cargo)));
    assert_eq!(kind_of("Cpp"), Some(ProjectKind::Native(NativeToolchain::CMake)));
    assert_eq!(kind_of("Managed"), Some(ProjectKind::Managed));
}

#[cfg(unix)]
mod stream_isolation {
    use super::*;
    use krysalis_build::runner::SystemRunner;

    fn noisy(tag: &str) -> CommandSpec {
        CommandSpec::new("sh").args([
            "-c".to_string(),
            format!("for i in 1 2 3 4 5 6 7 8; do echo {tag}-out-$i; echo {tag}-err-$i >&2; sleep 0.01; done"),
        ])
    }

    fn assert_only(output: &str, tag: &str, stream: &str) {
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 8);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(*line, format!("{tag}-{stream}-{}", i + 1));
        }
    }

    #[test]
    fn test_concurrent_commands_capture_their_own_streams() {
        let runner = SystemRunner;
        let (managed, native) = rayon::join(
            || runner.run(&noisy("managed")),
            || runner.run(&noisy("native")),
        );

        let managed = managed.unwrap();
        let native = native.unwrap();
        assert_only(&managed.stdout, "managed", "out");
        assert_only(&managed.stderr, "managed", "err");
        assert_only(&native.stdout, "native", "out");
        assert_only(&native.stderr, "native", "err");
    }

    #[test]
    fn test_concurrent_failure_keeps_sibling_output() {
        let runner = SystemRunner;
        let failing = CommandSpec::new("sh").args(["-c", "echo broken >&2; exit 3"]);

        let (ok, failed) = rayon::join(|| runner.run(&noisy("native")), || runner.run(&failing));

        assert_only(&ok.unwrap().stdout, "native", "out");
        let failed = failed.unwrap_err();
        assert_eq!(failed.exit_code, Some(3));
        assert_eq!(failed.stderr.trim(), "broken");
        assert!(failed.stdout.is_empty());
    }
}

#[test]
fn test_config_file_drives_run() {
    let tmp = create_mixed_workspace();
    let root = tmp.path();
    create_file(
        &root.join("krysalis.toml"),
        r#"
configuration = "debug"
platform = "windows"

[[projects]]
name = "NativeLib"

[[projects]]
name = "ManagedApp"
"#,
    );
    fs::create_dir_all(root.join("target/debug")).unwrap();
    fs::write(root.join("target/debug/NativeLib.dll"), b"debug build").unwrap();

    let file = krysalis_build::config::FileConfig::load(&root.join("krysalis.toml")).unwrap();
    let mut config = OrchestratorConfig::new(root);
    file.apply(&mut config).unwrap();

    let orchestrator = Orchestrator::with_runner(config, ScriptedRunner::succeeding()).with_quiet(true);
    let summary = orchestrator.run(Phases::default()).unwrap();

    assert_eq!(summary.projects.len(), 2);
    assert_eq!(
        fs::read(root.join("ManagedApp/bin/Debug/net8.0/NativeLib.dll")).unwrap(),
        b"debug build"
    );
    assert!(
        orchestrator
            .runner()
            .commands()
            .contains(&"cargo build --workspace".to_string())
    );
}
