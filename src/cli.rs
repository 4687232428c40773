use std::path::PathBuf;

use clap::Parser;
use krysalis_build::{
    Phases, Result,
    config::{Configuration, FileConfig, HostPlatform, OrchestratorConfig, file::expand_tilde},
};

#[derive(Parser)]
struct BuildArgs {
    /// Build the Debug configuration instead of Release
    #[arg(long)]
    debug: bool,

    /// Platform whose artifact naming conventions apply
    #[arg(long, value_enum)]
    platform: Option<HostPlatform>,

    /// Let every build group finish and report all failures
    #[arg(long)]
    keep_going: bool,
}

#[derive(Parser)]
struct HostArgs {
    /// Copy the mod payload into the host application's mods directory
    #[arg(long)]
    install: bool,

    /// Host mods directory to install into
    #[arg(long, value_name = "DIR")]
    mods_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct PhaseArgs {
    /// Reuse existing build outputs
    #[arg(long)]
    skip_build: bool,

    /// Don't run the test suites
    #[arg(long)]
    skip_tests: bool,
}

#[derive(Parser)]
struct OutputArgs {
    /// Print a single JSON summary to stdout instead of human-readable output
    #[arg(long)]
    json: bool,

    /// Log what the orchestrator does
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Parser)]
#[command(name = "krysalis-build")]
#[command(about = "Build, link and test the Krysalis managed and native projects")]
pub(crate) struct Cli {
    /// Workspace root containing the solution and all projects
    #[arg(long = "root", default_value = ".")]
    root: PathBuf,

    /// Configuration file (defaults to krysalis.toml in the workspace root)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Build options
    #[command(flatten)]
    build: BuildArgs,

    /// Host install options
    #[command(flatten)]
    host: HostArgs,

    /// Phase selection
    #[command(flatten)]
    phases: PhaseArgs,

    /// Output options
    #[command(flatten)]
    output: OutputArgs,
}

impl Cli {
    pub(crate) const fn json(&self) -> bool {
        self.output.json
    }

    pub(crate) const fn verbose(&self) -> bool {
        self.output.verbose
    }

    pub(crate) const fn phases(&self) -> Phases {
        Phases {
            build: !self.phases.skip_build,
            copy: true,
            test: !self.phases.skip_tests,
        }
    }

    pub(crate) fn config_path(&self) -> PathBuf {
        self.config.as_ref().map_or_else(
            || FileConfig::config_path(&self.root),
            |path| expand_tilde(path),
        )
    }

    /// Layer CLI flags over the file configuration and the defaults.
    pub(crate) fn orchestrator_config(&self, file_config: FileConfig) -> Result<OrchestratorConfig> {
        let mut config = OrchestratorConfig::new(expand_tilde(&self.root));
        file_config.apply(&mut config)?;

        if self.build.debug {
            config.configuration = Configuration::Debug;
        }
        if let Some(platform) = self.build.platform {
            config.platform = platform;
        }
        if self.build.keep_going {
            config.fail_fast = false;
        }
        if self.host.install {
            config.install_to_host = true;
        }
        if let Some(dir) = &self.host.mods_dir {
            config.host_mods_directory = expand_tilde(dir);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("krysalis-build").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        let config = cli.orchestrator_config(FileConfig::default()).unwrap();

        assert_eq!(config.workspace_root, PathBuf::from("."));
        assert_eq!(config.configuration, Configuration::Release);
        assert!(config.fail_fast);
        assert!(!config.install_to_host);
        assert_eq!(cli.phases(), Phases::default());
        assert_eq!(cli.config_path(), PathBuf::from("./krysalis.toml"));
    }

    #[test]
    fn test_flags_override_file() {
        let file: FileConfig = toml::from_str(
            r#"
configuration = "release"
fail_fast = true

[host]
install = false
mods_directory = "/from/file"
"#,
        )
        .unwrap();

        let cli = parse(&[
            "--root",
            "/work",
            "--debug",
            "--keep-going",
            "--install",
            "--mods-dir",
            "/from/cli",
            "--platform",
            "windows",
            "--skip-tests",
        ]);
        let config = cli.orchestrator_config(file).unwrap();

        assert_eq!(config.workspace_root, PathBuf::from("/work"));
        assert_eq!(config.configuration, Configuration::Debug);
        assert_eq!(config.platform, HostPlatform::Windows);
        assert!(!config.fail_fast);
        assert!(config.install_to_host);
        assert_eq!(config.host_mods_directory, PathBuf::from("/from/cli"));
        assert!(!cli.phases().test);
        assert!(cli.phases().build);
    }

    #[test]
    fn test_file_values_survive_without_flags() {
        let file: FileConfig = toml::from_str(
            r#"
configuration = "debug"

[host]
install = true
"#,
        )
        .unwrap();

        let config = parse(&[]).orchestrator_config(file).unwrap();

        assert_eq!(config.configuration, Configuration::Debug);
        assert!(config.install_to_host);
    }
}
