//! Configuration types and options for the orchestrator.
//!
//! This module contains the configuration file format, the layered
//! [`OrchestratorConfig`] every phase receives, and the platform and build
//! configuration enums.

pub mod file;
pub mod options;
pub mod platform;

pub use file::FileConfig;
pub use options::{CopySpec, CopyTarget, OrchestratorConfig, ProjectSpec};
pub use platform::{Configuration, HostPlatform};
