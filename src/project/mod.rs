//! Project representation.
//!
//! ## Main Parts
//!
//! - [`Project`] - A resolved sub-project of the workspace
//! - [`Projects`] - The ordered project list of a run
//! - [`ProjectKind`] - Closed classification: managed, native or unknown

#[allow(clippy::module_inception)]
pub mod project;
pub mod projects;

pub use project::{NativeToolchain, Project, ProjectKind};
pub use projects::Projects;
