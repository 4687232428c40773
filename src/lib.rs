//! # krysalis-build
//!
//! Build orchestrator for the Krysalis mod workspace.
//!
//! The workspace mixes a managed (.NET) component, a native (Rust/C++)
//! component and their test suites. This library builds them with the right
//! toolchain, runs independent build systems concurrently, propagates the
//! produced shared libraries into the projects (and host application) that
//! load them, and runs the test suites.

pub mod artifacts;
pub mod builder;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod project;
pub mod resolver;
pub mod runner;
pub mod tester;

pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, Phases, RunSummary};
