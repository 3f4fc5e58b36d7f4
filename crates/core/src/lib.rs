//! projgen-core - turn Bazel BUILD metadata into IDE project descriptors
//!
//! This crate provides functionality to:
//! - Parse and order Bazel labels and the rules behind them
//! - Query Bazel for the rules in a set of packages and expand test suites
//! - Resolve host/extension links, path filters and per-target options into
//!   a [`ProjectDescriptor`]
//! - Compare serialized descriptors against golden files
pub mod bazel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod generator;
pub mod golden;
pub mod types;

// Re-export commonly used types and traits
pub use error::{Error, Result};
pub use types::*;

pub use bazel::{BazelQuery, BuildTool, ExtractionCoordinator, InFlightCounter, ProjectInfoExtractor, StaticBuildTool};
pub use config::{GeneratorConfig, OptionKey, OptionSet};
pub use diagnostics::{CollectingSink, DiagnosticSink, TracingSink};
pub use generator::{GenerationRequest, PathFilter, ProjectDescriptor, ProjectGenerator, ResolvedTarget};
pub use golden::{DiffKind, DiffLine};
