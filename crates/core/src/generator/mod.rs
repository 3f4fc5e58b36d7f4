//! Project generation: link closure, path filtering and option resolution

pub mod descriptor;
pub mod path_filter;
pub mod project_generator;

pub use descriptor::{ProjectDescriptor, ResolvedTarget};
pub use path_filter::PathFilter;
pub use project_generator::{GenerationRequest, ProjectGenerator};
