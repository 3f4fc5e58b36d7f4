//! Configuration management for projgen

pub mod options;
mod settings;

// Re-export main types
pub use options::{OptionKey, OptionSet, OptionValue};
pub use settings::{CONFIG_FILE_NAMES, GeneratorConfig};
