pub mod cli;
pub mod commands;
pub mod exit_code;

// Re-export commonly used items
pub use cli::{Cli, Commands, ProjectArgs};
pub use exit_code::exit_code_for;
