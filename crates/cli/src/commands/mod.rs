mod common;
pub mod diff;
pub mod extract;
pub mod generate;

pub use common::Session;
pub use diff::diff_command;
pub use extract::extract_command;
pub use generate::generate_command;
