use std::io;
use std::path::PathBuf;

use crate::golden::DiffLine;

/// Errors that can occur during projgen operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed label '{label}': {reason}")]
    MalformedLabel { label: String, reason: String },

    #[error("Unknown option key: {0}")]
    UnknownOptionKey(String),

    #[error("test_suite {0} references itself (directly or transitively)")]
    RecursiveTestSuite(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("No build targets selected after applying path filters")]
    NoTargetsSelected,

    #[error("Target {test} links {host}, which is not a known rule")]
    MissingHostForTest { test: String, host: String },

    #[error("Generated output differs from golden ({} line(s)):\n{}", .0.len(), format_diff_lines(.0))]
    DiffMismatch(Vec<DiffLine>),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Build tool not found at {0}")]
    BuildToolNotFound(PathBuf),

    #[error("Invalid output directory {0}")]
    InvalidOutputDirectory(PathBuf),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn malformed(label: &str, reason: impl Into<String>) -> Self {
        Error::MalformedLabel {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

fn format_diff_lines(lines: &[DiffLine]) -> String {
    lines
        .iter()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias for projgen operations
pub type Result<T> = std::result::Result<T, Error>;
