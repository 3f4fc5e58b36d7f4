//! Process exit codes, one per error kind

use projgen_core::Error;

/// Exit code for errors that did not come from projgen-core
pub const UNEXPECTED: u8 = 127;

pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    error.downcast_ref::<Error>().map_or(UNEXPECTED, code_for)
}

pub fn code_for(error: &Error) -> u8 {
    match error {
        Error::ConfigError(_) => 11,
        Error::MalformedLabel { .. } => 12,
        Error::UnknownOptionKey(_) => 13,
        Error::ExtractionFailed(_) => 14,
        Error::RecursiveTestSuite(_) => 15,
        Error::NoTargetsSelected => 16,
        Error::MissingHostForTest { .. } => 17,
        Error::DiffMismatch(_) => 18,
        Error::IoError(_) => 19,
        Error::SerializationError(_) => 20,
        Error::ParseError(_) => 21,
        Error::BuildToolNotFound(_) => 22,
        Error::InvalidOutputDirectory(_) => 23,
        Error::Other(_) => 126,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn all_errors() -> Vec<Error> {
        vec![
            Error::ConfigError(String::new()),
            Error::MalformedLabel {
                label: String::new(),
                reason: String::new(),
            },
            Error::UnknownOptionKey(String::new()),
            Error::ExtractionFailed(String::new()),
            Error::RecursiveTestSuite(String::new()),
            Error::NoTargetsSelected,
            Error::MissingHostForTest {
                test: String::new(),
                host: String::new(),
            },
            Error::DiffMismatch(Vec::new()),
            Error::IoError(std::io::Error::other("io")),
            Error::SerializationError(serde_json::from_str::<u8>("x").unwrap_err()),
            Error::ParseError(String::new()),
            Error::BuildToolNotFound(PathBuf::new()),
            Error::InvalidOutputDirectory(PathBuf::new()),
            Error::Other(String::new()),
        ]
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes: Vec<u8> = all_errors().iter().map(code_for).collect();
        let unique: HashSet<u8> = codes.iter().copied().collect();
        assert_eq!(unique.len(), codes.len());
        assert!(!unique.contains(&UNEXPECTED));
        assert!(codes.iter().all(|code| (11..=24).contains(code) || *code == 126));
    }

    #[test]
    fn test_context_does_not_hide_the_kind() {
        let err = Err::<(), _>(Error::NoTargetsSelected)
            .context("generating project")
            .unwrap_err();
        assert_eq!(exit_code_for(&err), 16);

        assert_eq!(exit_code_for(&anyhow::anyhow!("something else")), UNEXPECTED);
    }
}
