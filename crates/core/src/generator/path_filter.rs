use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Package selector: `foo` matches one package, `foo/...` the subtree
///
/// Matching works on whole path segments, so `foo/...` covers `foo/bar`
/// but not `foobar`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathFilter {
    base: String,
    recursive: bool,
}

impl PathFilter {
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim().trim_start_matches("//");
        if trimmed.contains(':') || trimmed.contains("//") {
            return Err(Error::ConfigError(format!("invalid path filter '{pattern}'")));
        }

        let (base, recursive) = if trimmed == "..." {
            ("", true)
        } else if let Some(base) = trimmed.strip_suffix("/...") {
            (base, true)
        } else {
            (trimmed, false)
        };

        if base.split('/').any(|segment| segment == "...") {
            return Err(Error::ConfigError(format!(
                "'...' may only end a path filter: '{pattern}'"
            )));
        }

        Ok(Self {
            base: base.trim_matches('/').to_string(),
            recursive,
        })
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn matches_package(&self, package: &str) -> bool {
        let package = package.trim_start_matches("//").trim_matches('/');
        if !self.recursive {
            return package == self.base;
        }
        self.base.is_empty()
            || package == self.base
            || package
                .strip_prefix(self.base.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// A file matches when the directory containing it does
    pub fn matches_file(&self, path: &str) -> bool {
        let path = path.trim_start_matches("./");
        let directory = path.rsplit_once('/').map_or("", |(dir, _)| dir);
        self.matches_package(directory)
    }
}

impl fmt::Display for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.base.is_empty(), self.recursive) {
            (true, true) => f.write_str("..."),
            (false, true) => write!(f, "{}/...", self.base),
            (_, false) => f.write_str(&self.base),
        }
    }
}

impl TryFrom<String> for PathFilter {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PathFilter> for String {
    fn from(filter: PathFilter) -> Self {
        filter.to_string()
    }
}
