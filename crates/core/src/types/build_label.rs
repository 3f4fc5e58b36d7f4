use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Canonical Bazel target label of the form `//package[:target]`
///
/// The canonical string is kept exactly as parsed, so
/// `BuildLabel::parse(s)?.as_str() == s` for every accepted `s`.
/// Ordering and equality are those of the canonical string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildLabel(String);

impl BuildLabel {
    pub const PREFIX: &'static str = "//";

    /// Parse a label, rejecting anything that is not `//package[:target]`
    pub fn parse(value: &str) -> Result<Self> {
        let Some(body) = value.strip_prefix(Self::PREFIX) else {
            return Err(Error::malformed(value, "labels must start with '//'"));
        };

        if body.is_empty() {
            return Err(Error::malformed(value, "label has no package or target"));
        }

        if let Some(bad) = body.chars().find(|c| !is_label_char(*c)) {
            return Err(Error::malformed(value, format!("invalid character {bad:?}")));
        }

        let (package, target) = match body.rfind(':') {
            Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
            None => (body, None),
        };

        if package.contains(':') {
            return Err(Error::malformed(value, "more than one ':' separator"));
        }

        if !package.is_empty()
            && package.split('/').any(|segment| segment.is_empty())
        {
            return Err(Error::malformed(value, "empty package path segment"));
        }

        match target {
            Some("") => return Err(Error::malformed(value, "empty target name")),
            Some(name) if name.starts_with('/') || name.ends_with('/') => {
                return Err(Error::malformed(value, "target name cannot start or end with '/'"));
            }
            _ => {}
        }

        Ok(Self(value.to_string()))
    }

    /// Resolve a label as it appears inside a BUILD file of `package`
    ///
    /// Absolute labels are parsed as is; `:name` and bare `name` are taken
    /// relative to `package`.
    pub fn resolve(value: &str, package: &str) -> Result<Self> {
        if value.starts_with(Self::PREFIX) {
            return Self::parse(value);
        }
        let name = value.strip_prefix(':').unwrap_or(value);
        Self::parse(&format!("//{package}:{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Package path without the leading `//`
    pub fn package_component(&self) -> &str {
        let body = &self.0[Self::PREFIX.len()..];
        match body.rfind(':') {
            Some(idx) => &body[..idx],
            None => body,
        }
    }

    /// Target name; for `//foo/bar` this is the implicit target `bar`
    pub fn target_component(&self) -> &str {
        let body = &self.0[Self::PREFIX.len()..];
        match body.rfind(':') {
            Some(idx) => &body[idx + 1..],
            None => body.rsplit('/').next().unwrap_or(body),
        }
    }
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '/' | ':' | '.' | '_' | '-' | '+' | '=' | ',' | '@' | '~' | '#' | '%' | '^' | '!' | '$' | '&' | '(' | ')' | '[' | ']' | '{' | '}'
        )
}

impl fmt::Display for BuildLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BuildLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BuildLabel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BuildLabel> for String {
    fn from(label: BuildLabel) -> Self {
        label.0
    }
}

impl AsRef<str> for BuildLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
