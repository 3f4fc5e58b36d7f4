//! Build tool invocation
//!
//! The extractor only needs BUILD-syntax text for a query expression, so the
//! process boundary sits behind [`BuildTool`]. [`BazelQuery`] shells out to a
//! real `bazel`; [`StaticBuildTool`] serves canned output.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::types::BuildLabel;

/// Something that can answer a `bazel query` in `--output=build` form
pub trait BuildTool: Send + Sync {
    fn query(&self, expression: &str) -> Result<String>;
}

/// Runs `bazel query` in a workspace
#[derive(Debug, Clone)]
pub struct BazelQuery {
    bazel_path: PathBuf,
    workspace_root: PathBuf,
    startup_options: Vec<String>,
}

impl BazelQuery {
    pub fn new(bazel_path: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            bazel_path: bazel_path.into(),
            workspace_root: workspace_root.into(),
            startup_options: Vec::new(),
        }
    }

    pub fn with_startup_options(mut self, options: Vec<String>) -> Self {
        self.startup_options = options;
        self
    }

    pub fn bazel_path(&self) -> &Path {
        &self.bazel_path
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    fn command(&self, expression: &str) -> Command {
        let mut command = Command::new(&self.bazel_path);
        command
            .args(&self.startup_options)
            .arg("query")
            .arg(expression)
            .arg("--output=build")
            .arg("--noshow_progress")
            .current_dir(&self.workspace_root);
        command
    }
}

impl BuildTool for BazelQuery {
    fn query(&self, expression: &str) -> Result<String> {
        tracing::debug!("bazel query {}", expression);

        let output = self.command(expression).output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::BuildToolNotFound(self.bazel_path.clone()),
            _ => Error::IoError(e),
        })?;

        if !output.status.success() {
            let reason = match output.status.code() {
                Some(code) => format!("bazel query exited with status code {code}"),
                None => "bazel query terminated by signal".to_string(),
            };
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExtractionFailed(format!("{reason}: {}", stderr.trim())));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| Error::ExtractionFailed(format!("bazel query output is not UTF-8: {e}")))
    }
}

/// Build tool answering from a fixed table of expression -> output
#[derive(Debug, Default)]
pub struct StaticBuildTool {
    responses: HashMap<String, String>,
    queries: Mutex<Vec<String>>,
}

impl StaticBuildTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, expression: impl Into<String>, output: impl Into<String>) -> Self {
        self.responses.insert(expression.into(), output.into());
        self
    }

    /// Expressions queried so far, in order
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }
}

impl BuildTool for StaticBuildTool {
    fn query(&self, expression: &str) -> Result<String> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(expression.to_string());
        }
        self.responses
            .get(expression)
            .cloned()
            .ok_or_else(|| Error::ExtractionFailed(format!("no output recorded for query '{expression}'")))
    }
}

/// Query for every rule in the given packages
///
/// `pkg` selects one package, `pkg/...` the package and everything below it.
pub fn package_query(packages: &[String]) -> Result<String> {
    if packages.is_empty() {
        return Err(Error::ConfigError("no Bazel packages to query".to_string()));
    }

    let terms: Vec<String> = packages
        .iter()
        .map(|package| {
            let package = package.trim_start_matches("//").trim_end_matches('/');
            if package == "..." || package.ends_with("/...") {
                format!("kind(rule, //{package})")
            } else {
                format!("kind(rule, //{package}:all)")
            }
        })
        .collect();

    Ok(terms.join(" + "))
}

/// Query for an explicit set of labels
pub fn labels_query<'a>(labels: impl IntoIterator<Item = &'a BuildLabel>) -> String {
    let labels: Vec<&str> = labels.into_iter().map(BuildLabel::as_str).collect();
    format!("set({})", labels.join(" "))
}
