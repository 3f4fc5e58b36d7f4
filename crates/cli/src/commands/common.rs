use anyhow::{Context, Result};
use projgen_core::{
    BazelQuery, Error, ExtractionCoordinator, GeneratorConfig, InFlightCounter, ProjectInfoExtractor, RuleInfo,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

use crate::cli::ProjectArgs;

const DEFAULT_BAZEL: &str = "bazel";

/// Config plus command line overrides, resolved against a workspace
#[derive(Debug)]
pub struct Session {
    pub config: GeneratorConfig,
    pub workspace_root: PathBuf,
    pub bazel_path: PathBuf,
    pub in_flight: InFlightCounter,
}

impl Session {
    pub fn open(args: &ProjectArgs) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match &args.config {
            Some(path) => Some(path.clone()),
            None => GeneratorConfig::find_config_file(args.workspace_root.as_deref().unwrap_or(cwd.as_path())),
        };

        let mut config = match &config_path {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                GeneratorConfig::load_from_file(path)?
            }
            None => GeneratorConfig::default(),
        };

        if !args.targets.is_empty() {
            config.build_targets = args.targets.clone();
        }
        if !args.filters.is_empty() {
            config.path_filters = args.filters.clone();
        }
        if let Some(bazel) = &args.bazel {
            config.bazel_path = Some(bazel.clone());
        }

        let workspace_root = args
            .workspace_root
            .clone()
            .or_else(|| {
                config_path
                    .as_deref()
                    .and_then(Path::parent)
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .map(Path::to_path_buf)
            })
            .unwrap_or(cwd);
        let workspace_root = workspace_root
            .canonicalize()
            .map_err(|_| Error::ConfigError(format!("workspace root {} does not exist", workspace_root.display())))?;

        let bazel_path = config
            .bazel_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BAZEL));
        // Bare names are looked up on PATH when the query runs
        if bazel_path.components().count() > 1 && !bazel_path.exists() {
            return Err(Error::BuildToolNotFound(bazel_path).into());
        }

        // Surface label and option problems before talking to bazel
        config.build_target_labels()?;
        config.option_set()?;

        Ok(Self {
            config,
            workspace_root,
            bazel_path,
            in_flight: InFlightCounter::new(),
        })
    }

    /// Path filters, defaulting to every build target's package recursively
    pub fn path_filters(&self) -> Result<Vec<String>> {
        if !self.config.path_filters.is_empty() {
            return Ok(self.config.path_filters.clone());
        }
        let filters = self
            .config
            .build_target_labels()?
            .iter()
            .map(|label| match label.package_component() {
                "" => "//...".to_string(),
                package => format!("{package}/..."),
            })
            .collect();
        Ok(filters)
    }

    /// Run one extraction to completion and return its rules
    pub fn extract(&self) -> Result<Vec<RuleInfo>> {
        let packages = self.config.effective_packages()?;
        info!("Extracting {} package(s) from {}", packages.len(), self.workspace_root.display());

        let build_tool = BazelQuery::new(&self.bazel_path, &self.workspace_root);
        let extractor = ProjectInfoExtractor::new(build_tool, &self.workspace_root, packages);
        let mut coordinator = ExtractionCoordinator::with_counter(extractor, self.in_flight.clone());

        let failure: Rc<RefCell<Option<Error>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&failure);
        coordinator.request_extraction(move |id, result| {
            if let Err(e) = result {
                debug!("Extraction {} reported an error", id);
                *slot.borrow_mut() = Some(owned_error(e));
            }
        })?;
        coordinator.wait_idle();

        if let Some(e) = failure.borrow_mut().take() {
            return Err(e.into());
        }
        Ok(coordinator.rule_infos().to_vec())
    }
}

/// Copy an error handed out by reference, keeping its kind where it matters
fn owned_error(error: &Error) -> Error {
    match error {
        Error::RecursiveTestSuite(label) => Error::RecursiveTestSuite(label.clone()),
        Error::ExtractionFailed(reason) => Error::ExtractionFailed(reason.clone()),
        Error::BuildToolNotFound(path) => Error::BuildToolNotFound(path.clone()),
        other => Error::ExtractionFailed(other.to_string()),
    }
}
