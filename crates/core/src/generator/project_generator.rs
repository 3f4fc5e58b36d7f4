//! Build a `ProjectDescriptor` from selected rules, filters and options

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug};

use super::descriptor::{ProjectDescriptor, ResolvedTarget};
use super::path_filter::PathFilter;
use crate::config::OptionSet;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{Error, Result};
use crate::types::{BuildLabel, RuleInfo};

/// Inputs of a single `generate` call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub name: String,
    pub build_targets: Vec<RuleInfo>,
    pub path_filters: Vec<String>,
    pub additional_file_paths: Vec<String>,
    pub output_dir: PathBuf,
    pub options: OptionSet,
}

impl GenerationRequest {
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            build_targets: Vec::new(),
            path_filters: Vec::new(),
            additional_file_paths: Vec::new(),
            output_dir: output_dir.into(),
            options: OptionSet::new(),
        }
    }

    pub fn with_targets(mut self, targets: Vec<RuleInfo>) -> Self {
        self.build_targets = targets;
        self
    }

    pub fn with_path_filters(mut self, filters: Vec<String>) -> Self {
        self.path_filters = filters;
        self
    }

    pub fn with_additional_files(mut self, paths: Vec<String>) -> Self {
        self.additional_file_paths = paths;
        self
    }

    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }
}

/// Generates descriptors against the rule set of the last extraction
pub struct ProjectGenerator {
    known_rules: BTreeMap<BuildLabel, RuleInfo>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ProjectGenerator {
    pub fn new(known_rules: &[RuleInfo]) -> Self {
        Self {
            known_rules: known_rules
                .iter()
                .map(|rule| (rule.label.clone(), rule.clone()))
                .collect(),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn known_rule(&self, label: &BuildLabel) -> Option<&RuleInfo> {
        self.known_rules.get(label)
    }

    /// Rules for the given labels, as known from extraction
    pub fn select(&self, labels: &[BuildLabel]) -> Result<Vec<RuleInfo>> {
        labels
            .iter()
            .map(|label| {
                self.known_rules
                    .get(label)
                    .cloned()
                    .ok_or_else(|| Error::ConfigError(format!("build target {label} was not found by extraction")))
            })
            .collect()
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<ProjectDescriptor> {
        if request.name.trim().is_empty() {
            return Err(Error::ConfigError("project name is empty".to_string()));
        }
        validate_output_dir(&request.output_dir)?;

        let filters = request
            .path_filters
            .iter()
            .map(|pattern| PathFilter::parse(pattern))
            .collect::<Result<BTreeSet<_>>>()?;

        let (selected, linked) = self.close_over_links(&request.build_targets)?;
        debug!(
            "{} targets after link closure ({} requested)",
            selected.len(),
            request.build_targets.len()
        );

        let mut targets = Vec::new();
        for (label, rule) in selected {
            if !filters.iter().any(|f| f.matches_package(label.package_component())) {
                if linked.contains(&label) {
                    self.sink.record(
                        Level::WARN,
                        &format!("Linked target {label} is excluded by the path filters"),
                        Some("targets that link to it will not find it in the generated project"),
                    );
                }
                continue;
            }
            let options = request.options.effective_values(&label);
            targets.push(ResolvedTarget { rule, options });
        }

        if targets.is_empty() {
            return Err(Error::NoTargetsSelected);
        }

        let additional_file_paths: BTreeSet<String> = request
            .additional_file_paths
            .iter()
            .map(|path| path.trim_start_matches("./").to_string())
            .filter(|path| filters.iter().any(|f| f.matches_file(path)))
            .collect();

        let descriptor = ProjectDescriptor {
            name: request.name.clone(),
            output_dir: request.output_dir.clone(),
            targets,
            additional_file_paths: additional_file_paths.into_iter().collect(),
            path_filters: filters.iter().map(ToString::to_string).collect::<BTreeSet<_>>().into_iter().collect(),
        };

        self.sink.record(
            Level::INFO,
            &format!("Generated project {}", descriptor.name),
            Some(&format!("{} targets", descriptor.targets.len())),
        );
        Ok(descriptor)
    }

    /// Add every target reachable through linked labels
    ///
    /// Returns the closed selection and the labels that were reached by a link.
    fn close_over_links(
        &self,
        build_targets: &[RuleInfo],
    ) -> Result<(BTreeMap<BuildLabel, RuleInfo>, BTreeSet<BuildLabel>)> {
        let mut selected: BTreeMap<BuildLabel, RuleInfo> = BTreeMap::new();
        for rule in build_targets {
            selected.entry(rule.label.clone()).or_insert_with(|| rule.clone());
        }

        let mut linked = BTreeSet::new();
        let mut pending: VecDeque<BuildLabel> = selected.keys().cloned().collect();

        while let Some(owner) = pending.pop_front() {
            let links = selected
                .get(&owner)
                .map(|rule| rule.linked_target_labels.clone())
                .unwrap_or_default();

            for link in links {
                linked.insert(link.clone());
                if selected.contains_key(&link) {
                    continue;
                }
                let rule = self.known_rules.get(&link).ok_or_else(|| Error::MissingHostForTest {
                    test: owner.to_string(),
                    host: link.to_string(),
                })?;
                debug!("Including {} linked from {}", link, owner);
                selected.insert(link.clone(), rule.clone());
                pending.push_back(link);
            }
        }

        Ok((selected, linked))
    }
}

fn validate_output_dir(output_dir: &std::path::Path) -> Result<()> {
    if output_dir.as_os_str().is_empty() || (output_dir.exists() && !output_dir.is_dir()) {
        return Err(Error::InvalidOutputDirectory(output_dir.to_path_buf()));
    }
    Ok(())
}
