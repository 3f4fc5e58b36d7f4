use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::OptionKey;
use crate::types::{BuildLabel, RuleInfo};

/// Fully resolved project, ready to hand to a project writer
///
/// Targets are unique and sorted by label; file paths and filters are sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    pub name: String,
    pub output_dir: PathBuf,
    pub targets: Vec<ResolvedTarget>,
    pub additional_file_paths: Vec<String>,
    pub path_filters: Vec<String>,
}

/// A selected rule plus the options that apply to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    #[serde(flatten)]
    pub rule: RuleInfo,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<OptionKey, String>,
}

impl ProjectDescriptor {
    pub fn target(&self, label: &BuildLabel) -> Option<&ResolvedTarget> {
        self.targets
            .binary_search_by(|target| target.rule.label.cmp(label))
            .ok()
            .map(|idx| &self.targets[idx])
    }

    pub fn labels(&self) -> impl Iterator<Item = &BuildLabel> {
        self.targets.iter().map(|target| &target.rule.label)
    }

    /// Directory the project bundle is written to: `<output_dir>/<name>.projgen`
    pub fn bundle_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.projgen", self.name))
    }
}
