use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::BuildLabel;

/// Rule kind whose members are expanded during extraction
pub const TEST_SUITE_KIND: &str = "test_suite";

/// A Bazel rule as seen by the generator
///
/// `linked_target_labels` are association links (a test's host, an app's
/// extensions), not build dependencies. Fields are ordered so the derived
/// ordering sorts by label first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInfo {
    pub label: BuildLabel,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub linked_target_labels: BTreeSet<BuildLabel>,
}

impl RuleInfo {
    pub fn new(label: BuildLabel, rule_type: impl Into<String>) -> Self {
        Self {
            label,
            rule_type: rule_type.into(),
            linked_target_labels: BTreeSet::new(),
        }
    }

    pub fn with_linked(mut self, label: BuildLabel) -> Self {
        self.linked_target_labels.insert(label);
        self
    }

    pub fn is_test_suite(&self) -> bool {
        self.rule_type == TEST_SUITE_KIND
    }

    /// Whether Bazel treats this kind as a test (`*_test`, `test_suite` excluded)
    pub fn is_test(&self) -> bool {
        is_test_kind(&self.rule_type)
    }
}

pub fn is_test_kind(rule_type: &str) -> bool {
    rule_type != TEST_SUITE_KIND && rule_type.ends_with("_test")
}
