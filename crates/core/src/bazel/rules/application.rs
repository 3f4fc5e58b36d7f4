//! Handler for `*_application` rules

use std::collections::BTreeSet;

use super::{RuleHandler, labels_from_attributes};
use crate::bazel::RuleCall;
use crate::error::Result;
use crate::types::BuildLabel;

/// Links an application to the extensions and watch app bundled with it
pub struct ApplicationHandler;

impl RuleHandler for ApplicationHandler {
    fn can_handle(&self, rule_type: &str) -> bool {
        rule_type.ends_with("_application")
    }

    fn linked_labels(&self, rule: &RuleCall) -> Result<BTreeSet<BuildLabel>> {
        labels_from_attributes(rule, &["extensions", "watch_application"])
    }
}
