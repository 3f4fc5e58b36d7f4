//! Handler for `*_test` rules

use std::collections::BTreeSet;

use super::{RuleHandler, labels_from_attributes};
use crate::bazel::RuleCall;
use crate::error::Result;
use crate::types::{BuildLabel, is_test_kind};

/// Links a test to the application it runs inside
pub struct TestRuleHandler;

impl RuleHandler for TestRuleHandler {
    fn can_handle(&self, rule_type: &str) -> bool {
        is_test_kind(rule_type)
    }

    fn linked_labels(&self, rule: &RuleCall) -> Result<BTreeSet<BuildLabel>> {
        labels_from_attributes(rule, &["test_host"])
    }
}
