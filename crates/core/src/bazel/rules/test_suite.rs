//! Handler for `test_suite` rules

use std::collections::BTreeSet;

use super::RuleHandler;
use crate::bazel::RuleCall;
use crate::error::Result;
use crate::types::{BuildLabel, TEST_SUITE_KIND};

pub struct TestSuiteHandler;

impl RuleHandler for TestSuiteHandler {
    fn can_handle(&self, rule_type: &str) -> bool {
        rule_type == TEST_SUITE_KIND
    }

    fn linked_labels(&self, _rule: &RuleCall) -> Result<BTreeSet<BuildLabel>> {
        Ok(BTreeSet::new())
    }

    fn suite_members(&self, rule: &RuleCall) -> Result<Option<Vec<BuildLabel>>> {
        let members = rule
            .list_attr("tests")
            .into_iter()
            .map(|value| BuildLabel::resolve(value, rule.package()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(members))
    }
}
