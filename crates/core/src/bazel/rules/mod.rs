//! Rule handlers for the rule kinds that carry association links

mod application;
mod test_rule;
mod test_suite;

pub use application::ApplicationHandler;
pub use test_rule::TestRuleHandler;
pub use test_suite::TestSuiteHandler;

use std::collections::BTreeSet;

use super::RuleCall;
use crate::error::Result;
use crate::types::BuildLabel;

/// Trait for handling specific rule types
pub trait RuleHandler: Send + Sync {
    /// Check if this handler can process the given rule type
    fn can_handle(&self, rule_type: &str) -> bool;

    /// Labels of the auxiliary targets this rule is associated with
    fn linked_labels(&self, rule: &RuleCall) -> Result<BTreeSet<BuildLabel>>;

    /// Members to expand in place of this rule, if it is a suite
    ///
    /// `Some(vec![])` means "every test in the rule's package".
    fn suite_members(&self, _rule: &RuleCall) -> Result<Option<Vec<BuildLabel>>> {
        Ok(None)
    }
}

/// Resolve the labels found in the named attributes against the rule's package
pub(crate) fn labels_from_attributes(rule: &RuleCall, names: &[&str]) -> Result<BTreeSet<BuildLabel>> {
    names
        .iter()
        .flat_map(|name| rule.list_attr(name))
        .map(|value| BuildLabel::resolve(value, rule.package()))
        .collect()
}
