//! Turn rule calls into `RuleInfo` records

use std::collections::BTreeSet;

use super::rule_extractor::RuleCall;
use super::rules::{ApplicationHandler, RuleHandler, TestRuleHandler, TestSuiteHandler};
use crate::error::Result;
use crate::types::{BuildLabel, RuleInfo};

/// A rule plus the extraction-only facts the `RuleInfo` does not carry
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedRule {
    pub info: RuleInfo,
    /// Present for suites; empty means every test in the package
    pub suite_members: Option<Vec<BuildLabel>>,
    /// Tagged `manual`, so implicit suite expansion skips it
    pub manual: bool,
}

/// Analyzes rule calls with a set of rule handlers
pub struct RuleAnalyzer {
    rule_handlers: Vec<Box<dyn RuleHandler>>,
}

impl Default for RuleAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleAnalyzer {
    pub fn new() -> Self {
        let handlers: Vec<Box<dyn RuleHandler>> = vec![
            Box::new(TestSuiteHandler),
            Box::new(TestRuleHandler),
            Box::new(ApplicationHandler),
        ];

        Self {
            rule_handlers: handlers,
        }
    }

    /// Analyze a rule call; kinds without a handler get no links
    pub fn analyze(&self, rule: &RuleCall) -> Result<AnalyzedRule> {
        let handler = self
            .rule_handlers
            .iter()
            .find(|handler| handler.can_handle(&rule.rule_type));

        let (linked_target_labels, suite_members) = match handler {
            Some(handler) => (handler.linked_labels(rule)?, handler.suite_members(rule)?),
            None => (BTreeSet::new(), None),
        };

        Ok(AnalyzedRule {
            info: RuleInfo {
                label: rule.label.clone(),
                rule_type: rule.rule_type.clone(),
                linked_target_labels,
            },
            suite_members,
            manual: rule.list_attr("tags").contains(&"manual"),
        })
    }
}
