pub mod build_label;
pub mod rule_info;

pub use build_label::BuildLabel;
pub use rule_info::{RuleInfo, TEST_SUITE_KIND, is_test_kind};
