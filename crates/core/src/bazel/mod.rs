//! Bazel support: querying, parsing query output and resolving rules

pub mod coordinator;
pub mod extractor;
pub mod query;
pub mod rule_analyzer;
pub mod rule_extractor;
pub mod rules;
pub mod starlark_parser;

pub use coordinator::{ExtractionCoordinator, InFlightCounter, InFlightGuard, RequestId};
pub use extractor::ProjectInfoExtractor;
pub use query::{BazelQuery, BuildTool, StaticBuildTool, labels_query, package_query};
pub use rule_analyzer::{AnalyzedRule, RuleAnalyzer};
pub use rule_extractor::{AttributeValue, RuleCall, RuleExtractor, SourceLocation};
pub use starlark_parser::{StarlarkAst, StarlarkParser};
