//! Resolve Bazel packages into a flat, suite-free list of `RuleInfo`

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, debug};

use super::query::{BuildTool, labels_query, package_query};
use super::rule_analyzer::{AnalyzedRule, RuleAnalyzer};
use super::{RuleExtractor, StarlarkParser};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{Error, Result};
use crate::generator::PathFilter;
use crate::types::{BuildLabel, RuleInfo};

/// Queries a build tool for the rules under a set of packages
pub struct ProjectInfoExtractor<T: BuildTool> {
    build_tool: T,
    workspace_root: PathBuf,
    packages: Vec<String>,
    analyzer: RuleAnalyzer,
    sink: Arc<dyn DiagnosticSink>,
}

impl<T: BuildTool> ProjectInfoExtractor<T> {
    pub fn new(build_tool: T, workspace_root: impl Into<PathBuf>, packages: Vec<String>) -> Self {
        Self {
            build_tool,
            workspace_root: workspace_root.into(),
            packages,
            analyzer: RuleAnalyzer::new(),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build_tool(&self) -> &T {
        &self.build_tool
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Every concrete rule in the configured packages, sorted by label
    ///
    /// `test_suite` rules never appear in the result; they are replaced by
    /// their transitive members. Failures other than a suite cycle collapse
    /// into [`Error::ExtractionFailed`].
    pub fn extract_target_rules(&self) -> Result<Vec<RuleInfo>> {
        let result = self.extract().map_err(|e| match e {
            Error::RecursiveTestSuite(_) | Error::ExtractionFailed(_) => e,
            other => Error::ExtractionFailed(other.to_string()),
        });

        match &result {
            Ok(rules) => self.sink.record(
                Level::INFO,
                &format!("Extracted {} rules", rules.len()),
                Some(&self.packages.join(", ")),
            ),
            Err(e) => self.sink.record(Level::ERROR, "Rule extraction failed", Some(&e.to_string())),
        }
        result
    }

    fn extract(&self) -> Result<Vec<RuleInfo>> {
        let mut known: BTreeMap<BuildLabel, AnalyzedRule> = BTreeMap::new();
        for rule in self.run_query(&package_query(&self.packages)?)? {
            known.insert(rule.info.label.clone(), rule);
        }

        self.fetch_missing_suite_members(&mut known)?;

        let mut expanded: HashMap<BuildLabel, BTreeSet<BuildLabel>> = HashMap::new();
        let mut result: BTreeMap<BuildLabel, RuleInfo> = BTreeMap::new();
        for rule in known.values() {
            if rule.suite_members.is_none() {
                result.insert(rule.info.label.clone(), rule.info.clone());
                continue;
            }
            for member in expand_suite(&rule.info.label, &known, &mut expanded)? {
                if let Some(member_rule) = known.get(&member) {
                    result.insert(member.clone(), member_rule.info.clone());
                }
            }
        }

        debug!("Resolved {} concrete rules from {} queried", result.len(), known.len());
        Ok(result.into_values().collect())
    }

    fn run_query(&self, expression: &str) -> Result<Vec<AnalyzedRule>> {
        let output = self.build_tool.query(expression)?;
        let ast = StarlarkParser::new()?.parse(&output)?;
        RuleExtractor::extract_rules(&ast, &self.workspace_root)?
            .iter()
            .map(|rule| self.analyzer.analyze(rule))
            .collect()
    }

    /// Query suite members outside the configured packages until none are missing
    ///
    /// Implicit suites found that way need their whole package, so those
    /// packages are queried too.
    fn fetch_missing_suite_members(&self, known: &mut BTreeMap<BuildLabel, AnalyzedRule>) -> Result<()> {
        let mut fetched_packages: BTreeSet<String> = BTreeSet::new();

        loop {
            let missing: BTreeSet<BuildLabel> = known
                .values()
                .filter_map(|rule| rule.suite_members.as_ref())
                .flatten()
                .filter(|member| !known.contains_key(*member))
                .cloned()
                .collect();

            let packages: Vec<String> = known
                .values()
                .filter(|rule| rule.suite_members.as_ref().is_some_and(Vec::is_empty))
                .map(|rule| rule.info.label.package_component().to_string())
                .filter(|package| !self.covers_package(package) && !fetched_packages.contains(package))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            if missing.is_empty() && packages.is_empty() {
                return Ok(());
            }

            if !missing.is_empty() {
                debug!("Fetching {} test_suite members outside the queried packages", missing.len());
                for rule in self.run_query(&labels_query(&missing))? {
                    known.insert(rule.info.label.clone(), rule);
                }

                if let Some(unresolved) = missing.iter().find(|label| !known.contains_key(*label)) {
                    return Err(Error::ExtractionFailed(format!(
                        "test_suite member {unresolved} was not returned by the build tool"
                    )));
                }
            }

            if !packages.is_empty() {
                debug!("Fetching {} package(s) of implicit test_suites", packages.len());
                fetched_packages.extend(packages.iter().cloned());
                for rule in self.run_query(&package_query(&packages)?)? {
                    known.insert(rule.info.label.clone(), rule);
                }
            }
        }
    }

    /// Whether the configured package query already returns every rule of `package`
    fn covers_package(&self, package: &str) -> bool {
        self.packages
            .iter()
            .filter_map(|pattern| PathFilter::parse(pattern).ok())
            .any(|filter| filter.matches_package(package))
    }
}

/// Members of a suite as written, or every non-manual test in its package
fn direct_members(suite: &AnalyzedRule, known: &BTreeMap<BuildLabel, AnalyzedRule>) -> Vec<BuildLabel> {
    match suite.suite_members.as_deref() {
        Some(members) if !members.is_empty() => members.to_vec(),
        _ => {
            let package = suite.info.label.package_component();
            known
                .values()
                .filter(|rule| rule.info.label.package_component() == package)
                .filter(|rule| rule.info.is_test() && !rule.manual)
                .map(|rule| rule.info.label.clone())
                .collect()
        }
    }
}

struct SuiteFrame {
    label: BuildLabel,
    members: Vec<BuildLabel>,
    next: usize,
    concrete: BTreeSet<BuildLabel>,
}

/// Iterative depth-first expansion of a suite into concrete rule labels
///
/// A suite reached again while still on the traversal path is a cycle.
/// Finished suites are memoised in `expanded`, so diamonds are not cycles.
fn expand_suite(
    root: &BuildLabel,
    known: &BTreeMap<BuildLabel, AnalyzedRule>,
    expanded: &mut HashMap<BuildLabel, BTreeSet<BuildLabel>>,
) -> Result<BTreeSet<BuildLabel>> {
    if let Some(done) = expanded.get(root) {
        return Ok(done.clone());
    }

    let frame_for = |label: &BuildLabel| -> Result<SuiteFrame> {
        let rule = known
            .get(label)
            .ok_or_else(|| Error::ExtractionFailed(format!("unknown test_suite {label}")))?;
        Ok(SuiteFrame {
            label: label.clone(),
            members: direct_members(rule, known),
            next: 0,
            concrete: BTreeSet::new(),
        })
    };

    let mut on_path: HashSet<BuildLabel> = HashSet::from([root.clone()]);
    let mut stack = vec![frame_for(root)?];

    while let Some(frame) = stack.last_mut() {
        if frame.next == frame.members.len() {
            let Some(finished) = stack.pop() else { break };
            on_path.remove(&finished.label);
            expanded.insert(finished.label.clone(), finished.concrete.clone());
            match stack.last_mut() {
                Some(parent) => parent.concrete.extend(finished.concrete),
                None => return Ok(finished.concrete),
            }
            continue;
        }

        let member = frame.members[frame.next].clone();
        frame.next += 1;

        let rule = known.get(&member).ok_or_else(|| {
            Error::ExtractionFailed(format!("test_suite {} references unknown target {member}", frame.label))
        })?;

        if rule.suite_members.is_none() {
            frame.concrete.insert(member);
        } else if on_path.contains(&member) {
            return Err(Error::RecursiveTestSuite(member.to_string()));
        } else if let Some(done) = expanded.get(&member) {
            frame.concrete.extend(done.iter().cloned());
        } else {
            on_path.insert(member.clone());
            stack.push(frame_for(&member)?);
        }
    }

    Ok(BTreeSet::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bazel::StaticBuildTool;
    use crate::diagnostics::CollectingSink;

    fn pkg_query(pkg: &str) -> String {
        package_query(&[pkg.to_string()]).unwrap()
    }

    fn extractor(tool: StaticBuildTool, pkg: &str) -> ProjectInfoExtractor<StaticBuildTool> {
        ProjectInfoExtractor::new(tool, "/ws", vec![pkg.to_string()])
    }

    fn labels(rules: &[RuleInfo]) -> Vec<&str> {
        rules.iter().map(|r| r.label.as_str()).collect()
    }

    #[test]
    fn test_suite_is_replaced_by_its_members() {
        let output = r#"# /ws/pkg/BUILD:1:11
test_suite(
  name = "AllTests",
  tests = [":UnitTests", ":UITests"],
)
# /ws/pkg/BUILD:6:14
ios_unit_test(
  name = "UnitTests",
)
# /ws/pkg/BUILD:10:12
ios_ui_test(
  name = "UITests",
)
"#;
        let tool = StaticBuildTool::new().respond(pkg_query("pkg"), output);
        let rules = extractor(tool, "pkg").extract_target_rules().unwrap();

        assert_eq!(labels(&rules), vec!["//pkg:UITests", "//pkg:UnitTests"]);
        assert!(rules.iter().all(|r| !r.is_test_suite()));
    }

    #[test]
    fn test_nested_suites_and_remote_members() {
        let output = r#"# /ws/pkg/BUILD:1:11
test_suite(
  name = "Outer",
  tests = [":Inner", "//other:RemoteTests"],
)
# /ws/pkg/BUILD:6:11
test_suite(
  name = "Inner",
  tests = [":LocalTests"],
)
# /ws/pkg/BUILD:11:14
ios_unit_test(
  name = "LocalTests",
)
"#;
        let remote = r#"# /ws/other/BUILD:1:14
ios_unit_test(
  name = "RemoteTests",
  test_host = "//other:Host",
)
"#;
        let tool = StaticBuildTool::new()
            .respond(pkg_query("pkg"), output)
            .respond("set(//other:RemoteTests)", remote);
        let extractor = extractor(tool, "pkg");
        let rules = extractor.extract_target_rules().unwrap();

        assert_eq!(labels(&rules), vec!["//other:RemoteTests", "//pkg:LocalTests"]);
        assert_eq!(
            extractor.build_tool().queries(),
            vec![pkg_query("pkg"), "set(//other:RemoteTests)".to_string()]
        );
        assert_eq!(rules[0].linked_target_labels.len(), 1);
    }

    #[test]
    fn test_remote_implicit_suite_queries_its_package() {
        let output = r#"# /ws/pkg/BUILD:1:11
test_suite(
  name = "Outer",
  tests = ["//other:All"],
)
"#;
        let remote_suite = r#"# /ws/other/BUILD:1:11
test_suite(
  name = "All",
)
"#;
        let remote_package = r#"# /ws/other/BUILD:1:11
test_suite(
  name = "All",
)
# /ws/other/BUILD:4:14
ios_unit_test(
  name = "OtherTests",
)
# /ws/other/BUILD:7:14
ios_unit_test(
  name = "Slow",
  tags = ["manual"],
)
"#;
        let tool = StaticBuildTool::new()
            .respond(pkg_query("pkg"), output)
            .respond("set(//other:All)", remote_suite)
            .respond(pkg_query("other"), remote_package);
        let extractor = extractor(tool, "pkg");
        let rules = extractor.extract_target_rules().unwrap();

        assert_eq!(labels(&rules), vec!["//other:OtherTests", "//other:Slow"]);
        assert_eq!(
            extractor.build_tool().queries(),
            vec![pkg_query("pkg"), "set(//other:All)".to_string(), pkg_query("other")]
        );
    }

    #[test]
    fn test_implicit_suite_in_queried_package_needs_no_follow_up() {
        let output = r#"# /ws/pkg/sub/BUILD:1:11
test_suite(
  name = "All",
)
# /ws/pkg/sub/BUILD:4:14
ios_unit_test(
  name = "T",
)
"#;
        let tool = StaticBuildTool::new().respond(pkg_query("pkg/..."), output);
        let extractor = extractor(tool, "pkg/...");
        let rules = extractor.extract_target_rules().unwrap();

        assert_eq!(labels(&rules), vec!["//pkg/sub:T"]);
        assert_eq!(extractor.build_tool().queries(), vec![pkg_query("pkg/...")]);
    }

    #[test]
    fn test_implicit_suite_takes_package_tests() {
        let output = r#"# /ws/pkg/BUILD:1:11
test_suite(
  name = "Everything",
)
# /ws/pkg/BUILD:4:14
ios_unit_test(
  name = "A",
)
# /ws/pkg/BUILD:7:14
ios_unit_test(
  name = "Manual",
  tags = ["manual"],
)
# /ws/pkg/BUILD:11:16
ios_application(
  name = "App",
)
"#;
        let tool = StaticBuildTool::new().respond(pkg_query("pkg"), output);
        let rules = extractor(tool, "pkg").extract_target_rules().unwrap();

        // Manual tests are still concrete rules of the package, they are only
        // left out of the implicit suite.
        assert_eq!(labels(&rules), vec!["//pkg:A", "//pkg:App", "//pkg:Manual"]);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let output = r#"# /ws/pkg/BUILD:1:11
test_suite(
  name = "Top",
  tests = [":Left", ":Right"],
)
# /ws/pkg/BUILD:2:11
test_suite(
  name = "Left",
  tests = [":Shared"],
)
# /ws/pkg/BUILD:3:11
test_suite(
  name = "Right",
  tests = [":Shared"],
)
# /ws/pkg/BUILD:4:11
test_suite(
  name = "Shared",
  tests = [":T"],
)
# /ws/pkg/BUILD:5:14
ios_unit_test(
  name = "T",
)
"#;
        let tool = StaticBuildTool::new().respond(pkg_query("pkg"), output);
        let rules = extractor(tool, "pkg").extract_target_rules().unwrap();
        assert_eq!(labels(&rules), vec!["//pkg:T"]);
    }

    #[test]
    fn test_self_referencing_suite_fails() {
        let output = r#"# /ws/pkg/BUILD:1:11
test_suite(
  name = "Loop",
  tests = [":Loop"],
)
"#;
        let tool = StaticBuildTool::new().respond(pkg_query("pkg"), output);
        let err = extractor(tool, "pkg").extract_target_rules().unwrap_err();
        assert!(matches!(err, Error::RecursiveTestSuite(ref label) if label == "//pkg:Loop"));
    }

    #[test]
    fn test_transitive_suite_cycle_fails() {
        let output = r#"# /ws/pkg/BUILD:1:11
test_suite(
  name = "A",
  tests = [":B", ":T"],
)
# /ws/pkg/BUILD:2:11
test_suite(
  name = "B",
  tests = [":C"],
)
# /ws/pkg/BUILD:3:11
test_suite(
  name = "C",
  tests = [":A"],
)
# /ws/pkg/BUILD:4:14
ios_unit_test(
  name = "T",
)
"#;
        let tool = StaticBuildTool::new().respond(pkg_query("pkg"), output);
        let err = extractor(tool, "pkg").extract_target_rules().unwrap_err();
        assert!(matches!(err, Error::RecursiveTestSuite(_)));
    }

    #[test]
    fn test_failures_are_coarse_grained() {
        let sink = Arc::new(CollectingSink::new());

        // No canned response: the build tool fails
        let err = extractor(StaticBuildTool::new(), "pkg")
            .with_sink(sink.clone())
            .extract_target_rules()
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
        assert_eq!(sink.events_at(Level::ERROR).len(), 1);

        // Malformed output
        let tool = StaticBuildTool::new().respond(pkg_query("pkg"), "ios_application(\n");
        let err = extractor(tool, "pkg").extract_target_rules().unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));

        // Bad label inside otherwise valid output
        let tool = StaticBuildTool::new().respond(
            pkg_query("pkg"),
            "# /ws/pkg/BUILD:1:1\nios_unit_test(\n  name = \"T\",\n  test_host = \"//bad label\",\n)\n",
        );
        let err = extractor(tool, "pkg").extract_target_rules().unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(ref reason) if reason.contains("Malformed label")));
    }

    #[test]
    fn test_unknown_remote_member_fails() {
        let output = r#"# /ws/pkg/BUILD:1:11
test_suite(
  name = "S",
  tests = ["//gone:T"],
)
"#;
        let tool = StaticBuildTool::new()
            .respond(pkg_query("pkg"), output)
            .respond("set(//gone:T)", "");
        let err = extractor(tool, "pkg").extract_target_rules().unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(ref reason) if reason.contains("//gone:T")));
    }
}
