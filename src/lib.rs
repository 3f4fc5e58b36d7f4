//! Canned Bazel workspace used by the end-to-end golden tests

use projgen_core::bazel::package_query;
use projgen_core::{
    BuildLabel, DiagnosticSink, GenerationRequest, OptionSet, ProjectDescriptor, ProjectGenerator, ProjectInfoExtractor, Result,
    RuleInfo, StaticBuildTool,
};
use std::path::PathBuf;
use std::sync::Arc;

pub const WORKSPACE_ROOT: &str = "/ws";
pub const OUTPUT_DIR: &str = "/tmp/projgen-golden";

/// `bazel query 'kind(rule, //app/...)' --output=build`
pub const APP_QUERY_OUTPUT: &str = r#"# /ws/app/BUILD:1:16
ios_application(
  name = "App",
  extensions = ["//app/widget:Widget"],
)
# /ws/app/widget/BUILD:1:14
ios_extension(
  name = "Widget",
)
# /ws/app/tests/BUILD:1:14
ios_unit_test(
  name = "AppTests",
  test_host = "//app:App",
)
# /ws/app/tests/BUILD:6:12
ios_ui_test(
  name = "AppUITests",
  test_host = "//app:App",
  tags = ["manual"],
)
# /ws/app/tests/BUILD:12:11
test_suite(
  name = "AllTests",
  tests = [":AppTests", "//shared:SharedTests"],
)
"#;

/// Follow-up query for the suite member outside `app/...`
pub const SHARED_QUERY_OUTPUT: &str = r#"# /ws/shared/BUILD:1:14
ios_unit_test(
  name = "SharedTests",
  test_host = "//app:App",
)
"#;

pub fn packages() -> Vec<String> {
    vec!["app/...".to_string()]
}

pub fn build_tool() -> Result<StaticBuildTool> {
    Ok(StaticBuildTool::new()
        .respond(package_query(&packages())?, APP_QUERY_OUTPUT)
        .respond("set(//shared:SharedTests)", SHARED_QUERY_OUTPUT))
}

pub fn extract() -> Result<Vec<RuleInfo>> {
    ProjectInfoExtractor::new(build_tool()?, WORKSPACE_ROOT, packages()).extract_target_rules()
}

/// Extract the canned workspace and generate a descriptor for `targets`
pub fn generate(
    targets: &[&str],
    filters: &[&str],
    additional_files: &[&str],
    options: OptionSet,
    sink: Arc<dyn DiagnosticSink>,
) -> Result<ProjectDescriptor> {
    let rules = extract()?;
    let generator = ProjectGenerator::new(&rules).with_sink(sink);

    let labels = targets
        .iter()
        .map(|label| BuildLabel::parse(label))
        .collect::<Result<Vec<_>>>()?;

    let request = GenerationRequest::new("Demo", OUTPUT_DIR)
        .with_targets(generator.select(&labels)?)
        .with_path_filters(filters.iter().map(ToString::to_string).collect())
        .with_additional_files(additional_files.iter().map(ToString::to_string).collect())
        .with_options(options);
    generator.generate(&request)
}

pub fn golden_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("golden")
        .join(format!("{name}.json"))
}
