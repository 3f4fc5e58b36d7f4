use anyhow::{Context, Result};
use projgen_core::{CollectingSink, Error, GenerationRequest, ProjectGenerator, golden};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};

use super::Session;
use crate::cli::ProjectArgs;

pub fn generate_command(
    args: &ProjectArgs,
    output_dir: Option<PathBuf>,
    name: Option<String>,
    verbose: bool,
) -> Result<()> {
    let mut session = Session::open(args)?;
    if let Some(name) = name {
        session.config.project_name = Some(name);
    }
    let output_dir = output_dir
        .or_else(|| session.config.output_dir.clone())
        .map(|dir| if dir.is_relative() { session.workspace_root.join(dir) } else { dir })
        .unwrap_or_else(|| session.workspace_root.clone());

    let rules = session.extract()?;
    info!("Extraction produced {} rule(s)", rules.len());

    let _busy = session.in_flight.enter();
    let sink = Arc::new(CollectingSink::new());
    let generator = ProjectGenerator::new(&rules).with_sink(sink.clone());
    let build_targets = generator.select(&session.config.build_target_labels()?)?;

    let request = GenerationRequest::new(session.config.effective_project_name()?, output_dir)
        .with_targets(build_targets)
        .with_path_filters(session.path_filters()?)
        .with_additional_files(session.config.additional_file_paths.clone())
        .with_options(session.config.option_set()?);
    let descriptor = generator.generate(&request)?;

    let bundle = descriptor.bundle_path();
    fs::create_dir_all(&bundle)
        .map_err(Error::from)
        .with_context(|| format!("Failed to create {}", bundle.display()))?;
    let descriptor_path = bundle.join("descriptor.json");
    fs::write(&descriptor_path, golden::to_golden_json(&descriptor)?).map_err(Error::from)?;

    for event in sink.events_at(Level::WARN) {
        eprintln!("warning: {}", event.message);
    }
    if verbose {
        for event in sink.events_at(Level::INFO) {
            match &event.details {
                Some(details) => println!("{} ({})", event.message, details),
                None => println!("{}", event.message),
            }
        }
        for target in &descriptor.targets {
            println!("  {} ({})", target.rule.label, target.rule.rule_type);
        }
    }
    println!("Wrote {}", descriptor_path.display());
    Ok(())
}
