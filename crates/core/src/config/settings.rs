use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{OptionSet, OptionValue};
use crate::error::{Error, Result};
use crate::types::BuildLabel;

pub const CONFIG_FILE_NAMES: [&str; 2] = [".projgen.json", "projgen.json"];

/// Generator configuration as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(default)]
    pub build_targets: Vec<String>,
    #[serde(default)]
    pub path_filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_file_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bazel_path: Option<PathBuf>,
}

impl GeneratorConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read {}: {e}", path.display())))?;
        let config = serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Walk up from `start_path` looking for a config file
    pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
        let mut current = start_path;

        loop {
            for name in CONFIG_FILE_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    return Some(config_path);
                }
            }

            current = current.parent()?;
        }
    }

    pub fn build_target_labels(&self) -> Result<Vec<BuildLabel>> {
        self.build_targets.iter().map(|s| BuildLabel::parse(s)).collect()
    }

    pub fn option_set(&self) -> Result<OptionSet> {
        OptionSet::from_persisted(&self.options)
    }

    pub fn set_option_set(&mut self, options: &OptionSet) {
        self.options = options.to_persisted();
    }

    /// Packages to query: explicit ones, or those of the build targets
    pub fn effective_packages(&self) -> Result<Vec<String>> {
        if !self.packages.is_empty() {
            return Ok(self.packages.clone());
        }

        let packages: BTreeSet<String> = self
            .build_target_labels()?
            .iter()
            .map(|label| label.package_component().to_string())
            .collect();

        if packages.is_empty() {
            return Err(Error::ConfigError(
                "config names neither packages nor build targets".to_string(),
            ));
        }
        Ok(packages.into_iter().collect())
    }

    /// Project name, falling back to the first build target's name
    pub fn effective_project_name(&self) -> Result<String> {
        if let Some(name) = self.project_name.as_ref().filter(|n| !n.is_empty()) {
            return Ok(name.clone());
        }
        self.build_target_labels()?
            .first()
            .map(|label| label.target_component().to_string())
            .ok_or_else(|| Error::ConfigError("no project name and no build targets".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptionKey;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> GeneratorConfig {
        serde_json::from_value(serde_json::json!({
            "projectName": "Sample",
            "buildTargets": ["//apps/ios:App", "//apps/ios:AppTests", "//libs/core:Core"],
            "pathFilters": ["apps/..."],
            "options": {
                "EnvironmentVariables": { "projectValue": "MODE=dev" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_load_and_save_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".projgen.json");

        let config = sample();
        config.save_to_file(&path).unwrap();
        let loaded = GeneratorConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp_dir.path().join("a/projgen.json"), "{}").unwrap();

        let found = GeneratorConfig::find_config_file(&nested).unwrap();
        assert_eq!(found, temp_dir.path().join("a/projgen.json"));
    }

    #[test]
    fn test_effective_packages_from_targets() {
        let config = sample();
        assert_eq!(config.effective_packages().unwrap(), vec!["apps/ios", "libs/core"]);

        let explicit = GeneratorConfig {
            packages: vec!["apps/...".to_string()],
            ..sample()
        };
        assert_eq!(explicit.effective_packages().unwrap(), vec!["apps/..."]);

        assert!(GeneratorConfig::default().effective_packages().is_err());
    }

    #[test]
    fn test_options_and_labels_are_validated() {
        let config = sample();
        let options = config.option_set().unwrap();
        assert_eq!(options.get(OptionKey::EnvironmentVariables, None), Some("MODE=dev"));

        let bad_label = GeneratorConfig {
            build_targets: vec!["apps:App".to_string()],
            ..sample()
        };
        assert!(matches!(bad_label.build_target_labels(), Err(Error::MalformedLabel { .. })));

        let mut bad_option = sample();
        bad_option.options.insert("Unknown".to_string(), OptionValue::default());
        assert!(matches!(bad_option.option_set(), Err(Error::UnknownOptionKey(_))));
    }

    #[test]
    fn test_project_name_fallback() {
        let unnamed = GeneratorConfig {
            project_name: None,
            ..sample()
        };
        assert_eq!(unnamed.effective_project_name().unwrap(), "App");
        assert_eq!(sample().effective_project_name().unwrap(), "Sample");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("projgen.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(GeneratorConfig::load_from_file(&path), Err(Error::ConfigError(_))));
    }
}
