//! Typed project options with per-target overrides
//!
//! Every recognised key is always present. Lookups resolve in the order
//! target override, project value, built-in default. Multi-valued options
//! (environment variables as newline separated `KEY=VALUE`) are opaque
//! strings here and follow the same resolution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::BuildLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OptionKey {
    ContinueBuildingAfterError,
    CommandlineArguments,
    EnvironmentVariables,
    BuildOptionsDebug,
    BuildOptionsRelease,
    StartupOptionsDebug,
    StartupOptionsRelease,
    PreBuildScript,
    PreLaunchScript,
    PreTestScript,
    GenerateRunfiles,
}

impl OptionKey {
    pub const ALL: [OptionKey; 11] = [
        OptionKey::ContinueBuildingAfterError,
        OptionKey::CommandlineArguments,
        OptionKey::EnvironmentVariables,
        OptionKey::BuildOptionsDebug,
        OptionKey::BuildOptionsRelease,
        OptionKey::StartupOptionsDebug,
        OptionKey::StartupOptionsRelease,
        OptionKey::PreBuildScript,
        OptionKey::PreLaunchScript,
        OptionKey::PreTestScript,
        OptionKey::GenerateRunfiles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::ContinueBuildingAfterError => "ContinueBuildingAfterError",
            OptionKey::CommandlineArguments => "CommandlineArguments",
            OptionKey::EnvironmentVariables => "EnvironmentVariables",
            OptionKey::BuildOptionsDebug => "BuildOptionsDebug",
            OptionKey::BuildOptionsRelease => "BuildOptionsRelease",
            OptionKey::StartupOptionsDebug => "StartupOptionsDebug",
            OptionKey::StartupOptionsRelease => "StartupOptionsRelease",
            OptionKey::PreBuildScript => "PreBuildScript",
            OptionKey::PreLaunchScript => "PreLaunchScript",
            OptionKey::PreTestScript => "PreTestScript",
            OptionKey::GenerateRunfiles => "GenerateRunfiles",
        }
    }

    /// Value used when neither the project nor the target sets one
    pub fn default_value(self) -> Option<&'static str> {
        match self {
            OptionKey::ContinueBuildingAfterError | OptionKey::GenerateRunfiles => Some("NO"),
            _ => None,
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OptionKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::UnknownOptionKey(s.to_string()))
    }
}

impl TryFrom<String> for OptionKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<OptionKey> for String {
    fn from(key: OptionKey) -> Self {
        key.as_str().to_string()
    }
}

/// Stored values of one option; also its persisted form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_value: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub target_values: BTreeMap<String, String>,
}

impl OptionValue {
    fn is_empty(&self) -> bool {
        self.project_value.is_none() && self.target_values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSet {
    options: BTreeMap<OptionKey, OptionValue>,
}

impl Default for OptionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionSet {
    pub fn new() -> Self {
        Self {
            options: OptionKey::ALL
                .into_iter()
                .map(|key| (key, OptionValue::default()))
                .collect(),
        }
    }

    /// Effective value for `target`, or the project-wide value when `None`
    pub fn get(&self, key: OptionKey, target: Option<&BuildLabel>) -> Option<&str> {
        let value = self.options.get(&key);
        let override_value = target
            .zip(value)
            .and_then(|(label, value)| value.target_values.get(label.as_str()));

        override_value
            .or_else(|| value.and_then(|v| v.project_value.as_ref()))
            .map(String::as_str)
            .or_else(|| key.default_value())
    }

    /// [`OptionSet::get`] with the key and target given as strings
    pub fn get_named(&self, key: &str, target: Option<&str>) -> Result<Option<&str>> {
        let key: OptionKey = key.parse()?;
        let target = target.map(BuildLabel::parse).transpose()?;
        Ok(self.get(key, target.as_ref()))
    }

    /// Set the project value (`target == None`) or a target override
    pub fn set(&mut self, key: OptionKey, value: impl Into<String>, target: Option<&BuildLabel>) {
        let entry = self.options.entry(key).or_default();
        match target {
            Some(label) => {
                entry.target_values.insert(label.to_string(), value.into());
            }
            None => entry.project_value = Some(value.into()),
        }
    }

    pub fn set_named(&mut self, key: &str, value: impl Into<String>, target: Option<&str>) -> Result<()> {
        let key: OptionKey = key.parse()?;
        let target = target.map(BuildLabel::parse).transpose()?;
        self.set(key, value, target.as_ref());
        Ok(())
    }

    /// Remove the project value or a target override, falling back to the next level
    pub fn clear(&mut self, key: OptionKey, target: Option<&BuildLabel>) {
        if let Some(entry) = self.options.get_mut(&key) {
            match target {
                Some(label) => {
                    entry.target_values.remove(label.as_str());
                }
                None => entry.project_value = None,
            }
        }
    }

    pub fn value(&self, key: OptionKey) -> Option<&OptionValue> {
        self.options.get(&key)
    }

    /// Every option that resolves to a value for `target`
    pub fn effective_values(&self, target: &BuildLabel) -> BTreeMap<OptionKey, String> {
        OptionKey::ALL
            .into_iter()
            .filter_map(|key| self.get(key, Some(target)).map(|value| (key, value.to_string())))
            .collect()
    }

    /// Build from the persisted key/value form, rejecting unknown keys and bad labels
    pub fn from_persisted(persisted: &BTreeMap<String, OptionValue>) -> Result<Self> {
        let mut set = Self::new();
        for (name, value) in persisted {
            let key: OptionKey = name.parse()?;
            for label in value.target_values.keys() {
                BuildLabel::parse(label)?;
            }
            set.options.insert(key, value.clone());
        }
        Ok(set)
    }

    /// Persisted form; options with nothing set are omitted
    pub fn to_persisted(&self) -> BTreeMap<String, OptionValue> {
        self.options
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> BuildLabel {
        BuildLabel::parse(s).unwrap()
    }

    #[test]
    fn test_defaults_are_prepopulated() {
        let options = OptionSet::new();
        for key in OptionKey::ALL {
            assert!(options.value(key).is_some(), "{key} missing");
        }
        assert_eq!(options.get(OptionKey::ContinueBuildingAfterError, None), Some("NO"));
        assert_eq!(options.get(OptionKey::CommandlineArguments, None), None);
    }

    #[test]
    fn test_project_value_applies_to_every_target() {
        let mut options = OptionSet::new();
        options.set(OptionKey::CommandlineArguments, "-v", None);

        assert_eq!(options.get(OptionKey::CommandlineArguments, None), Some("-v"));
        assert_eq!(
            options.get(OptionKey::CommandlineArguments, Some(&label("//any:thing"))),
            Some("-v")
        );
    }

    #[test]
    fn test_target_override_wins() {
        let app = label("//pkg:App");
        let mut options = OptionSet::new();
        options.set(OptionKey::EnvironmentVariables, "A=1\nB=2", Some(&app));
        options.set(OptionKey::EnvironmentVariables, "A=0", None);

        assert_eq!(options.get(OptionKey::EnvironmentVariables, Some(&app)), Some("A=1\nB=2"));
        assert_eq!(
            options.get(OptionKey::EnvironmentVariables, Some(&label("//pkg:Other"))),
            Some("A=0")
        );

        options.clear(OptionKey::EnvironmentVariables, Some(&app));
        assert_eq!(options.get(OptionKey::EnvironmentVariables, Some(&app)), Some("A=0"));
    }

    #[test]
    fn test_named_access_validates_input() {
        let mut options = OptionSet::new();
        options.set_named("PreBuildScript", "echo hi", Some("//pkg:App")).unwrap();
        assert_eq!(
            options.get_named("PreBuildScript", Some("//pkg:App")).unwrap(),
            Some("echo hi")
        );

        assert!(matches!(
            options.set_named("NotAnOption", "x", None),
            Err(Error::UnknownOptionKey(ref key)) if key == "NotAnOption"
        ));
        assert!(matches!(
            options.set_named("PreBuildScript", "x", Some("pkg:App")),
            Err(Error::MalformedLabel { .. })
        ));
        assert!(options.get_named("Nope", None).is_err());
    }

    #[test]
    fn test_effective_values() {
        let app = label("//pkg:App");
        let mut options = OptionSet::new();
        options.set(OptionKey::BuildOptionsDebug, "--config=dbg", None);
        options.set(OptionKey::ContinueBuildingAfterError, "YES", Some(&app));

        let values = options.effective_values(&app);
        assert_eq!(values.get(&OptionKey::BuildOptionsDebug).map(String::as_str), Some("--config=dbg"));
        assert_eq!(values.get(&OptionKey::ContinueBuildingAfterError).map(String::as_str), Some("YES"));
        assert_eq!(values.get(&OptionKey::GenerateRunfiles).map(String::as_str), Some("NO"));
        assert!(!values.contains_key(&OptionKey::PreTestScript));
    }

    #[test]
    fn test_persisted_form() {
        let persisted: BTreeMap<String, OptionValue> = serde_json::from_value(serde_json::json!({
            "CommandlineArguments": {
                "projectValue": "--flag",
                "targetValues": { "//pkg:App": "--other" }
            }
        }))
        .unwrap();

        let options = OptionSet::from_persisted(&persisted).unwrap();
        assert_eq!(
            options.get(OptionKey::CommandlineArguments, Some(&label("//pkg:App"))),
            Some("--other")
        );
        assert_eq!(options.to_persisted(), persisted);

        let mut unknown = persisted.clone();
        unknown.insert("Bogus".to_string(), OptionValue::default());
        assert!(matches!(
            OptionSet::from_persisted(&unknown),
            Err(Error::UnknownOptionKey(_))
        ));
    }
}
