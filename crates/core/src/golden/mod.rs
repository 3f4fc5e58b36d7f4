//! Golden-file comparison for generated descriptors
//!
//! The serialized form carries per-run identifiers (`guid`), so both sides
//! are normalised before comparison. The diff is structural: objects are
//! compared key by key and plain string lists are compared as sets, so
//! formatting and key order never show up. Target lists are matched by
//! label; their order is significant since descriptors keep targets sorted,
//! and a label that appears more often on one side is reported per extra
//! occurrence.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Error, Result};
use crate::generator::ProjectDescriptor;

/// Keys regenerated on every run
pub const VOLATILE_KEYS: [&str; 2] = ["guid", "generatedAt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

/// One difference between the golden and the candidate output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffKind,
    /// Location such as `targets[//pkg:App].type`
    pub path: String,
    pub golden: Option<String>,
    pub candidate: Option<String>,
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let golden = self.golden.as_deref().unwrap_or("");
        let candidate = self.candidate.as_deref().unwrap_or("");
        match self.kind {
            DiffKind::Added => write!(f, "+ {}: {}", self.path, candidate),
            DiffKind::Removed => write!(f, "- {}: {}", self.path, golden),
            DiffKind::Changed => write!(f, "~ {}: {} -> {}", self.path, golden, candidate),
        }
    }
}

/// Serialize a descriptor the way a project writer would, guids included
pub fn to_golden_json(descriptor: &ProjectDescriptor) -> Result<String> {
    let mut value = serde_json::to_value(descriptor)?;
    if let Value::Object(root) = &mut value {
        root.insert("guid".to_string(), Value::String(new_guid()));
        if let Some(Value::Array(targets)) = root.get_mut("targets") {
            for target in targets.iter_mut().filter_map(Value::as_object_mut) {
                target.insert("guid".to_string(), Value::String(new_guid()));
            }
        }
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

fn new_guid() -> String {
    uuid::Uuid::new_v4().simple().to_string().to_uppercase()
}

/// Strip volatile keys at every depth
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !VOLATILE_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key, normalize(value)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

/// Every difference between two serialized descriptors
pub fn diff(candidate: &str, golden: &str) -> Result<Vec<DiffLine>> {
    let candidate = normalize(serde_json::from_str(candidate)?);
    let golden = normalize(serde_json::from_str(golden)?);

    let mut lines = Vec::new();
    diff_values("", &golden, &candidate, &mut lines);
    Ok(lines)
}

/// Fails with every diff line at once when there is any difference
pub fn validate_diff(lines: &[DiffLine]) -> Result<()> {
    if lines.is_empty() {
        Ok(())
    } else {
        Err(Error::DiffMismatch(lines.to_vec()))
    }
}

fn diff_values(path: &str, golden: &Value, candidate: &Value, out: &mut Vec<DiffLine>) {
    match (golden, candidate) {
        (Value::Object(g), Value::Object(c)) => {
            let keys: BTreeSet<&String> = g.keys().chain(c.keys()).collect();
            for key in keys {
                let child = join(path, key);
                match (g.get(key.as_str()), c.get(key.as_str())) {
                    (Some(gv), Some(cv)) => diff_values(&child, gv, cv, out),
                    (Some(gv), None) => out.push(removed(child, gv)),
                    (None, Some(cv)) => out.push(added(child, cv)),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(g), Value::Array(c)) => {
            if let (Some(g), Some(c)) = (by_label(g), by_label(c)) {
                diff_labelled(path, &g, &c, out);
            } else if g.iter().chain(c).all(is_scalar) {
                let g_set: BTreeSet<String> = g.iter().map(render).collect();
                let c_set: BTreeSet<String> = c.iter().map(render).collect();
                for item in g_set.difference(&c_set) {
                    out.push(DiffLine {
                        kind: DiffKind::Removed,
                        path: path.to_string(),
                        golden: Some(item.clone()),
                        candidate: None,
                    });
                }
                for item in c_set.difference(&g_set) {
                    out.push(DiffLine {
                        kind: DiffKind::Added,
                        path: path.to_string(),
                        golden: None,
                        candidate: Some(item.clone()),
                    });
                }
            } else {
                for idx in 0..g.len().max(c.len()) {
                    let child = format!("{path}[{idx}]");
                    match (g.get(idx), c.get(idx)) {
                        (Some(gv), Some(cv)) => diff_values(&child, gv, cv, out),
                        (Some(gv), None) => out.push(removed(child, gv)),
                        (None, Some(cv)) => out.push(added(child, cv)),
                        (None, None) => {}
                    }
                }
            }
        }
        _ if golden == candidate => {}
        _ => out.push(DiffLine {
            kind: DiffKind::Changed,
            path: path.to_string(),
            golden: Some(render(golden)),
            candidate: Some(render(candidate)),
        }),
    }
}

/// Labels of an array of objects in order, if every element has one
fn by_label(items: &[Value]) -> Option<Vec<(&str, &Value)>> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| item.get("label").and_then(Value::as_str).map(|label| (label, item)))
        .collect()
}

/// Match labelled objects by label; repeated labels pair up in order and a
/// different order of the shared labels is one change on the array itself
fn diff_labelled(path: &str, golden: &[(&str, &Value)], candidate: &[(&str, &Value)], out: &mut Vec<DiffLine>) {
    let g = group(golden);
    let c = group(candidate);

    let labels: BTreeSet<&str> = g.keys().chain(c.keys()).copied().collect();
    for label in labels {
        let child = format!("{path}[{label}]");
        let g_items = g.get(label).map_or(&[][..], Vec::as_slice);
        let c_items = c.get(label).map_or(&[][..], Vec::as_slice);
        for idx in 0..g_items.len().max(c_items.len()) {
            match (g_items.get(idx), c_items.get(idx)) {
                (Some(gv), Some(cv)) => diff_values(&child, gv, cv, out),
                (Some(gv), None) => out.push(removed(child.clone(), gv)),
                (None, Some(cv)) => out.push(added(child.clone(), cv)),
                (None, None) => {}
            }
        }
    }

    let g_order = shared_order(golden, &c);
    let c_order = shared_order(candidate, &g);
    if g_order != c_order {
        out.push(DiffLine {
            kind: DiffKind::Changed,
            path: path.to_string(),
            golden: Some(g_order.join(", ")),
            candidate: Some(c_order.join(", ")),
        });
    }
}

fn group<'a>(items: &[(&'a str, &'a Value)]) -> BTreeMap<&'a str, Vec<&'a Value>> {
    let mut grouped: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
    for (label, item) in items {
        grouped.entry(*label).or_default().push(*item);
    }
    grouped
}

/// First-occurrence order of the labels that `other` also has
fn shared_order<'a>(items: &[(&'a str, &Value)], other: &BTreeMap<&str, Vec<&Value>>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .map(|(label, _)| *label)
        .filter(|label| other.contains_key(label) && seen.insert(*label))
        .collect()
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn added(path: String, value: &Value) -> DiffLine {
    DiffLine {
        kind: DiffKind::Added,
        path,
        golden: None,
        candidate: Some(render(value)),
    }
}

fn removed(path: String, value: &Value) -> DiffLine {
    DiffLine {
        kind: DiffKind::Removed,
        path,
        golden: Some(render(value)),
        candidate: None,
    }
}
