//! Version-gated schema patches.
//!
//! The on-disk format is append-only: a schema library evolves by adding
//! change sets, never by rewriting earlier ones.
//!
//! ```json
//! {
//!   "fileMatch": ["**/entities/*.json"],
//!   "schema": { "type": "object" },
//!   "versions": [
//!     { "version": "1.20.0",
//!       "changes": [{ "action": "add", "target": "properties/format_version", "value": {} }] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::pointer::{parse_target, remove_path, set_path};
use super::version::Version;
use crate::document::PathSegment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Modify,
    Remove,
    /// Kept so that newer libraries still load; ignored when applied.
    Unknown(String),
}

impl<'de> Deserialize<'de> for ChangeAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(match name.as_str() {
            "add" => ChangeAction::Add,
            "modify" => ChangeAction::Modify,
            "remove" => ChangeAction::Remove,
            _ => ChangeAction::Unknown(name),
        })
    }
}

impl Serialize for ChangeAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            ChangeAction::Add => "add",
            ChangeAction::Modify => "modify",
            ChangeAction::Remove => "remove",
            ChangeAction::Unknown(name) => name,
        })
    }
}

/// A change target, written either as a slash path or as a segment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeTarget {
    Path(String),
    Segments(Vec<PathSegment>),
}

impl ChangeTarget {
    pub fn segments(&self) -> Vec<PathSegment> {
        match self {
            ChangeTarget::Path(path) => parse_target(path),
            ChangeTarget::Segments(segments) => segments.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    #[serde(alias = "targetPath")]
    pub target: ChangeTarget,
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedChangeSet {
    pub version: Value,
    #[serde(default)]
    pub changes: Vec<SchemaChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedSchema {
    #[serde(rename = "fileMatch", default)]
    pub file_match: Vec<String>,
    #[serde(alias = "baseSchema")]
    pub schema: Value,
    #[serde(default, alias = "versionedChanges")]
    pub versions: Vec<VersionedChangeSet>,
}

impl VersionedSchema {
    pub fn new(schema: Value) -> Self {
        Self {
            file_match: vec![],
            schema,
            versions: vec![],
        }
    }

    /// Fold every change set reached by `version` onto a copy of the base
    /// schema, in declaration order. Without a version the base is returned
    /// unchanged.
    pub fn resolve(&self, version: Option<&Version>) -> Value {
        let mut effective = self.schema.clone();
        let Some(version) = version else {
            return effective;
        };

        for change_set in &self.versions {
            let Some(gate) = Version::from_value(&change_set.version) else {
                warn!(version = %change_set.version, "change set has an invalid version; skipped");
                continue;
            };
            if !version.reaches(&gate) {
                continue;
            }
            debug!(gate = %gate, changes = change_set.changes.len(), "applying schema change set");
            for change in &change_set.changes {
                apply_change(&mut effective, change);
            }
        }
        effective
    }
}

pub fn apply_change(schema: &mut Value, change: &SchemaChange) {
    let path = change.target.segments();
    match &change.action {
        ChangeAction::Add | ChangeAction::Modify => {
            // cloned so documents never share a patched subtree
            let value = change.value.clone().unwrap_or(Value::Null);
            set_path(schema, &path, value);
        }
        ChangeAction::Remove => remove_path(schema, &path),
        ChangeAction::Unknown(name) => {
            warn!(action = %name, "unknown schema change action ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn library() -> VersionedSchema {
        serde_json::from_value(json!({
            "fileMatch": ["**/entities/*.json"],
            "schema": {"type": "object", "properties": {"old": {"type": "string"}}},
            "versions": [
                {"version": "1.10.0", "changes": [
                    {"action": "add", "target": "properties/a", "value": {"type": "number"}}
                ]},
                {"version": "1.20.0", "changes": [
                    {"action": "add", "target": ["properties", "b"], "value": {"type": "boolean"}},
                    {"action": "remove", "target": "properties/old"}
                ]},
                {"version": "1.21.0", "changes": [
                    {"action": "rename", "target": "properties/a"}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_no_version_returns_base() {
        let lib = library();
        assert_eq!(lib.resolve(None), lib.schema);
    }

    #[test]
    fn test_applies_reached_change_sets_in_order() {
        let lib = library();
        let effective = lib.resolve(Version::parse("1.20.0").as_ref());
        assert_eq!(
            effective,
            json!({"type": "object", "properties": {
                "a": {"type": "number"},
                "b": {"type": "boolean"}
            }})
        );
    }

    #[test]
    fn test_older_document_skips_newer_changes() {
        let lib = library();
        let effective = lib.resolve(Version::parse("1.12").as_ref());
        assert_eq!(effective["properties"]["old"], json!({"type": "string"}));
        assert_eq!(effective["properties"]["a"], json!({"type": "number"}));
        assert!(effective["properties"].get("b").is_none());
    }

    #[test]
    fn test_unknown_action_is_ignored() {
        let lib = library();
        let at_20 = lib.resolve(Version::parse("1.20.0").as_ref());
        let at_21 = lib.resolve(Version::parse("1.21.0").as_ref());
        assert_eq!(at_20, at_21);
    }

    #[test]
    fn test_base_is_never_mutated() {
        let lib = library();
        let before = lib.schema.clone();
        let _ = lib.resolve(Version::parse("9.0").as_ref());
        assert_eq!(lib.schema, before);
    }

    #[test]
    fn test_later_versions_accumulate_earlier_writes() {
        let lib = library();
        let early = lib.resolve(Version::parse("1.10.0").as_ref());
        let late = lib.resolve(Version::parse("1.20.0").as_ref());
        // disjoint targets: every write up to 1.10 survives at 1.20
        assert_eq!(early["properties"]["a"], late["properties"]["a"]);
    }
}
