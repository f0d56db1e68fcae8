//! Schema library loading and file-type lookup.
//!
//! ## Design Decisions
//!
//! - A library is a directory of versioned schema files (JSON or YAML)
//! - Every file is checked against the patch wire format before it is
//!   accepted; a file that fails is skipped with a warning, the rest of the
//!   library still loads
//! - Effective schemas are compiled lazily and memoized per
//!   (schema name, document version)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use glob::{MatchOptions, Pattern};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::effective::EffectiveSchema;
use super::patch::VersionedSchema;
use super::version::Version;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("failed to read schema file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema file '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("schema file '{path}' does not follow the versioned schema format: {violations}")]
    InvalidFormat { path: PathBuf, violations: String },

    #[error("invalid fileMatch pattern '{pattern}': {reason}")]
    InvalidFileMatch { pattern: String, reason: String },
}

/// Shape of a versioned schema file. Only the envelope and the change list
/// are constrained; the schema bodies themselves are free-form.
static LIBRARY_FORMAT: Lazy<jsonschema::Validator> = Lazy::new(|| {
    let format = json!({
        "type": "object",
        "required": ["schema"],
        "properties": {
            "fileMatch": {"type": "array", "items": {"type": "string"}},
            "schema": {"type": ["object", "boolean"]},
            "versions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["version", "changes"],
                    "properties": {
                        "version": {"type": ["string", "number"]},
                        "changes": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["action", "target"],
                                "properties": {
                                    "action": {"type": "string"},
                                    "target": {"type": ["string", "array"]}
                                }
                            }
                        }
                    }
                }
            }
        }
    });
    jsonschema::validator_for(&format).expect("library format schema is valid")
});

static FORMAT_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""format_version"\s*:\s*(?:"(?<text>[^"]*)"|(?<number>-?\d+(?:\.\d+)?))"#).unwrap()
});

/// Read the declared `format_version` of a document. Malformed documents
/// fall back to a regex scan so a half-typed file keeps its version.
pub fn extract_format_version(text: &str) -> Option<Version> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return map.get("format_version").and_then(Version::from_value);
    }
    let captures = FORMAT_VERSION_RE.captures(text)?;
    if let Some(text) = captures.name("text") {
        return Version::parse(text.as_str());
    }
    let number = captures.name("number")?.as_str().parse::<f64>().ok()?;
    Some(Version::Number(number))
}

/// Load one versioned schema file.
pub fn load_schema_file(path: &Path) -> Result<VersionedSchema, SchemaError> {
    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let value: Value = if is_yaml {
        serde_yaml::from_str(&content).map_err(|e| SchemaError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    } else {
        serde_json::from_str(&content).map_err(|e| SchemaError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    };

    let violations: Vec<String> = LIBRARY_FORMAT
        .iter_errors(&value)
        .map(|error| format!("{} at '{}'", error, error.instance_path))
        .collect();
    if !violations.is_empty() {
        return Err(SchemaError::InvalidFormat {
            path: path.to_path_buf(),
            violations: violations.join("; "),
        });
    }

    serde_json::from_value(value).map_err(|e| SchemaError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub struct RegisteredSchema {
    pub name: String,
    pub schema: Arc<VersionedSchema>,
    patterns: Vec<Pattern>,
}

impl RegisteredSchema {
    pub fn matches(&self, path: &Path) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_path_with(path, options))
    }
}

#[derive(Default)]
pub struct SchemaRegistry {
    entries: Vec<RegisteredSchema>,
    compiled: Mutex<HashMap<(String, String), Arc<EffectiveSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json`, `*.yaml` and `*.yml` file under `dir`. Files are
    /// named after their path relative to `dir`, without extension.
    pub fn load_dir(dir: &Path) -> Result<SchemaRegistry, SchemaError> {
        let mut registry = SchemaRegistry::new();
        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e
                        .file_name()
                        .to_str()
                        .map(|s| s.starts_with('.'))
                        .unwrap_or(false)
            })
            .flatten()
            .filter(|f| {
                matches!(
                    f.path().extension().and_then(|e| e.to_str()),
                    Some("json" | "yaml" | "yml")
                )
            })
            .map(|f| f.into_path())
            .collect();
        // deterministic lookup order when several patterns match one file
        paths.sort();

        for path in paths {
            let name = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .with_extension("")
                .to_string_lossy()
                .replace('\\', "/");
            match load_schema_file(&path) {
                Ok(schema) => {
                    if let Err(err) = registry.register(&name, schema) {
                        warn!(error = %err, "schema file skipped");
                    }
                }
                Err(err) => warn!(error = %err, "schema file skipped"),
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: &str, schema: VersionedSchema) -> Result<(), SchemaError> {
        let patterns = schema
            .file_match
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| SchemaError::InvalidFileMatch {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.compiled_cache().retain(|(cached, _), _| cached != name);
        self.entries.retain(|entry| entry.name != name);
        self.entries.push(RegisteredSchema {
            name: name.to_string(),
            schema: Arc::new(schema),
            patterns,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredSchema> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// The first registered schema whose `fileMatch` accepts `path`.
    pub fn schema_for_path(&self, path: &Path) -> Option<&RegisteredSchema> {
        self.entries.iter().find(|entry| entry.matches(path))
    }

    /// Effective schema of `name` at `version`, compiled on first use.
    pub fn effective(&self, name: &str, version: Option<&Version>) -> Option<Arc<EffectiveSchema>> {
        let entry = self.get(name)?;
        let key = (name.to_string(), version_key(version));

        if let Some(hit) = self.compiled_cache().get(&key) {
            return Some(Arc::clone(hit));
        }

        debug!(schema = name, version = %key.1, "compiling effective schema");
        let compiled = Arc::new(EffectiveSchema::from_versioned(&entry.schema, version));
        self.compiled_cache().insert(key, Arc::clone(&compiled));
        Some(compiled)
    }

    /// Effective schema for a document: picked by path, versioned by the
    /// document's own `format_version`.
    pub fn effective_for_document(&self, path: &Path, text: &str) -> Option<Arc<EffectiveSchema>> {
        let entry = self.schema_for_path(path)?;
        let version = extract_format_version(text);
        self.effective(&entry.name, version.as_ref())
    }

    fn compiled_cache(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(String, String), Arc<EffectiveSchema>>> {
        self.compiled.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Memo key of a document version. The kind is part of the key: `1.8` and
/// `"1.8"` fold different change sets.
fn version_key(version: Option<&Version>) -> String {
    match version {
        None => String::new(),
        Some(Version::Number(n)) => format!("n:{n}"),
        Some(dotted @ Version::Dotted(_)) => format!("d:{dotted}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entity_library() -> &'static str {
        r#"{
            "fileMatch": ["**/entities/*.json"],
            "schema": {"type": "object", "required": ["format_version"]},
            "versions": [
                {"version": "1.20.0", "changes": [
                    {"action": "add", "target": "properties/minecraft:entity", "value": {"type": "object"}}
                ]}
            ]
        }"#
    }

    #[test]
    fn test_extract_format_version_from_valid_json() {
        let version = extract_format_version(r#"{"format_version": "1.20.10"}"#);
        assert_eq!(version, Version::parse("1.20.10"));
    }

    #[test]
    fn test_extract_format_version_from_broken_json() {
        let version = extract_format_version("{\n  \"format_version\": \"1.19.0\",\n  \"x\": ");
        assert_eq!(version, Version::parse("1.19.0"));
        let numeric = extract_format_version("{\"format_version\": 1.8, ");
        assert_eq!(numeric, Some(Version::Number(1.8)));
        assert_eq!(extract_format_version("{\"other\": 1, "), None);
    }

    #[test]
    fn test_load_dir_registers_valid_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("entity.json"), entity_library()).unwrap();
        fs::write(
            temp_dir.path().join("item.yaml"),
            "fileMatch: ['**/items/*.json']\nschema:\n  type: object\n",
        )
        .unwrap();
        // missing the required "schema" envelope key
        fs::write(temp_dir.path().join("broken.json"), r#"{"fileMatch": []}"#).unwrap();
        fs::write(temp_dir.path().join("garbage.json"), "{ not json").unwrap();

        let registry = SchemaRegistry::load_dir(temp_dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("entity").is_some());
        assert!(registry.get("item").is_some());
    }

    #[test]
    fn test_invalid_change_list_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"schema": {}, "versions": [{"version": "1.0", "changes": [{"value": 1}]}]}"#,
        )
        .unwrap();
        let result = load_schema_file(&path);
        assert!(matches!(result, Err(SchemaError::InvalidFormat { .. })));
    }

    #[test]
    fn test_schema_for_path_uses_file_match() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("entity", serde_json::from_str(entity_library()).unwrap())
            .unwrap();
        assert!(registry
            .schema_for_path(Path::new("/ws/BP/entities/pig.json"))
            .is_some());
        assert!(registry
            .schema_for_path(Path::new("/ws/BP/items/apple.json"))
            .is_none());
    }

    #[test]
    fn test_effective_schema_is_memoized_per_version() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("entity", serde_json::from_str(entity_library()).unwrap())
            .unwrap();

        let new = Version::parse("1.20.0");
        let old = Version::parse("1.16.0");
        let a = registry.effective("entity", new.as_ref()).unwrap();
        let b = registry.effective("entity", new.as_ref()).unwrap();
        let c = registry.effective("entity", old.as_ref()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(a.raw()["properties"].get("minecraft:entity").is_some());
        assert!(c.raw().get("properties").is_none());
    }

    #[test]
    fn test_number_and_dotted_versions_are_memoized_apart() {
        let library = r#"{
            "schema": {"type": "object"},
            "versions": [
                {"version": "1.8", "changes": [
                    {"action": "add", "target": "required", "value": ["x"]}
                ]}
            ]
        }"#;
        let dotted = Version::parse("1.8");
        let number = Some(Version::Number(1.8));

        for order in [[&dotted, &number], [&number, &dotted]] {
            let mut registry = SchemaRegistry::new();
            registry
                .register("e", serde_json::from_str(library).unwrap())
                .unwrap();
            for version in order {
                registry.effective("e", version.as_ref()).unwrap();
            }

            let from_dotted = registry.effective("e", dotted.as_ref()).unwrap();
            let from_number = registry.effective("e", number.as_ref()).unwrap();
            assert_eq!(from_dotted.raw()["required"], json!(["x"]));
            assert!(from_number.raw().get("required").is_none());
            assert!(!Arc::ptr_eq(&from_dotted, &from_number));
        }
    }

    #[test]
    fn test_effective_for_document_reads_format_version() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("entity", serde_json::from_str(entity_library()).unwrap())
            .unwrap();
        let schema = registry
            .effective_for_document(
                Path::new("/ws/entities/cow.json"),
                r#"{"format_version": "1.21.0"}"#,
            )
            .unwrap();
        assert!(schema.raw()["properties"].get("minecraft:entity").is_some());
    }

    #[test]
    fn test_load_dir_skips_file_with_invalid_file_match() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("good.json"), entity_library()).unwrap();
        fs::write(
            temp_dir.path().join("zbad.json"),
            r#"{"fileMatch": ["[unclosed"], "schema": {}}"#,
        )
        .unwrap();

        let registry = SchemaRegistry::load_dir(temp_dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("good").is_some());
        assert!(registry.get("zbad").is_none());
    }

    #[test]
    fn test_invalid_file_match_is_an_error() {
        let mut registry = SchemaRegistry::new();
        let mut schema = VersionedSchema::new(json!({}));
        schema.file_match = vec!["[unclosed".to_string()];
        assert!(matches!(
            registry.register("bad", schema),
            Err(SchemaError::InvalidFileMatch { .. })
        ));
    }
}
