//! Shared test utilities for addon-lint.
//!
//! This module provides common helpers used across multiple test modules.
//! It is only compiled when running tests.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::schema::SchemaRegistry;

/// Creates a temporary schema library directory for testing.
///
/// Returns a tuple of (TempDir, PathBuf) where:
/// - TempDir: The temp directory handle (must be kept alive for the test duration)
/// - PathBuf: The path to the `schemas` subdirectory
pub fn create_schema_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let schema_dir = temp_dir.path().join("schemas");
    fs::create_dir(&schema_dir).expect("Failed to create schemas subdirectory");
    (temp_dir, schema_dir)
}

/// Writes `files` (relative path, content) into a fresh schema directory and
/// loads it.
pub fn registry_with(files: &[(&str, &str)]) -> (TempDir, SchemaRegistry) {
    let (temp_dir, schema_dir) = create_schema_dir();
    for (name, content) in files {
        let path = schema_dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create schema subdirectory");
        }
        fs::write(&path, content).expect("Failed to write schema file");
    }
    let registry = SchemaRegistry::load_dir(&schema_dir).expect("Failed to load schema library");
    (temp_dir, registry)
}

/// Entity files: `format_version` is required, and from 1.20.0 on the
/// `minecraft:entity` body must be an object.
pub fn entity_library() -> &'static str {
    r#"{
        "fileMatch": ["**/entities/*.json"],
        "schema": {
            "type": "object",
            "required": ["format_version"],
            "properties": {"format_version": {"type": "string"}}
        },
        "versions": [
            {"version": "1.20.0", "changes": [
                {"action": "add", "target": "properties/minecraft:entity", "value": {"type": "object"}}
            ]}
        ]
    }"#
}
