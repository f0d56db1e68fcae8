//! Pluggable sources of identifier lists for completion.
//!
//! A schema names a source with `x-dynamic-examples-source`; the completion
//! engine collects those keys during its synchronous walk and asks a
//! [`DynamicExampleProvider`] for them afterwards. Providers may do I/O.
//! An unknown key yields nothing, and a failing provider is logged and
//! contributes nothing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{ExampleSourceConfig, Settings};
use crate::document::parse;
use crate::schema::resolve_pointer;

/// Where the completion request comes from.
#[derive(Debug, Clone, Default)]
pub struct ExampleContext {
    pub document_path: Option<PathBuf>,
    pub workspace_root: Option<PathBuf>,
}

#[async_trait]
pub trait DynamicExampleProvider: Send + Sync {
    /// Literal values for one source key. Unknown keys return an empty list.
    async fn fetch(&self, key: &str, context: &ExampleContext) -> anyhow::Result<Vec<Value>>;
}

/// Results of several keys, concatenated in key order. Failures are logged
/// and skipped.
pub async fn fetch_all(
    provider: &dyn DynamicExampleProvider,
    keys: &[String],
    context: &ExampleContext,
) -> Vec<Value> {
    let mut values = Vec::new();
    for key in keys {
        match provider.fetch(key, context).await {
            Ok(found) => values.extend(found),
            Err(err) => warn!(key = %key, error = %err, "dynamic example source failed"),
        }
    }
    values
}

/// Provider for hosts without any identifier data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExamples;

#[async_trait]
impl DynamicExampleProvider for NoExamples {
    async fn fetch(&self, _key: &str, _context: &ExampleContext) -> anyhow::Result<Vec<Value>> {
        Ok(vec![])
    }
}

/// A fixed table, such as the vanilla block and entity identifiers.
#[derive(Debug, Clone, Default)]
pub struct StaticExampleProvider {
    table: HashMap<String, Vec<Value>>,
}

impl StaticExampleProvider {
    pub fn new(table: HashMap<String, Vec<Value>>) -> Self {
        Self { table }
    }

    /// Load a `{ "key": [values...] }` table from a JSON or YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading example table {}", path.display()))?;
        let table = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        Ok(Self { table })
    }

    pub fn insert(&mut self, key: impl Into<String>, values: Vec<Value>) {
        self.table.insert(key.into(), values);
    }
}

#[async_trait]
impl DynamicExampleProvider for StaticExampleProvider {
    async fn fetch(&self, key: &str, _context: &ExampleContext) -> anyhow::Result<Vec<Value>> {
        Ok(self.table.get(key).cloned().unwrap_or_default())
    }
}

/// Harvests identifiers from the workspace: every file matching a source's
/// glob contributes the value at the source's pointer.
#[derive(Debug, Clone)]
pub struct WorkspaceExampleProvider {
    root: PathBuf,
    sources: HashMap<String, ExampleSourceConfig>,
}

impl WorkspaceExampleProvider {
    pub fn new(root: impl Into<PathBuf>, sources: HashMap<String, ExampleSourceConfig>) -> Self {
        Self {
            root: root.into(),
            sources,
        }
    }

    pub fn from_settings(root: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self::new(root, settings.example_sources.clone())
    }
}

#[async_trait]
impl DynamicExampleProvider for WorkspaceExampleProvider {
    async fn fetch(&self, key: &str, context: &ExampleContext) -> anyhow::Result<Vec<Value>> {
        let Some(source) = self.sources.get(key).cloned() else {
            return Ok(vec![]);
        };
        let root = context
            .workspace_root
            .clone()
            .unwrap_or_else(|| self.root.clone());

        tokio::task::spawn_blocking(move || harvest(&root, &source))
            .await
            .map_err(|err| anyhow!("example harvest task failed: {err}"))?
    }
}

fn harvest(root: &Path, source: &ExampleSourceConfig) -> anyhow::Result<Vec<Value>> {
    let pattern = Pattern::new(&source.glob)
        .with_context(|| format!("invalid example source glob '{}'", source.glob))?;
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let pointer = format!("#{}", source.pointer);

    let values = WalkDir::new(root)
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
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            pattern.matches_path_with(relative, options)
        })
        .filter_map(|entry| {
            let text = std::fs::read_to_string(entry.path()).ok()?;
            // addon files are commonly JSON with comments
            let tree = parse(&text)?;
            let document = tree.to_value(tree.root());
            let found = resolve_pointer(&document, &pointer).cloned();
            if found.is_none() {
                debug!(path = %entry.path().display(), pointer = %source.pointer, "no identifier in file");
            }
            found
        })
        .filter(|value| !value.is_null())
        .unique_by(Value::to_string)
        .collect();
    Ok(values)
}

/// Several providers queried in order; one failing provider does not hide
/// the others' results.
#[derive(Clone, Default)]
pub struct CompositeProvider {
    providers: Vec<Arc<dyn DynamicExampleProvider>>,
}

impl CompositeProvider {
    pub fn new(providers: Vec<Arc<dyn DynamicExampleProvider>>) -> Self {
        Self { providers }
    }

    pub fn push(&mut self, provider: Arc<dyn DynamicExampleProvider>) {
        self.providers.push(provider);
    }
}

#[async_trait]
impl DynamicExampleProvider for CompositeProvider {
    async fn fetch(&self, key: &str, context: &ExampleContext) -> anyhow::Result<Vec<Value>> {
        let mut values = Vec::new();
        for provider in &self.providers {
            match provider.fetch(key, context).await {
                Ok(found) => values.extend(found),
                Err(err) => warn!(key = %key, error = %err, "example provider failed"),
            }
        }
        Ok(values)
    }
}
