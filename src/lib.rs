//! addon-lint: schema validation and completion for Minecraft Bedrock addon JSON
//!
//! This crate provides the engine behind editor support for behavior and
//! resource pack files: it validates documents against versioned schemas
//! and suggests property names and values at a cursor position.
//!
//! # Overview
//!
//! - **Versioned Schemas**: A base schema plus append-only change sets, folded
//!   up to the document's own `format_version`
//! - **Validation**: Located problems, with weighted `oneOf`/`anyOf` branch
//!   selection so a near miss reports the closest branch
//! - **Autocomplete**: Property names and values from the schema, plus
//!   identifiers harvested from the workspace
//! - **Diagnostics**: LSP diagnostics for single documents or whole packs
//!
//! # Architecture
//!
//! - [`document`]: Error-tolerant JSON-with-comments parser and position mapping
//! - [`schema`]: Compiled schema nodes, `$ref` resolution, patches and the registry
//! - [`validation`]: The validation engine and branch resolver
//! - [`completion`]: Property and value completers
//! - [`cache`]: Bounded result cache shared between validation runs
//! - [`config`]: Configuration management and settings
//!
//! # Usage
//!
//! ```ignore
//! use addon_lint::config::Settings;
//! use addon_lint::document::Document;
//! use addon_lint::schema::SchemaRegistry;
//!
//! let registry = SchemaRegistry::load_dir(&library_dir)?;
//! let document = Document::with_path(&path, &text);
//! let schema = registry.effective_for_document(&path, &text);
//! ```

// Document model and schema dialect
pub mod document;
pub mod schema;

// Engine
pub mod cache;
pub mod cancel;
pub mod validation;

// LSP feature modules
pub mod completion;
pub mod diagnostics;
pub mod dynamic_examples;

// Configuration
pub mod config;

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
