//! Validation engine: walks a parse tree against an effective schema.
//!
//! The walk is a pure recursive function over immutable inputs. All state a
//! [`Validator`] carries is bookkeeping for the cancellation check. Results
//! for container nodes go through the shared [`ResultCache`] when one is
//! attached.

mod branch;
mod keywords;
mod problem;

pub use branch::{resolve_branches, BranchMatch, MatchTier};
pub use problem::{ProblemCode, Severity, ValidationProblem};

use std::cell::Cell;
use std::hash::{DefaultHasher, Hash, Hasher};

use itertools::Itertools;
use rayon::prelude::*;
use tracing::debug;

use crate::cache::{CacheKey, ResultCache};
use crate::cancel::CancellationToken;
use crate::config::Settings;
use crate::document::scanner::{next_significant_token, TokenKind};
use crate::document::{pointer_string, Document, NodeId, NodeKind, ParsedNode, ParsedTree};
use crate::schema::{EffectiveSchema, Items, Schema, SchemaNode, SchemaRegistry};

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub max_depth: usize,
    pub check_interval: usize,
    pub experimental_options: Vec<String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl ValidationOptions {
    /// Hash of every option that changes validation output. Part of each
    /// result cache key, so a settings reload never replays stale problems.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.max_depth.hash(&mut hasher);
        self.experimental_options
            .iter()
            .sorted()
            .dedup()
            .for_each(|toggle| toggle.hash(&mut hasher));
        hasher.finish()
    }
}

impl From<&Settings> for ValidationOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            max_depth: settings.max_depth,
            check_interval: settings.cancellation_check_interval.max(1),
            experimental_options: settings.experimental_options.clone(),
        }
    }
}

pub struct Validator<'a> {
    tree: &'a ParsedTree,
    schema: &'a EffectiveSchema,
    options: &'a ValidationOptions,
    fingerprint: u64,
    cache: Option<&'a ResultCache>,
    cancel: Option<&'a CancellationToken>,
    visited: Cell<usize>,
    cancelled: Cell<bool>,
}

impl<'a> Validator<'a> {
    pub fn new(
        tree: &'a ParsedTree,
        schema: &'a EffectiveSchema,
        options: &'a ValidationOptions,
    ) -> Self {
        Self {
            tree,
            schema,
            options,
            fingerprint: options.fingerprint(),
            cache: None,
            cancel: None,
            visited: Cell::new(0),
            cancelled: Cell::new(false),
        }
    }

    pub fn with_cache(mut self, cache: &'a ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn tree(&self) -> &'a ParsedTree {
        self.tree
    }

    pub fn schema(&self) -> &'a EffectiveSchema {
        self.schema
    }

    pub fn options(&self) -> &'a ValidationOptions {
        self.options
    }

    /// True once a cancellation request was observed; the results gathered
    /// so far are incomplete.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Validate the whole tree against the schema root.
    pub fn validate(&self) -> Vec<ValidationProblem> {
        let problems = self.validate_node(self.tree.root(), self.schema.root(), 0);
        normalize(problems)
    }

    /// Validate one node against one schema position, without deduplication.
    pub fn validate_node(&self, node: NodeId, schema: &Schema, depth: usize) -> Vec<ValidationProblem> {
        let mut problems = Vec::new();
        self.check(node, schema, depth, &mut problems);
        problems
    }

    fn check(&self, id: NodeId, schema: &Schema, depth: usize, out: &mut Vec<ValidationProblem>) {
        if self.should_stop() {
            return;
        }
        let node = self.tree.node(id);
        if depth > self.options.max_depth {
            out.push(ValidationProblem::error(
                node.offset,
                node.end(),
                ProblemCode::MaxDepth,
                format!(
                    "Maximum validation depth of {} exceeded.",
                    self.options.max_depth
                ),
            ));
            return;
        }

        let schema_node = match schema {
            Schema::Bool(true) => return,
            Schema::Bool(false) => {
                let (start, end) = anchor(node);
                out.push(ValidationProblem::error(
                    start,
                    end,
                    ProblemCode::PropertyNotAllowed,
                    "Matches a schema that is not allowed.",
                ));
                return;
            }
            Schema::Node(schema_node) => schema_node,
        };

        if node.kind == NodeKind::Property {
            if let Some(value) = self.tree.property_value(id) {
                self.check(value, schema, depth, out);
            }
            return;
        }

        if let Some(reference) = &schema_node.reference {
            match self.schema.resolve_ref(reference) {
                Some(target) => self.check(id, target, depth + 1, out),
                None => debug!(reference = %reference, "unresolved $ref skipped"),
            }
            return;
        }

        let cache = self
            .cache
            .filter(|_| matches!(node.kind, NodeKind::Object | NodeKind::Array));
        let Some(cache) = cache else {
            self.check_schema_node(id, schema_node, depth, out);
            return;
        };

        let key = CacheKey::new(
            self.schema.id(),
            schema.address(),
            self.fingerprint,
            pointer_string(&self.tree.path_of(id)),
            self.tree.source_of(id),
            depth,
        );
        let base = node.offset as isize;
        if let Some(hit) = cache.get(&key) {
            out.extend(hit.iter().map(|problem| problem.shifted(base)));
            return;
        }

        let mut local = Vec::new();
        self.check_schema_node(id, schema_node, depth, &mut local);
        if !self.cancelled.get() {
            cache.insert(key, local.iter().map(|problem| problem.shifted(-base)).collect());
        }
        out.extend(local);
    }

    fn check_schema_node(
        &self,
        id: NodeId,
        schema: &SchemaNode,
        depth: usize,
        out: &mut Vec<ValidationProblem>,
    ) {
        let node = self.tree.node(id);

        if let Some(types) = &schema.types {
            if let Some(problem) = keywords::check_type(node, types) {
                out.push(problem);
            }
        }
        if let Some(branches) = &schema.one_of {
            self.check_one_of(id, branches, depth, out);
        }
        if let Some(branches) = &schema.any_of {
            self.check_any_of(id, branches, depth, out);
        }
        if let Some(values) = &schema.enum_values {
            out.extend(keywords::check_enum(self.tree, id, values));
        }
        if let Some(expected) = &schema.const_value {
            out.extend(keywords::check_const(self.tree, id, expected));
        }

        match node.kind {
            NodeKind::Object => self.check_object(id, schema, depth, out),
            NodeKind::Array => self.check_array(id, schema, depth, out),
            NodeKind::String => keywords::check_string(node, schema, out),
            NodeKind::Number => keywords::check_number(node, schema, out),
            _ => {}
        }
    }

    fn check_one_of(&self, id: NodeId, branches: &[Schema], depth: usize, out: &mut Vec<ValidationProblem>) {
        if branches.is_empty() {
            return;
        }
        let matched = resolve_branches(self, id, branches, depth + 1);
        let (start, end) = anchor(self.tree.node(id));
        match matched.tier {
            MatchTier::Strict if matched.candidates.len() == 1 => {
                out.extend(matched.problems[matched.best()].iter().cloned());
            }
            MatchTier::Strict => out.push(ValidationProblem::error(
                start,
                end,
                ProblemCode::MultipleBranchMatch,
                "Matches multiple schemas when only one must validate.",
            )),
            _ => out.push(no_branch_problem(start, end, &matched)),
        }
    }

    fn check_any_of(&self, id: NodeId, branches: &[Schema], depth: usize, out: &mut Vec<ValidationProblem>) {
        if branches.is_empty() {
            return;
        }
        let matched = resolve_branches(self, id, branches, depth + 1);
        if matched.tier == MatchTier::Strict {
            out.extend(matched.problems[matched.best()].iter().cloned());
        } else {
            let (start, end) = anchor(self.tree.node(id));
            out.push(no_branch_problem(start, end, &matched));
        }
    }

    fn check_object(&self, id: NodeId, schema: &SchemaNode, depth: usize, out: &mut Vec<ValidationProblem>) {
        let node = self.tree.node(id);
        let properties: Vec<(&str, NodeId)> = self.tree.properties(id).collect();

        let mut seen = std::collections::HashSet::new();
        for &(key, prop) in &properties {
            if !seen.insert(key) {
                let (start, end) = self.key_range(prop);
                out.push(ValidationProblem::warning(
                    start,
                    end,
                    ProblemCode::DuplicateKey,
                    format!("Duplicate object key \"{key}\"."),
                ));
            }
        }

        for name in &schema.required {
            if !seen.contains(name.as_str()) {
                out.push(ValidationProblem::error(
                    node.offset,
                    node.offset + 1,
                    ProblemCode::Required,
                    format!("Missing property \"{name}\"."),
                ));
            }
        }

        for &(key, prop) in &properties {
            let property_schema = match schema.properties.get(key) {
                Some(declared) => Some(declared),
                None => schema.additional_properties.as_ref(),
            };
            if let Some(property_schema) = property_schema {
                let (start, end) = self.key_range(prop);
                if property_schema.is_false() {
                    out.push(ValidationProblem::error(
                        start,
                        end,
                        ProblemCode::PropertyNotAllowed,
                        format!("Property {key} is not allowed."),
                    ));
                } else {
                    self.check_property_annotations(key, (start, end), property_schema, out);
                    if let Some(value) = self.tree.property_value(prop) {
                        self.check(value, property_schema, depth + 1, out);
                    }
                }
            }

            if let (Some(names), Some(key_node)) =
                (&schema.property_names, self.tree.property_key_node(prop))
            {
                self.check(key_node, names, depth + 1, out);
            }
        }

        let count = properties.len();
        if let Some(limit) = schema.max_properties.filter(|limit| count > *limit) {
            out.push(ValidationProblem::error(
                node.offset,
                node.offset + 1,
                ProblemCode::MaxProperties,
                format!("Object has more properties than limit of {limit}."),
            ));
        }
        if let Some(limit) = schema.min_properties.filter(|limit| count < *limit) {
            out.push(ValidationProblem::error(
                node.offset,
                node.offset + 1,
                ProblemCode::MinProperties,
                format!("Object has fewer properties than the required number of {limit}."),
            ));
        }
    }

    /// Deprecation and experimental-toggle warnings, reported on the key.
    fn check_property_annotations(
        &self,
        key: &str,
        (start, end): (usize, usize),
        schema: &Schema,
        out: &mut Vec<ValidationProblem>,
    ) {
        let Some(target) = self
            .schema
            .deref(schema, self.options.max_depth)
            .and_then(Schema::as_node)
        else {
            return;
        };
        if let Some(message) = &target.deprecated {
            let message = if message.is_empty() {
                format!("Property {key} is deprecated.")
            } else {
                message.clone()
            };
            out.push(ValidationProblem::warning(start, end, ProblemCode::Deprecated, message));
        }
        let missing: Vec<&str> = target
            .experimental_options
            .iter()
            .filter(|toggle| !self.options.experimental_options.contains(toggle))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            out.push(ValidationProblem::warning(
                start,
                end,
                ProblemCode::Experimental,
                format!(
                    "Property {key} requires the experimental option {}.",
                    missing.join(", ")
                ),
            ));
        }
    }

    fn check_array(&self, id: NodeId, schema: &SchemaNode, depth: usize, out: &mut Vec<ValidationProblem>) {
        let node = self.tree.node(id);
        let elements = self.tree.children(id);
        match &schema.items {
            Some(Items::Single(item)) => {
                for &element in elements {
                    self.check(element, item, depth + 1, out);
                }
            }
            Some(Items::Tuple(positional)) => {
                for (index, &element) in elements.iter().enumerate() {
                    match (positional.get(index), &schema.additional_items) {
                        (Some(item), _) => self.check(element, item, depth + 1, out),
                        (None, Some(Schema::Bool(false))) => {
                            out.push(ValidationProblem::error(
                                node.offset,
                                node.offset + 1,
                                ProblemCode::AdditionalItems,
                                format!(
                                    "Array has too many items according to schema. Expected {} or fewer.",
                                    positional.len()
                                ),
                            ));
                            break;
                        }
                        (None, Some(extra)) => self.check(element, extra, depth + 1, out),
                        (None, None) => {}
                    }
                }
            }
            None => {}
        }

        let count = elements.len();
        if let Some(limit) = schema.min_items.filter(|limit| count < *limit) {
            out.push(ValidationProblem::error(
                node.offset,
                node.offset + 1,
                ProblemCode::MinItems,
                format!("Array has too few items. Expected {limit} or more."),
            ));
        }
        if let Some(limit) = schema.max_items.filter(|limit| count > *limit) {
            out.push(ValidationProblem::error(
                node.offset,
                node.offset + 1,
                ProblemCode::MaxItems,
                format!("Array has too many items. Expected {limit} or fewer."),
            ));
        }
    }

    fn key_range(&self, property: NodeId) -> (usize, usize) {
        let key = self
            .tree
            .property_key_node(property)
            .map(|key| self.tree.node(key))
            .unwrap_or_else(|| self.tree.node(property));
        (key.offset, key.end())
    }

    fn should_stop(&self) -> bool {
        if self.cancelled.get() {
            return true;
        }
        let Some(token) = self.cancel else {
            return false;
        };
        let visited = self.visited.get() + 1;
        self.visited.set(visited);
        if visited % self.options.check_interval.max(1) == 0 && token.is_cancelled() {
            debug!(visited, "validation cancelled");
            self.cancelled.set(true);
        }
        self.cancelled.get()
    }
}

/// Location used for problems about a node as a whole: the opening bracket
/// of a container, the full extent of a scalar.
fn anchor(node: &ParsedNode) -> (usize, usize) {
    match node.kind {
        NodeKind::Object | NodeKind::Array => (node.offset, node.offset + 1),
        _ => (node.offset, node.end()),
    }
}

fn no_branch_problem(start: usize, end: usize, matched: &BranchMatch) -> ValidationProblem {
    let hint = (matched.tier == MatchTier::Typed)
        .then(|| {
            matched.problems[matched.best()]
                .iter()
                .find(|problem| problem.is_error())
        })
        .flatten();
    let message = match hint {
        Some(closest) => format!(
            "Value does not match any of the allowed schemas. Closest match: {}",
            closest.message
        ),
        None => "Value does not match any of the allowed schemas.".to_string(),
    };
    ValidationProblem::error(start, end, ProblemCode::NoBranchMatch, message)
}

/// Drop repeated problems, keep a single depth-limit problem, and order by
/// position.
fn normalize(problems: Vec<ValidationProblem>) -> Vec<ValidationProblem> {
    let mut depth_reported = false;
    problems
        .into_iter()
        .unique()
        .filter(|problem| {
            if problem.code != Some(ProblemCode::MaxDepth) {
                return true;
            }
            !std::mem::replace(&mut depth_reported, true)
        })
        .sorted_by_key(|problem| (problem.start, problem.end))
        .collect()
}

/// Problems reported by the parser, or a single problem when the text
/// holds no value but is not blank either.
pub fn syntax_problems(document: &Document) -> Vec<ValidationProblem> {
    let Some(tree) = document.tree() else {
        if next_significant_token(document.text(), 0) == TokenKind::Eof {
            return vec![];
        }
        return vec![ValidationProblem::error(
            0,
            document.text().len().min(1),
            ProblemCode::Syntax,
            "Expected a JSON object, array or literal.",
        )];
    };
    tree.syntax_errors()
        .iter()
        .map(|err| {
            ValidationProblem::error(
                err.offset,
                err.offset + err.length,
                ProblemCode::Syntax,
                err.message.clone(),
            )
        })
        .collect()
}

/// Syntax errors plus schema problems for one document.
pub fn validate_document(
    document: &Document,
    schema: &EffectiveSchema,
    options: &ValidationOptions,
    cache: Option<&ResultCache>,
    cancel: Option<&CancellationToken>,
) -> Vec<ValidationProblem> {
    let mut problems = syntax_problems(document);
    let Some(tree) = document.tree() else {
        return problems;
    };

    let mut validator = Validator::new(tree, schema, options);
    if let Some(cache) = cache {
        validator = validator.with_cache(cache);
    }
    if let Some(token) = cancel {
        validator = validator.with_cancellation(token);
    }
    problems.extend(validator.validate());
    problems.sort_by_key(|problem| (problem.start, problem.end));
    problems
}

/// Validate many documents in parallel, each against the schema its path
/// maps to. Documents without a path or a matching schema get only their
/// syntax problems. The output is aligned with the input.
pub fn validate_documents(
    registry: &SchemaRegistry,
    documents: &[Document],
    options: &ValidationOptions,
    cache: &ResultCache,
) -> Vec<Vec<ValidationProblem>> {
    documents
        .par_iter()
        .map(|document| {
            let schema = document
                .path()
                .and_then(|path| registry.effective_for_document(path, document.text()));
            match schema {
                Some(schema) => validate_document(document, &schema, options, Some(cache), None),
                None => syntax_problems(document),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn run(schema: Value, text: &str) -> Vec<ValidationProblem> {
        let document = Document::new(text);
        let schema = EffectiveSchema::compile(schema);
        validate_document(&document, &schema, &ValidationOptions::default(), None, None)
    }

    fn messages(problems: &[ValidationProblem]) -> Vec<&str> {
        problems.iter().map(|p| p.message.as_str()).collect()
    }

    // ========================================================================
    // Types and literals
    // ========================================================================

    #[test]
    fn test_type_mismatch() {
        let problems = run(json!({"type": "string"}), "12");
        assert_eq!(messages(&problems), vec!["Incorrect type. Expected \"string\"."]);
        assert_eq!((problems[0].start, problems[0].end), (0, 2));
    }

    #[test]
    fn test_molang_accepts_strings_numbers_and_booleans() {
        for text in ["\"q.is_baby\"", "1.5", "true"] {
            assert!(run(json!({"type": "molang"}), text).is_empty(), "{text} is molang");
        }
        assert_eq!(run(json!({"type": "molang"}), "{}").len(), 1);
    }

    #[test]
    fn test_integer_subtype() {
        let problems = run(json!({"type": "integer"}), "1.5");
        assert_eq!(problems[0].code, Some(ProblemCode::Integer));
        assert!(run(json!({"type": "integer"}), "3").is_empty());
    }

    #[test]
    fn test_enum_lists_allowed_values() {
        let problems = run(json!({"enum": ["a", 1]}), "\"c\"");
        assert_eq!(messages(&problems), vec!["Value is not accepted. Valid values: \"a\", 1."]);
        assert!(run(json!({"enum": ["a", 1]}), "1.0").is_empty());
    }

    #[test]
    fn test_const() {
        assert_eq!(run(json!({"const": "x"}), "\"y\"").len(), 1);
        assert!(run(json!({"const": {"a": [1]}}), "{\"a\": [1]}").is_empty());
    }

    // ========================================================================
    // Objects
    // ========================================================================

    #[test]
    fn test_missing_required_is_anchored_on_object() {
        let problems = run(
            json!({"type": "object", "required": ["id"], "properties": {"id": {"type": "string"}}}),
            "{}",
        );
        assert_eq!(messages(&problems), vec!["Missing property \"id\"."]);
        assert_eq!((problems[0].start, problems[0].end), (0, 1));
    }

    #[test]
    fn test_false_property_reported_on_key() {
        let problems = run(json!({"properties": {"old": false}}), "{\"old\": 1}");
        assert_eq!(messages(&problems), vec!["Property old is not allowed."]);
        assert_eq!((problems[0].start, problems[0].end), (1, 6));
    }

    #[test]
    fn test_additional_properties_schema_is_applied() {
        let problems = run(
            json!({"properties": {"a": {}}, "additionalProperties": {"type": "number"}}),
            "{\"a\": \"x\", \"b\": \"y\"}",
        );
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].code, Some(ProblemCode::Type));
    }

    #[test]
    fn test_property_names() {
        let problems = run(
            json!({"propertyNames": {"pattern": "^minecraft:"}}),
            "{\"minecraft:health\": 1, \"health\": 2}",
        );
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].code, Some(ProblemCode::Pattern));
    }

    #[test]
    fn test_property_count_limits() {
        let schema = json!({"minProperties": 2, "maxProperties": 3});
        assert_eq!(run(schema.clone(), "{\"a\": 1}")[0].code, Some(ProblemCode::MinProperties));
        assert!(run(schema, "{\"a\": 1, \"b\": 2}").is_empty());
    }

    #[test]
    fn test_duplicate_keys_warn() {
        let problems = run(json!({}), "{\"a\": 1, \"a\": 2}");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].severity, Severity::Warning);
    }

    #[test]
    fn test_deprecated_and_experimental_properties_warn() {
        let schema = json!({"properties": {
            "old": {"x-deprecated": "Use new instead."},
            "beta": {"x-experimental-options": ["upcoming_creator_features"]}
        }});
        let problems = run(schema, "{\"old\": 1, \"beta\": 2}");
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.severity == Severity::Warning));
        assert_eq!(problems[0].message, "Use new instead.");
        assert_eq!(problems[1].code, Some(ProblemCode::Experimental));
    }

    #[test]
    fn test_enabled_experimental_option_is_silent() {
        let document = Document::new("{\"beta\": 2}");
        let schema = EffectiveSchema::compile(json!({"properties": {
            "beta": {"x-experimental-options": ["upcoming_creator_features"]}
        }}));
        let options = ValidationOptions {
            experimental_options: vec!["upcoming_creator_features".to_string()],
            ..Default::default()
        };
        assert!(validate_document(&document, &schema, &options, None, None).is_empty());
    }

    #[test]
    fn test_shared_cache_follows_experimental_toggles() {
        let document = Document::new("{\"beta\": 1}");
        let schema = EffectiveSchema::compile(json!({"properties": {
            "beta": {"x-experimental-options": ["upcoming"]}
        }}));
        let cache = ResultCache::new(16, std::time::Duration::from_secs(60));
        let off = ValidationOptions::default();
        let on = ValidationOptions {
            experimental_options: vec!["upcoming".to_string()],
            ..Default::default()
        };

        let warned = validate_document(&document, &schema, &off, Some(&cache), None);
        assert_eq!(warned.len(), 1);
        assert_eq!(warned[0].code, Some(ProblemCode::Experimental));
        assert!(validate_document(&document, &schema, &on, Some(&cache), None).is_empty());
        // the first result is still served for the original options
        assert_eq!(
            validate_document(&document, &schema, &off, Some(&cache), None),
            warned
        );
    }

    #[test]
    fn test_fingerprint_ignores_toggle_order() {
        let a = ValidationOptions {
            experimental_options: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        let b = ValidationOptions {
            experimental_options: vec!["b".to_string(), "a".to_string()],
            ..Default::default()
        };
        let deeper = ValidationOptions {
            max_depth: a.max_depth + 1,
            ..a.clone()
        };
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), deeper.fingerprint());
    }

    // ========================================================================
    // Arrays, strings, numbers
    // ========================================================================

    #[test]
    fn test_tuple_items_with_additional_items() {
        let schema = json!({"items": [{"type": "string"}, {"type": "number"}], "additionalItems": false});
        assert!(run(schema.clone(), "[\"a\", 1]").is_empty());
        assert_eq!(run(schema.clone(), "[1, 1]")[0].code, Some(ProblemCode::Type));
        assert_eq!(
            run(schema, "[\"a\", 1, 2, 3]")
                .iter()
                .filter(|p| p.code == Some(ProblemCode::AdditionalItems))
                .count(),
            1
        );
    }

    #[test]
    fn test_item_count_limits() {
        let schema = json!({"minItems": 1, "maxItems": 2});
        assert_eq!(run(schema.clone(), "[]")[0].code, Some(ProblemCode::MinItems));
        assert_eq!(run(schema, "[1, 2, 3]")[0].code, Some(ProblemCode::MaxItems));
    }

    #[test]
    fn test_string_length_counts_code_points() {
        assert!(run(json!({"maxLength": 1}), r#""\ud83d\ude00""#).is_empty());
        assert!(run(json!({"maxLength": 1}), "\"😀\"").is_empty());
        assert_eq!(run(json!({"minLength": 2}), "\"😀\"").len(), 1);
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        assert!(run(json!({"pattern": "(unclosed"}), "\"anything\"").is_empty());
    }

    #[test]
    fn test_number_bounds() {
        assert_eq!(run(json!({"minimum": 1}), "0")[0].code, Some(ProblemCode::Minimum));
        assert!(run(json!({"minimum": 1}), "1").is_empty());
        assert_eq!(
            run(json!({"minimum": 1, "exclusiveMinimum": true}), "1")[0].code,
            Some(ProblemCode::ExclusiveMinimum)
        );
        assert_eq!(
            run(json!({"exclusiveMaximum": 10}), "10")[0].code,
            Some(ProblemCode::ExclusiveMaximum)
        );
        assert!(run(json!({"maximum": 10, "exclusiveMaximum": false}), "10").is_empty());
    }

    #[test]
    fn test_fractional_multiple_of() {
        assert!(run(json!({"multipleOf": 0.1}), "0.3").is_empty());
        assert!(run(json!({"multipleOf": 0.01}), "19.99").is_empty());
        assert_eq!(run(json!({"multipleOf": 0.1}), "0.35").len(), 1);
        assert_eq!(run(json!({"multipleOf": 2}), "3").len(), 1);
    }

    // ========================================================================
    // References, branches, limits
    // ========================================================================

    #[test]
    fn test_ref_is_followed() {
        let schema = json!({
            "definitions": {"id": {"type": "string"}},
            "properties": {"id": {"$ref": "#/definitions/id"}}
        });
        assert_eq!(run(schema, "{\"id\": 3}").len(), 1);
    }

    #[test]
    fn test_unresolved_ref_is_skipped() {
        assert!(run(json!({"$ref": "#/definitions/missing"}), "3").is_empty());
    }

    #[test]
    fn test_cyclic_ref_reports_max_depth_once() {
        let schema = json!({"definitions": {"loop": {"$ref": "#/definitions/loop"}}, "$ref": "#/definitions/loop"});
        let problems = run(schema, "{}");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].code, Some(ProblemCode::MaxDepth));
    }

    #[test]
    fn test_one_of_with_no_match_is_one_problem() {
        let problems = run(json!({"oneOf": [{"type": "string"}, {"type": "number"}]}), "true");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].code, Some(ProblemCode::NoBranchMatch));
    }

    #[test]
    fn test_one_of_with_two_matches() {
        let problems = run(json!({"oneOf": [{"type": "number"}, {"minimum": 0}]}), "5");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].code, Some(ProblemCode::MultipleBranchMatch));
    }

    #[test]
    fn test_one_of_closest_branch_hint() {
        let schema = json!({"oneOf": [
            {"type": "object", "required": ["a"]},
            {"type": "string"}
        ]});
        let problems = run(schema, "{}");
        assert_eq!(problems.len(), 1);
        assert!(problems[0].message.ends_with("Missing property \"a\"."), "{}", problems[0].message);
    }

    #[test]
    fn test_any_of() {
        let schema = json!({"anyOf": [{"type": "number"}, {"minimum": 0}]});
        assert!(run(schema.clone(), "5").is_empty());
        assert_eq!(run(json!({"anyOf": [{"type": "number"}]}), "\"x\"").len(), 1);
    }

    #[test]
    fn test_false_root_schema() {
        assert_eq!(run(json!(false), "1").len(), 1);
        assert!(run(json!(true), "1").is_empty());
    }

    #[test]
    fn test_syntax_errors_are_included() {
        let problems = run(json!({}), "{\"a\": 1,}");
        assert_eq!(problems[0].code, Some(ProblemCode::Syntax));
    }

    #[test]
    fn test_empty_document_has_no_problems() {
        assert!(run(json!({"type": "object"}), "  // nothing yet\n").is_empty());
    }

    #[test]
    fn test_cache_hit_is_rebased() {
        let schema = EffectiveSchema::compile(json!({
            "items": {"type": "object", "required": ["id"]}
        }));
        let cache = ResultCache::new(16, std::time::Duration::from_secs(60));
        let options = ValidationOptions::default();

        let first = Document::new("[{}, {}]");
        let problems = validate_document(&first, &schema, &options, Some(&cache), None);
        assert_eq!(problems.len(), 2);
        assert!(!cache.is_empty());

        let shifted = Document::new("[  {}, {}]");
        let again = validate_document(&shifted, &schema, &options, Some(&cache), None);
        assert_eq!(again.len(), 2);
        assert_eq!(again[0].start, 3);
    }

    #[test]
    fn test_cancelled_validation_stops_early() {
        let schema = EffectiveSchema::compile(json!({"items": {"type": "string"}}));
        let document = Document::new("[1, 2, 3, 4, 5, 6, 7, 8]");
        let options = ValidationOptions {
            check_interval: 1,
            ..Default::default()
        };
        let token = CancellationToken::new();
        token.cancel();
        let tree = document.tree().unwrap();
        let validator = Validator::new(tree, &schema, &options).with_cancellation(&token);
        assert!(validator.validate().is_empty());
        assert!(validator.is_cancelled());
    }
}
