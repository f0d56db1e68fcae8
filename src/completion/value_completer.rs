//! Value Completer
//!
//! Suggests values for the schema reachable at the cursor: after a colon, in
//! an array slot, on an existing scalar, or at the root of an empty
//! document.

use serde_json::{json, Value};

use super::location::{classify, CompletionTarget};
use super::navigate::schemas_at;
use super::util::{documentation, literal_suggestion, separator_after, SuggestionSet};
use super::{
    Completer, CompletionSuggestion, Completions, Context, ExampleShape, InsertFormat,
    PendingExamples, SuggestionKind,
};
use crate::schema::{PrimitiveType, Schema, SchemaNode};
use crate::validation::ValidationOptions;

pub struct ValueCompleter<'a> {
    context: Context<'a>,
    schemas: Vec<&'a SchemaNode>,
    replace: (usize, usize),
    separator: &'static str,
}

impl<'a> Completer<'a> for ValueCompleter<'a> {
    fn construct(context: Context<'a>, offset: usize) -> Option<Self> {
        let CompletionTarget::Value { path, replace, .. } = classify(context.document, offset)? else {
            return None;
        };
        let schemas = schemas_at(
            context.schema,
            context.document.tree(),
            &path,
            &ValidationOptions::from(context.settings),
        );
        let separator = if path.is_empty() {
            ""
        } else {
            separator_after(context.document.text(), replace.1)
        };
        Some(Self {
            context,
            schemas,
            replace,
            separator,
        })
    }

    fn completions(&self) -> Completions {
        let mut suggestions = SuggestionSet::default();
        let mut keys = Vec::new();
        let mut fallback = Vec::new();
        for schema in self.schemas.iter().copied() {
            self.add_schema_values(schema, 0, &mut suggestions, &mut keys, &mut fallback);
        }

        let pending = if keys.is_empty() {
            vec![]
        } else {
            vec![PendingExamples {
                keys,
                shape: ExampleShape::Value {
                    replace: self.replace,
                    separator: self.separator.to_string(),
                },
            }]
        };
        Completions {
            suggestions,
            pending,
            fallback,
        }
    }
}

impl<'a> ValueCompleter<'a> {
    fn add_schema_values(
        &self,
        schema: &'a SchemaNode,
        depth: usize,
        out: &mut SuggestionSet,
        keys: &mut Vec<String>,
        fallback: &mut Vec<CompletionSuggestion>,
    ) {
        if depth > self.context.settings.max_depth {
            return;
        }
        let docs = documentation(Some(schema));

        if let Some(default) = &schema.default {
            let default_docs = match &docs {
                Some(doc) => format!("Default value\n\n{doc}"),
                None => "Default value".to_string(),
            };
            out.push(self.literal(default, SuggestionKind::Value, Some(default_docs)));
        }

        for branch in schema.one_of.iter().chain(&schema.any_of).flatten() {
            if let Some(branch) = self.resolve(branch) {
                self.add_schema_values(branch, depth + 1, out, keys, fallback);
            }
        }

        for value in schema.enum_values.iter().flatten() {
            out.push(self.literal(value, SuggestionKind::Enum, docs.clone()));
        }
        if let Some(value) = &schema.const_value {
            out.push(self.literal(value, SuggestionKind::Value, docs.clone()));
        }
        for value in &schema.examples {
            out.push(self.literal(value, SuggestionKind::Value, docs.clone()));
        }
        for key in &schema.dynamic_examples_source {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }

        if schema.enum_values.is_none() {
            for ty in schema.types.iter().flatten() {
                fallback.extend(self.type_snippets(*ty, &docs));
            }
        }
    }

    fn resolve(&self, schema: &'a Schema) -> Option<&'a SchemaNode> {
        self.context
            .schema
            .deref(schema, self.context.settings.max_depth)
            .and_then(Schema::as_node)
    }

    fn literal(&self, value: &Value, kind: SuggestionKind, docs: Option<String>) -> CompletionSuggestion {
        literal_suggestion(value, kind, self.replace, self.separator, docs)
    }

    /// One generic, type-shaped suggestion; booleans offer both literals.
    fn type_snippets(&self, ty: PrimitiveType, docs: &Option<String>) -> Vec<CompletionSuggestion> {
        let snippet = |label: &str, body: &str| CompletionSuggestion {
            label: label.to_string(),
            kind: SuggestionKind::Snippet,
            insert_text: format!("{body}{}", self.separator),
            format: InsertFormat::Snippet,
            filter_text: label.to_string(),
            documentation: docs.clone(),
            replace_range: self.replace,
            sort_text: None,
            deprecated: false,
        };
        match ty {
            PrimitiveType::Object => vec![snippet("{}", "{$1}")],
            PrimitiveType::Array => vec![snippet("[]", "[$1]")],
            PrimitiveType::String => vec![snippet("\"\"", "\"$1\"")],
            PrimitiveType::Boolean => vec![
                self.literal(&json!(true), SuggestionKind::Value, docs.clone()),
                self.literal(&json!(false), SuggestionKind::Value, docs.clone()),
            ],
            PrimitiveType::Null => vec![self.literal(&Value::Null, SuggestionKind::Value, docs.clone())],
            PrimitiveType::Number | PrimitiveType::Integer | PrimitiveType::Molang => vec![],
        }
    }
}
