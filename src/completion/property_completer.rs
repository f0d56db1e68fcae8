//! Property Name Completer
//!
//! Suggests the keys an object may still take, when the cursor is inside an
//! object or on a key being typed.
//!
//! ## Ordering
//! - required properties, alphabetically
//! - optional properties, alphabetically
//! - names offered by `propertyNames` (enum, examples, dynamic sources)
//! - deprecated properties last
//!
//! Keys already present in the object, `doNotSuggest` properties and
//! properties behind experimental toggles the workspace has not enabled are
//! left out.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use super::location::{classify, CompletionTarget};
use super::navigate::schemas_at;
use super::util::{property_suggestion, separator_after, SuggestionSet};
use super::{Completer, CompletionSuggestion, Completions, Context, ExampleShape, PendingExamples};
use crate::schema::{Schema, SchemaNode};
use crate::validation::ValidationOptions;

pub struct PropertyCompleter<'a> {
    context: Context<'a>,
    schemas: Vec<&'a SchemaNode>,
    existing: HashSet<String>,
    replace: (usize, usize),
    add_value: bool,
    separator: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Required,
    Optional,
    Named,
    Deprecated,
}

impl Rank {
    fn sort_text(self, name: &str) -> String {
        format!("{}_{name}", self as u8)
    }
}

impl<'a> Completer<'a> for PropertyCompleter<'a> {
    fn construct(context: Context<'a>, offset: usize) -> Option<Self> {
        let CompletionTarget::PropertyName {
            object,
            current,
            replace,
            add_value,
        } = classify(context.document, offset)?
        else {
            return None;
        };
        let tree = context.document.tree()?;

        let existing = tree
            .properties(object)
            .filter(|(_, property)| Some(*property) != current)
            .map(|(key, _)| key.to_string())
            .collect();
        let schemas = schemas_at(
            context.schema,
            Some(tree),
            &tree.path_of(object),
            &ValidationOptions::from(context.settings),
        );
        let separator = if add_value {
            separator_after(context.document.text(), replace.1)
        } else {
            ""
        };

        Some(Self {
            context,
            schemas,
            existing,
            replace,
            add_value,
            separator,
        })
    }

    fn completions(&self) -> Completions {
        let mut declared: BTreeMap<&str, (Rank, Option<&SchemaNode>)> = BTreeMap::new();
        for schema in self.schemas.iter().copied() {
            for (name, property) in &schema.properties {
                if self.existing.contains(name) || property.is_false() {
                    continue;
                }
                let target = self.resolve(property);
                if target.is_some_and(|target| !self.suggestible(target)) {
                    continue;
                }
                let rank = if target.is_some_and(|target| target.deprecated.is_some()) {
                    Rank::Deprecated
                } else if self.schemas.iter().any(|s| s.required.contains(name)) {
                    Rank::Required
                } else {
                    Rank::Optional
                };
                declared
                    .entry(name.as_str())
                    .and_modify(|entry| {
                        if rank < entry.0 {
                            *entry = (rank, target);
                        }
                    })
                    .or_insert((rank, target));
            }
        }

        let mut ranked: Vec<(Rank, &str, Option<&SchemaNode>)> = declared
            .into_iter()
            .map(|(name, (rank, schema))| (rank, name, schema))
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(b.1)));

        let mut suggestions = SuggestionSet::default();
        for (rank, name, schema) in ranked {
            suggestions.push(property_suggestion(
                name,
                schema,
                self.replace,
                self.add_value,
                self.separator,
                rank.sort_text(name),
            ));
        }

        let mut pending = Vec::new();
        for (names, value_schema) in self.name_sources() {
            for value in names.enum_values.iter().flatten().chain(&names.examples) {
                let Value::String(name) = value else {
                    continue;
                };
                if self.existing.contains(name) || suggestions.contains_property(name) {
                    continue;
                }
                suggestions.push(property_suggestion(
                    name,
                    value_schema,
                    self.replace,
                    self.add_value,
                    self.separator,
                    Rank::Named.sort_text(name),
                ));
            }
            if !names.dynamic_examples_source.is_empty() {
                pending.push(PendingExamples {
                    keys: names.dynamic_examples_source.clone(),
                    shape: ExampleShape::PropertyName {
                        replace: self.replace,
                        add_value: self.add_value,
                        separator: self.separator.to_string(),
                        existing: self.existing.clone(),
                    },
                });
            }
        }

        Completions {
            suggestions,
            pending,
            fallback: vec![],
        }
    }
}

/// A key supplied by a dynamic example source, ranked with the other
/// `propertyNames` suggestions.
pub(super) fn named_suggestion(
    name: &str,
    replace: (usize, usize),
    add_value: bool,
    separator: &str,
) -> CompletionSuggestion {
    property_suggestion(
        name,
        None,
        replace,
        add_value,
        separator,
        Rank::Named.sort_text(name),
    )
}

impl<'a> PropertyCompleter<'a> {
    fn resolve(&self, schema: &'a Schema) -> Option<&'a SchemaNode> {
        self.context
            .schema
            .deref(schema, self.context.settings.max_depth)
            .and_then(Schema::as_node)
    }

    fn suggestible(&self, schema: &SchemaNode) -> bool {
        !schema.do_not_suggest
            && self
                .context
                .settings
                .experimental_enabled(&schema.experimental_options)
    }

    /// `propertyNames` schemas of objects that still accept extra keys,
    /// paired with the schema the extra keys' values follow.
    fn name_sources(&self) -> Vec<(&'a SchemaNode, Option<&'a SchemaNode>)> {
        self.schemas
            .iter()
            .copied()
            .filter(|schema| !schema.additional_properties.as_ref().is_some_and(Schema::is_false))
            .filter_map(|schema| {
                let names = self.resolve(schema.property_names.as_ref()?)?;
                let values = schema
                    .additional_properties
                    .as_ref()
                    .and_then(|extra| self.resolve(extra));
                Some((names, values))
            })
            .collect()
    }
}
