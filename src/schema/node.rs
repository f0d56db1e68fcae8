//! Typed schema nodes compiled from raw JSON.
//!
//! Compilation is lenient: a keyword with a value of the wrong shape is
//! dropped (and logged) instead of failing the whole schema, and an invalid
//! `pattern` compiles to "no pattern constraint".

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
    /// Molang expressions may be written as strings, numbers or booleans.
    Molang,
}

impl PrimitiveType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "string" => PrimitiveType::String,
            "number" => PrimitiveType::Number,
            "integer" => PrimitiveType::Integer,
            "boolean" => PrimitiveType::Boolean,
            "object" => PrimitiveType::Object,
            "array" => PrimitiveType::Array,
            "null" => PrimitiveType::Null,
            "molang" => PrimitiveType::Molang,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Object => "object",
            PrimitiveType::Array => "array",
            PrimitiveType::Null => "null",
            PrimitiveType::Molang => "molang",
        }
    }
}

/// A schema position: boolean schemas accept or reject everything.
#[derive(Debug, Clone)]
pub enum Schema {
    Bool(bool),
    Node(Box<SchemaNode>),
}

impl Schema {
    pub fn compile(value: &Value) -> Schema {
        match value {
            Value::Bool(b) => Schema::Bool(*b),
            Value::Object(map) => Schema::Node(Box::new(SchemaNode::compile(map))),
            other => {
                warn!(schema = %other, "schema is neither an object nor a boolean; accepting anything");
                Schema::Bool(true)
            }
        }
    }

    pub fn as_node(&self) -> Option<&SchemaNode> {
        match self {
            Schema::Node(node) => Some(node),
            Schema::Bool(_) => None,
        }
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Schema::Bool(false))
    }

    /// Stable identity of this schema position within its effective schema.
    pub fn address(&self) -> usize {
        match self {
            Schema::Node(node) => &**node as *const SchemaNode as usize,
            Schema::Bool(b) => *b as usize,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Items {
    Single(Schema),
    Tuple(Vec<Schema>),
}

/// `exclusiveMinimum`/`exclusiveMaximum` in either draft-4 (boolean modifier)
/// or draft-6 (numeric limit) form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExclusiveBound {
    Flag(bool),
    Limit(f64),
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    pub regex: Regex,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    pub types: Option<Vec<PrimitiveType>>,
    pub properties: BTreeMap<String, Schema>,
    pub required: Vec<String>,
    pub items: Option<Items>,
    pub additional_items: Option<Schema>,
    pub additional_properties: Option<Schema>,
    pub property_names: Option<Schema>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    pub pattern: Option<Pattern>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<ExclusiveBound>,
    pub exclusive_maximum: Option<ExclusiveBound>,
    pub multiple_of: Option<f64>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    pub one_of: Option<Vec<Schema>>,
    pub any_of: Option<Vec<Schema>>,
    pub reference: Option<String>,
    pub default: Option<Value>,
    pub examples: Vec<Value>,
    pub dynamic_examples_source: Vec<String>,
    pub experimental_options: Vec<String>,
    /// `Some("")` for a bare `true`.
    pub deprecated: Option<String>,
    pub localized: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub markdown_description: Option<String>,
    pub do_not_suggest: bool,
}

impl SchemaNode {
    pub fn compile(map: &Map<String, Value>) -> SchemaNode {
        let mut node = SchemaNode {
            types: map.get("type").and_then(compile_types),
            required: string_list(map.get("required")),
            enum_values: map.get("enum").and_then(Value::as_array).cloned(),
            const_value: map.get("const").cloned(),
            pattern: map.get("pattern").and_then(Value::as_str).and_then(compile_pattern),
            min_length: count(map, "minLength"),
            max_length: count(map, "maxLength"),
            minimum: map.get("minimum").and_then(Value::as_f64),
            maximum: map.get("maximum").and_then(Value::as_f64),
            exclusive_minimum: map.get("exclusiveMinimum").and_then(exclusive_bound),
            exclusive_maximum: map.get("exclusiveMaximum").and_then(exclusive_bound),
            multiple_of: map
                .get("multipleOf")
                .and_then(Value::as_f64)
                .filter(|d| *d > 0.0),
            min_items: count(map, "minItems"),
            max_items: count(map, "maxItems"),
            min_properties: count(map, "minProperties"),
            max_properties: count(map, "maxProperties"),
            reference: map.get("$ref").and_then(Value::as_str).map(str::to_string),
            default: map.get("default").cloned(),
            examples: match map.get("examples") {
                Some(Value::Array(values)) => values.clone(),
                Some(single) => vec![single.clone()],
                None => vec![],
            },
            dynamic_examples_source: string_list(map.get("x-dynamic-examples-source")),
            experimental_options: string_list(map.get("x-experimental-options")),
            deprecated: deprecation(map),
            localized: map
                .get("x-localized")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            title: text(map, "title"),
            description: text(map, "description"),
            markdown_description: text(map, "markdownDescription"),
            do_not_suggest: map
                .get("doNotSuggest")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            ..Default::default()
        };

        if let Some(Value::Object(props)) = map.get("properties") {
            node.properties = props
                .iter()
                .map(|(name, schema)| (name.clone(), Schema::compile(schema)))
                .collect();
        }

        node.items = match map.get("items") {
            Some(Value::Array(list)) => Some(Items::Tuple(list.iter().map(Schema::compile).collect())),
            Some(single @ (Value::Object(_) | Value::Bool(_))) => {
                Some(Items::Single(Schema::compile(single)))
            }
            _ => None,
        };
        node.additional_items = sub_schema(map, "additionalItems");
        node.additional_properties = sub_schema(map, "additionalProperties");
        node.property_names = sub_schema(map, "propertyNames");
        node.one_of = schema_list(map, "oneOf");
        node.any_of = schema_list(map, "anyOf");
        node
    }

    /// Human-facing text for hovers and completion documentation.
    pub fn documentation(&self) -> Option<&str> {
        self.markdown_description
            .as_deref()
            .or(self.description.as_deref())
            .or(self.title.as_deref())
    }

    pub fn allows_type(&self, ty: PrimitiveType) -> bool {
        self.types.as_ref().is_some_and(|types| types.contains(&ty))
    }
}

fn compile_types(value: &Value) -> Option<Vec<PrimitiveType>> {
    let names: Vec<&str> = match value {
        Value::String(name) => vec![name.as_str()],
        Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
        _ => return None,
    };
    let types: Vec<PrimitiveType> = names
        .into_iter()
        .filter_map(|name| {
            let parsed = PrimitiveType::parse(name);
            if parsed.is_none() {
                warn!(schema_type = name, "unknown schema type ignored");
            }
            parsed
        })
        .collect();
    (!types.is_empty()).then_some(types)
}

fn compile_pattern(source: &str) -> Option<Pattern> {
    match Regex::new(source) {
        Ok(regex) => Some(Pattern {
            source: source.to_string(),
            regex,
        }),
        Err(err) => {
            warn!(pattern = source, error = %err, "invalid schema pattern skipped");
            None
        }
    }
}

fn exclusive_bound(value: &Value) -> Option<ExclusiveBound> {
    match value {
        Value::Bool(flag) => Some(ExclusiveBound::Flag(*flag)),
        other => other.as_f64().map(ExclusiveBound::Limit),
    }
}

fn deprecation(map: &Map<String, Value>) -> Option<String> {
    match map.get("x-deprecated") {
        Some(Value::Bool(true)) => Some(text(map, "deprecationMessage").unwrap_or_default()),
        Some(Value::String(message)) => Some(message.clone()),
        _ => text(map, "deprecationMessage"),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => vec![],
    }
}

fn count(map: &Map<String, Value>, key: &str) -> Option<usize> {
    map.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn sub_schema(map: &Map<String, Value>, key: &str) -> Option<Schema> {
    match map.get(key) {
        Some(value @ (Value::Object(_) | Value::Bool(_))) => Some(Schema::compile(value)),
        _ => None,
    }
}

fn schema_list(map: &Map<String, Value>, key: &str) -> Option<Vec<Schema>> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|list| list.iter().map(Schema::compile).collect())
}
