use std::collections::HashSet;

use serde_json::Value;

use super::{CompletionSuggestion, InsertFormat, SuggestionKind};
use crate::document::scanner::{next_significant_token, TokenKind};
use crate::schema::{PrimitiveType, SchemaNode};

/// Trailing separator for text inserted at `offset`: nothing when the next
/// token already closes or separates the current element.
pub(crate) fn separator_after(text: &str, offset: usize) -> &'static str {
    match next_significant_token(text, offset) {
        TokenKind::Comma | TokenKind::CloseBrace | TokenKind::CloseBracket | TokenKind::Eof => "",
        _ => ",",
    }
}

/// Value inserted after a completed property key.
///
/// A literal the schema already offers (const, default, first enum member,
/// first example) is used as is; otherwise a typed placeholder with a cursor
/// stop.
pub(crate) fn value_template(schema: Option<&SchemaNode>) -> (String, InsertFormat) {
    let Some(schema) = schema else {
        return ("$1".to_string(), InsertFormat::Snippet);
    };
    let literal = schema
        .const_value
        .as_ref()
        .or(schema.default.as_ref())
        .or(schema.enum_values.as_ref().and_then(|values| values.first()))
        .or(schema.examples.first());
    if let Some(literal) = literal {
        return (literal.to_string(), InsertFormat::PlainText);
    }

    let first_type = schema.types.as_ref().and_then(|types| types.first().copied());
    let template = match first_type {
        Some(PrimitiveType::Object) => "{$1}",
        Some(PrimitiveType::Array) => "[$1]",
        Some(PrimitiveType::String | PrimitiveType::Molang) => "\"$1\"",
        Some(PrimitiveType::Number | PrimitiveType::Integer) => "${1:0}",
        Some(PrimitiveType::Boolean) => "${1:false}",
        Some(PrimitiveType::Null) => "${1:null}",
        None => "$1",
    };
    (template.to_string(), InsertFormat::Snippet)
}

/// Escape text so a snippet engine inserts it literally.
pub(crate) fn escape_snippet(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '$' | '}' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Plain text equivalent of a snippet: placeholders keep their default
/// text, bare tab stops vanish, escapes are resolved.
pub fn strip_placeholders(snippet: &str) -> String {
    let mut out = String::with_capacity(snippet.len());
    let mut chars = snippet.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '$' if chars.peek().is_some_and(char::is_ascii_digit) => {
                while chars.peek().is_some_and(char::is_ascii_digit) {
                    chars.next();
                }
            }
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                while chars.peek().is_some_and(char::is_ascii_digit) {
                    chars.next();
                }
                if chars.peek() == Some(&':') {
                    chars.next();
                }
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                    out.push(inner);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn documentation(schema: Option<&SchemaNode>) -> Option<String> {
    let schema = schema?;
    let mut text = schema.documentation().map(str::to_string);
    if schema.localized {
        let note = "Localization key: the text is looked up in the pack's language files.";
        text = Some(match text {
            Some(doc) => format!("{doc}\n\n{note}"),
            None => note.to_string(),
        });
    }
    if let Some(message) = schema.deprecated.as_ref().filter(|m| !m.is_empty()) {
        text = Some(match text {
            Some(doc) => format!("{doc}\n\n**Deprecated:** {message}"),
            None => format!("**Deprecated:** {message}"),
        });
    }
    text
}

/// A value suggestion inserting `value` verbatim.
pub(crate) fn literal_suggestion(
    value: &Value,
    kind: SuggestionKind,
    replace: (usize, usize),
    separator: &str,
    documentation: Option<String>,
) -> CompletionSuggestion {
    let literal = value.to_string();
    CompletionSuggestion {
        label: literal.clone(),
        kind,
        insert_text: format!("{literal}{separator}"),
        format: InsertFormat::PlainText,
        filter_text: literal,
        documentation,
        replace_range: replace,
        sort_text: None,
        deprecated: false,
    }
}

/// A property name suggestion, with a value template when the key stands
/// alone.
pub(crate) fn property_suggestion(
    name: &str,
    schema: Option<&SchemaNode>,
    replace: (usize, usize),
    add_value: bool,
    separator: &str,
    sort_text: String,
) -> CompletionSuggestion {
    let key = Value::String(name.to_string()).to_string();
    let (insert_text, format) = if add_value {
        let (template, format) = value_template(schema);
        let key = match format {
            InsertFormat::Snippet => escape_snippet(&key),
            InsertFormat::PlainText => key.clone(),
        };
        (format!("{key}: {template}{separator}"), format)
    } else {
        (key.clone(), InsertFormat::PlainText)
    };
    CompletionSuggestion {
        label: name.to_string(),
        kind: SuggestionKind::Property,
        insert_text,
        format,
        filter_text: key,
        documentation: documentation(schema),
        replace_range: replace,
        sort_text: Some(sort_text),
        deprecated: schema.is_some_and(|schema| schema.deprecated.is_some()),
    }
}

/// Suggestions of one request, deduplicated by label within a kind group.
#[derive(Debug, Default)]
pub(crate) struct SuggestionSet {
    items: Vec<CompletionSuggestion>,
    seen: HashSet<(bool, String)>,
}

impl SuggestionSet {
    pub(crate) fn push(&mut self, suggestion: CompletionSuggestion) -> bool {
        let key = (
            suggestion.kind == SuggestionKind::Property,
            suggestion.label.clone(),
        );
        if !self.seen.insert(key) {
            return false;
        }
        self.items.push(suggestion);
        true
    }

    pub(crate) fn contains_property(&self, name: &str) -> bool {
        self.seen.contains(&(true, name.to_string()))
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Suggestions in insertion order, each with a sort key preserving it.
    pub(crate) fn into_vec(self, limit: usize) -> Vec<CompletionSuggestion> {
        self.items
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(position, mut suggestion)| {
                if suggestion.sort_text.is_none() {
                    suggestion.sort_text = Some(format!("{position:05}"));
                }
                suggestion
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;

    fn node(value: Value) -> SchemaNode {
        Schema::compile(&value).as_node().cloned().unwrap()
    }

    #[test]
    fn test_separator_after() {
        assert_eq!(separator_after("{ }", 1), "");
        assert_eq!(separator_after("{ , \"b\": 1}", 1), "");
        assert_eq!(separator_after("{  \"b\": 1}", 1), ",");
        assert_eq!(separator_after("[1 /* c */ ]", 2), "");
        assert_eq!(separator_after("", 0), "");
    }

    #[test]
    fn test_value_template_prefers_literals() {
        assert_eq!(value_template(Some(&node(json!({"enum": ["a", "b"]})))).0, "\"a\"");
        assert_eq!(value_template(Some(&node(json!({"default": 4, "enum": [1]})))).0, "4");
        assert_eq!(value_template(Some(&node(json!({"examples": [true]})))).0, "true");
        assert_eq!(
            value_template(Some(&node(json!({"type": "object"})))),
            ("{$1}".to_string(), InsertFormat::Snippet)
        );
        assert_eq!(value_template(Some(&node(json!({"type": ["number", "string"]})))).0, "${1:0}");
        assert_eq!(value_template(None).0, "$1");
    }

    #[test]
    fn test_strip_placeholders() {
        assert_eq!(strip_placeholders("\"a\": ${1:0},"), "\"a\": 0,");
        assert_eq!(strip_placeholders("{$1}"), "{}");
        assert_eq!(strip_placeholders("\"\\$x\": \"$1\""), "\"$x\": \"\"");
    }

    #[test]
    fn test_escape_snippet() {
        assert_eq!(escape_snippet("a$b}c"), "a\\$b\\}c");
    }

    #[test]
    fn test_suggestion_set_dedupes_per_kind() {
        let mut set = SuggestionSet::default();
        let value = literal_suggestion(&json!("a"), SuggestionKind::Value, (0, 0), "", None);
        assert!(set.push(value.clone()));
        assert!(!set.push(value));
        assert!(set.push(property_suggestion("\"a\"", None, (0, 0), false, "", "0".into())));
        assert_eq!(set.len(), 2);
    }
}
