use std::collections::HashSet;

use serde_json::Value;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionItemTag, CompletionList, CompletionParams,
    CompletionResponse, CompletionTextEdit, Documentation, InsertTextFormat, MarkupContent,
    MarkupKind, TextEdit,
};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::config::Settings;
use crate::document::Document;
use crate::dynamic_examples::{fetch_all, DynamicExampleProvider, ExampleContext};
use crate::schema::EffectiveSchema;

use self::property_completer::PropertyCompleter;
use self::util::{literal_suggestion, SuggestionSet};
use self::value_completer::ValueCompleter;

pub use self::util::strip_placeholders;

mod location;
mod navigate;
mod property_completer;
mod util;
mod value_completer;

#[derive(Clone, Copy)]
pub struct Context<'a> {
    document: &'a Document,
    schema: &'a EffectiveSchema,
    settings: &'a Settings,
}

impl<'a> Context<'a> {
    pub fn new(document: &'a Document, schema: &'a EffectiveSchema, settings: &'a Settings) -> Self {
        Self {
            document,
            schema,
            settings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
    Property,
    Value,
    Snippet,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertFormat {
    PlainText,
    /// `$1`, `${1:default}` cursor stops.
    Snippet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSuggestion {
    pub label: String,
    pub kind: SuggestionKind,
    pub insert_text: String,
    pub format: InsertFormat,
    pub filter_text: String,
    pub documentation: Option<String>,
    /// Byte range the insert text replaces.
    pub replace_range: (usize, usize),
    pub sort_text: Option<String>,
    pub deprecated: bool,
}

pub trait Completer<'a>: Sized {
    /// `None` when the cursor is not a location this completer handles.
    fn construct(context: Context<'a>, offset: usize) -> Option<Self>;

    fn completions(&self) -> Completions;
}

/// Output of the synchronous pass: ready suggestions, the dynamic example
/// keys still to fetch, and generic type snippets that rank after both.
pub struct Completions {
    suggestions: SuggestionSet,
    pending: Vec<PendingExamples>,
    fallback: Vec<CompletionSuggestion>,
}

pub(crate) struct PendingExamples {
    keys: Vec<String>,
    shape: ExampleShape,
}

/// How a fetched example becomes a suggestion.
pub(crate) enum ExampleShape {
    Value {
        replace: (usize, usize),
        separator: String,
    },
    PropertyName {
        replace: (usize, usize),
        add_value: bool,
        separator: String,
        existing: HashSet<String>,
    },
}

impl ExampleShape {
    fn suggestion(&self, value: &Value) -> Option<CompletionSuggestion> {
        match self {
            ExampleShape::Value { replace, separator } => Some(literal_suggestion(
                value,
                SuggestionKind::Value,
                *replace,
                separator,
                None,
            )),
            ExampleShape::PropertyName {
                replace,
                add_value,
                separator,
                existing,
            } => {
                let name = value.as_str().filter(|name| !existing.contains(*name))?;
                Some(property_completer::named_suggestion(
                    name, *replace, *add_value, separator,
                ))
            }
        }
    }
}

/// Suggestions at `offset`: property names when the cursor is on a key or
/// inside an object, values otherwise. Dynamic example sources are queried
/// after the schema walk; a cancelled request skips them.
pub async fn complete(
    context: Context<'_>,
    offset: usize,
    provider: &dyn DynamicExampleProvider,
    examples: &ExampleContext,
    cancel: Option<&CancellationToken>,
) -> Vec<CompletionSuggestion> {
    let Some(Completions {
        mut suggestions,
        pending,
        fallback,
    }) = run_completers(context, offset)
    else {
        return vec![];
    };

    for request in pending {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            debug!("completion cancelled before dynamic examples");
            break;
        }
        for value in fetch_all(provider, &request.keys, examples).await {
            if let Some(suggestion) = request.shape.suggestion(&value) {
                suggestions.push(suggestion);
            }
        }
    }
    for suggestion in fallback {
        suggestions.push(suggestion);
    }

    debug!(offset, count = suggestions.len(), "completion suggestions");
    suggestions.into_vec(context.settings.max_completions)
}

fn run_completers(context: Context<'_>, offset: usize) -> Option<Completions> {
    run_completer::<PropertyCompleter>(context, offset)
        .or_else(|| run_completer::<ValueCompleter>(context, offset))
}

fn run_completer<'a, T: Completer<'a>>(context: Context<'a>, offset: usize) -> Option<Completions> {
    let completer = T::construct(context, offset)?;
    Some(completer.completions())
}

pub async fn get_completions(
    context: Context<'_>,
    params: &CompletionParams,
    provider: &dyn DynamicExampleProvider,
    examples: &ExampleContext,
) -> Option<CompletionResponse> {
    let offset = context
        .document
        .offset_at(params.text_document_position.position);
    let suggestions = complete(context, offset, provider, examples, None).await;
    if suggestions.is_empty() {
        return None;
    }

    let items = suggestions
        .into_iter()
        .map(|suggestion| completion_item(context.document, context.settings, suggestion))
        .collect::<Vec<CompletionItem>>();

    Some(CompletionResponse::List(CompletionList {
        is_incomplete: false,
        items,
    }))
}

fn completion_item(
    document: &Document,
    settings: &Settings,
    suggestion: CompletionSuggestion,
) -> CompletionItem {
    let is_snippet = suggestion.format == InsertFormat::Snippet;
    let new_text = if is_snippet && !settings.snippet_support {
        strip_placeholders(&suggestion.insert_text)
    } else {
        suggestion.insert_text
    };
    let (start, end) = suggestion.replace_range;

    CompletionItem {
        label: suggestion.label,
        kind: Some(match suggestion.kind {
            SuggestionKind::Property => CompletionItemKind::PROPERTY,
            SuggestionKind::Value => CompletionItemKind::VALUE,
            SuggestionKind::Snippet => CompletionItemKind::SNIPPET,
            SuggestionKind::Enum => CompletionItemKind::ENUM_MEMBER,
        }),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit {
            range: document.range_of(start, end),
            new_text,
        })),
        insert_text_format: Some(if is_snippet && settings.snippet_support {
            InsertTextFormat::SNIPPET
        } else {
            InsertTextFormat::PLAIN_TEXT
        }),
        filter_text: Some(suggestion.filter_text),
        sort_text: suggestion.sort_text,
        documentation: suggestion.documentation.map(|value| {
            Documentation::MarkupContent(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            })
        }),
        tags: suggestion
            .deprecated
            .then(|| vec![CompletionItemTag::DEPRECATED]),
        ..Default::default()
    }
}
