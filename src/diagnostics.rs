use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};

use crate::{
    cache::ResultCache,
    config::Settings,
    document::Document,
    schema::SchemaRegistry,
    validation::{self, Severity, ValidationOptions, ValidationProblem},
};

pub fn diagnostics(
    registry: &SchemaRegistry,
    settings: &Settings,
    cache: &ResultCache,
    (path, document): (&Path, &Document),
) -> Option<Vec<Diagnostic>> {
    if !settings.validation_diagnostics {
        return None;
    }

    let options = ValidationOptions::from(settings);
    let problems = match registry.effective_for_document(path, document.text()) {
        Some(schema) => {
            validation::validate_document(document, &schema, &options, Some(cache), None)
        }
        None => validation::syntax_problems(document),
    };

    Some(
        problems
            .iter()
            .map(|problem| to_diagnostic(document, problem))
            .collect(),
    )
}

/// Diagnostics for every document with a path, validated in parallel.
pub fn workspace_diagnostics(
    registry: &SchemaRegistry,
    settings: &Settings,
    cache: &ResultCache,
    documents: &[Document],
) -> Vec<(PathBuf, Vec<Diagnostic>)> {
    if !settings.validation_diagnostics {
        return vec![];
    }

    let options = ValidationOptions::from(settings);
    let results = validation::validate_documents(registry, documents, &options, cache);

    documents
        .par_iter()
        .zip(results)
        .filter_map(|(document, problems)| {
            let path = document.path()?.to_path_buf();
            let diags = problems
                .iter()
                .map(|problem| to_diagnostic(document, problem))
                .collect();
            Some((path, diags))
        })
        .collect()
}

fn to_diagnostic(document: &Document, problem: &ValidationProblem) -> Diagnostic {
    Diagnostic {
        range: document.range_of(problem.start, problem.end),
        severity: Some(match problem.severity {
            Severity::Error => DiagnosticSeverity::ERROR,
            Severity::Warning => DiagnosticSeverity::WARNING,
            Severity::Information => DiagnosticSeverity::INFORMATION,
            Severity::Hint => DiagnosticSeverity::HINT,
        }),
        code: problem
            .code
            .map(|code| NumberOrString::String(code.as_str().to_string())),
        source: Some("addon-lint".into()),
        message: problem.message.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{entity_library, registry_with};
    use tower_lsp::lsp_types::Position;

    fn entity_path() -> PathBuf {
        PathBuf::from("/pack/entities/zombie.json")
    }

    /// Test: Diagnostics are disabled when settings.validation_diagnostics is false.
    #[test]
    fn test_diagnostics_disabled_by_setting() {
        let (_temp_dir, registry) = registry_with(&[("entity.json", entity_library())]);
        let settings = Settings {
            validation_diagnostics: false,
            ..Settings::default()
        };
        let path = entity_path();
        let document = Document::with_path(&path, "{}");

        let result = diagnostics(&registry, &settings, &ResultCache::default(), (&path, &document));

        assert!(result.is_none(), "Should return None when diagnostics are disabled");
    }

    /// Test: A missing required property is reported on the opening brace.
    #[test]
    fn test_diagnostics_missing_required_property() {
        let (_temp_dir, registry) = registry_with(&[("entity.json", entity_library())]);
        let path = entity_path();
        let document = Document::with_path(&path, "{}");

        let diags = diagnostics(
            &registry,
            &Settings::default(),
            &ResultCache::default(),
            (&path, &document),
        )
        .expect("diagnostics enabled by default");

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Missing property \"format_version\".");
        assert_eq!(diags[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(diags[0].source, Some("addon-lint".to_string()));
        assert_eq!(diags[0].code, Some(NumberOrString::String("required".into())));
        assert_eq!(diags[0].range.start, Position { line: 0, character: 0 });
        assert_eq!(diags[0].range.end, Position { line: 0, character: 1 });
    }

    /// Test: Files no schema claims still get syntax errors.
    #[test]
    fn test_diagnostics_unmatched_file_reports_syntax_only() {
        let (_temp_dir, registry) = registry_with(&[("entity.json", entity_library())]);
        let path = PathBuf::from("/pack/textures/terrain.json");
        let settings = Settings::default();
        let cache = ResultCache::default();

        let valid = Document::with_path(&path, "{}");
        let diags = diagnostics(&registry, &settings, &cache, (&path, &valid)).unwrap();
        assert!(diags.is_empty(), "no schema applies: {diags:?}");

        let broken = Document::with_path(&path, "{\"a\": }");
        let diags = diagnostics(&registry, &settings, &cache, (&path, &broken)).unwrap();
        assert!(!diags.is_empty());
        assert!(diags
            .iter()
            .all(|d| d.code == Some(NumberOrString::String("syntax".into()))));
    }

    /// Test: Comment-only documents produce nothing.
    #[test]
    fn test_diagnostics_comment_only_file() {
        let (_temp_dir, registry) = registry_with(&[("entity.json", entity_library())]);
        let path = entity_path();
        let document = Document::with_path(&path, "// nothing yet\n");

        let diags = diagnostics(
            &registry,
            &Settings::default(),
            &ResultCache::default(),
            (&path, &document),
        )
        .unwrap();
        assert!(diags.is_empty());
    }

    #[test]
    fn test_workspace_diagnostics_keeps_document_paths() {
        let (_temp_dir, registry) = registry_with(&[("entity.json", entity_library())]);
        let documents = vec![
            Document::with_path("/pack/entities/a.json", "{}"),
            Document::with_path("/pack/entities/b.json", "{\"format_version\": \"1.20.0\"}"),
            Document::new("{}"),
        ];

        let results = workspace_diagnostics(
            &registry,
            &Settings::default(),
            &ResultCache::default(),
            &documents,
        );

        assert_eq!(results.len(), 2, "documents without a path are skipped");
        assert_eq!(results[0].0, PathBuf::from("/pack/entities/a.json"));
        assert_eq!(results[0].1.len(), 1);
        assert!(results[1].1.is_empty());
    }
}
