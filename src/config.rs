use std::collections::HashMap;
use std::path::Path;

use anyhow::anyhow;
use config::{Config, File};
use serde::Deserialize;
use tower_lsp::lsp_types::ClientCapabilities;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// Recursion limit for validation and schema navigation
    pub max_depth: usize,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    /// Nodes visited between two cancellation checks
    pub cancellation_check_interval: usize,
    pub validation_diagnostics: bool,
    pub snippet_support: bool,
    /// Experimental toggles the addon enables; gates `x-experimental-options`
    pub experimental_options: Vec<String>,
    pub max_completions: usize,
    /// Workspace identifier sources for `x-dynamic-examples-source` keys
    #[serde(default)]
    pub example_sources: HashMap<String, ExampleSourceConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExampleSourceConfig {
    /// Glob relative to the workspace root, e.g. `**/entities/*.json`
    pub glob: String,
    /// JSON pointer of the identifier inside each matching file
    #[serde(default)]
    pub pointer: String,
}

impl Settings {
    pub fn new(root_dir: &Path, capabilities: &ClientCapabilities) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/addon-lint/settings");
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.addon-lint",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .set_default("max_depth", 50)?
            .set_default("cache_capacity", 2000)?
            .set_default("cache_ttl_secs", 300)?
            .set_default("cancellation_check_interval", 64)?
            .set_default("validation_diagnostics", true)?
            .set_default("snippet_support", true)?
            .set_default("experimental_options", Vec::<String>::new())?
            .set_default("max_completions", 200)?
            .set_override_option(
                "snippet_support",
                capabilities
                    .text_document
                    .as_ref()
                    .and_then(|it| it.completion.as_ref())
                    .and_then(|it| it.completion_item.as_ref())
                    .and_then(|it| match it.snippet_support {
                        Some(false) => Some(false),
                        _ => None,
                    }),
            )?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let mut settings = settings.try_deserialize::<Settings>()?;
        if settings.cancellation_check_interval == 0 {
            settings.cancellation_check_interval = 1;
        }

        anyhow::Ok(settings)
    }

    pub fn experimental_enabled(&self, toggles: &[String]) -> bool {
        toggles
            .iter()
            .all(|toggle| self.experimental_options.contains(toggle))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_depth: 50,
            cache_capacity: 2000,
            cache_ttl_secs: 300,
            cancellation_check_interval: 64,
            validation_diagnostics: true,
            snippet_support: true,
            experimental_options: vec![],
            max_completions: 200,
            example_sources: HashMap::new(),
        }
    }
}
