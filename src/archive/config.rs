//! Archive build configuration
//!
//! Maps source file extensions to language descriptors. A language names the
//! modules that implement it, the extensions it owns and an optional
//! runtime-context binding; packages that contain at least one context-bound
//! language carry a `languages.config` entry describing the bindings.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use super::manifest::ManifestGenerator;

/// One source language mapped into a package.
#[derive(Debug, Clone)]
pub struct LanguageInfo {
    extensions: Vec<String>,
    modules: Vec<String>,
    language_context: String,
}

impl LanguageInfo {
    pub fn new(
        extensions: Vec<String>,
        modules: Vec<String>,
        language_context: impl Into<String>,
    ) -> Self {
        Self {
            extensions,
            modules,
            language_context: language_context.into(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Modules implementing this language, primary module first.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn language_context(&self) -> &str {
        &self.language_context
    }

    /// Primary module name of the language.
    pub fn context_module_name(&self) -> Option<&str> {
        self.modules.first().map(String::as_str)
    }

    /// Comma-joined extension list with every extension doubled in `ext` and
    /// `.ext` forms.
    pub fn extensions_string(&self) -> String {
        let mut out = String::new();
        for ext in &self.extensions {
            let bare = ext.trim_start_matches('.');
            if !out.is_empty() {
                out.push(',');
            }
            out.push_str(bare);
            out.push_str(",.");
            out.push_str(bare);
        }
        out
    }
}

/// Configuration of the archive builder: a manifest generator, the language
/// table keyed by extension and an optional source prefix.
pub struct ArchiveConfig {
    manifest_template: Arc<dyn ManifestGenerator>,
    languages: Vec<LanguageInfo>,
    by_extension: HashMap<String, usize>,
    url_prefix: Option<String>,
}

impl ArchiveConfig {
    pub fn new(
        manifest_template: Arc<dyn ManifestGenerator>,
        languages: Vec<LanguageInfo>,
        url_prefix: Option<String>,
    ) -> Self {
        let mut by_extension = HashMap::new();
        for (idx, language) in languages.iter().enumerate() {
            for ext in language.extensions() {
                by_extension.insert(normalize_extension(ext), idx);
            }
        }
        Self {
            manifest_template,
            languages,
            by_extension,
            url_prefix,
        }
    }

    pub fn manifest_template(&self) -> &Arc<dyn ManifestGenerator> {
        &self.manifest_template
    }

    pub fn url_prefix(&self) -> Option<&str> {
        self.url_prefix.as_deref()
    }

    /// Language owning the given file extension, if any.
    pub fn language_for_extension(&self, ext: &str) -> Option<&LanguageInfo> {
        self.by_extension
            .get(&normalize_extension(ext))
            .map(|idx| &self.languages[*idx])
    }

    /// Languages matched by the given file names, in declaration order.
    pub fn find_source_languages<'a, I>(&self, file_names: I) -> Vec<&LanguageInfo>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut matched = BTreeSet::new();
        for name in file_names {
            if let Some(idx) = extension_of(name)
                .and_then(|ext| self.by_extension.get(&normalize_extension(ext)))
            {
                matched.insert(*idx);
            }
        }
        matched.into_iter().map(|idx| &self.languages[idx]).collect()
    }

    /// Module sources of the given languages, with the configured prefix
    /// applied to non-rooted sources.
    pub fn language_modules(&self, languages: &[&LanguageInfo]) -> Vec<String> {
        let mut sources = Vec::new();
        for language in languages {
            for module in language.modules() {
                sources.push(self.apply_prefix(module));
            }
        }
        sources
    }

    fn apply_prefix(&self, source: &str) -> String {
        match &self.url_prefix {
            Some(prefix) if !is_rooted(source) => format!("{prefix}{source}"),
            _ => source.to_string(),
        }
    }
}

/// Whether a source is absolute and must not be resolved against the package
/// root.
pub(crate) fn is_rooted(source: &str) -> bool {
    source.starts_with('/') || source.contains("://")
}

fn normalize_extension(ext: &str) -> String {
    let bare = ext.trim_start_matches('.');
    format!(".{}", bare.to_ascii_lowercase())
}

fn extension_of(name: &str) -> Option<&str> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    file_name.rfind('.').map(|idx| &file_name[idx..])
}
