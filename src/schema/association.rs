//! Document to schema associations

use std::collections::HashMap;

use globset::{Glob, GlobMatcher};
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use tower_lsp::lsp_types::Url;

use super::uri::resolve_against;

lazy_static! {
    /// `# yaml-language-server: $schema=<uri>`
    static ref MODELINE: Regex =
        Regex::new(r"^\s*#\s*yaml-language-server\s*:\s*\$schema\s*=\s*(\S+)").expect("valid regex");
}

#[derive(Debug, Clone)]
enum PatternMatcher {
    Exact,
    Glob(GlobMatcher),
}

/// A configured pattern and the schema it selects
#[derive(Debug, Clone)]
struct AssociationEntry {
    pattern: String,
    matcher: PatternMatcher,
    schema: Url,
}

/// Decides which schemas apply to a document.
///
/// Sources are consulted in priority order and the first one that yields
/// anything wins: explicit overrides, exact patterns, glob patterns, then a
/// modeline in the document itself.
#[derive(Debug, Clone, Default)]
pub struct AssociationIndex {
    overrides: HashMap<Url, Vec<Url>>,
    entries: Vec<AssociationEntry>,
}

impl AssociationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configured associations. Overrides are kept.
    pub fn set_configured<I>(&mut self, associations: I)
    where
        I: IntoIterator<Item = (Url, Vec<String>)>,
    {
        self.entries.clear();
        for (schema, patterns) in associations {
            for pattern in patterns {
                let Some(matcher) = compile_pattern(&pattern) else {
                    continue;
                };
                self.entries.push(AssociationEntry {
                    pattern,
                    matcher,
                    schema: schema.clone(),
                });
            }
        }
        tracing::debug!("Loaded {} schema associations", self.entries.len());
    }

    /// Pin a document to the given schemas, or clear the pin when empty
    pub fn set_override(&mut self, document: &Url, schemas: Vec<Url>) {
        if schemas.is_empty() {
            self.overrides.remove(document);
        } else {
            self.overrides.insert(document.clone(), schemas);
        }
    }

    /// The schemas that apply to `document`, in priority order
    pub fn schemas_for(&self, document: &Url, text: &str) -> Vec<Url> {
        if let Some(schemas) = self.overrides.get(document) {
            return schemas.clone();
        }

        let path = percent_decode_str(document.path())
            .decode_utf8_lossy()
            .into_owned();

        let exact = self.collect(|matcher, pattern| match matcher {
            PatternMatcher::Exact => exact_match(pattern, document, &path),
            PatternMatcher::Glob(_) => false,
        });
        if !exact.is_empty() {
            return exact;
        }

        let glob = self.collect(|matcher, pattern| match matcher {
            PatternMatcher::Glob(glob) if pattern.contains("://") => glob.is_match(document.as_str()),
            PatternMatcher::Glob(glob) => glob.is_match(&path),
            PatternMatcher::Exact => false,
        });
        if !glob.is_empty() {
            return glob;
        }

        modeline_schema(document, text).into_iter().collect()
    }

    fn collect<F>(&self, matches: F) -> Vec<Url>
    where
        F: Fn(&PatternMatcher, &str) -> bool,
    {
        let mut schemas: Vec<Url> = Vec::new();
        for entry in &self.entries {
            if matches(&entry.matcher, &entry.pattern) && !schemas.contains(&entry.schema) {
                schemas.push(entry.schema.clone());
            }
        }
        schemas
    }
}

/// The schema named by a modeline comment, resolved relative to the document
pub fn modeline_schema(document: &Url, text: &str) -> Option<Url> {
    text.lines()
        .find_map(|line| MODELINE.captures(line))
        .and_then(|captures| captures.get(1))
        .map(|raw| resolve_against(document, raw.as_str()))
}

fn compile_pattern(pattern: &str) -> Option<PatternMatcher> {
    if !pattern.contains(['*', '?', '[', '{']) {
        return Some(PatternMatcher::Exact);
    }

    let anchored = if pattern.starts_with("**") || pattern.starts_with('/') || pattern.contains("://") {
        pattern.to_string()
    } else {
        format!("**/{pattern}")
    };
    Glob::new(&anchored)
        .map(|glob| PatternMatcher::Glob(glob.compile_matcher()))
        .map_err(|err| tracing::warn!("Invalid glob pattern '{}': {}", pattern, err))
        .ok()
}

fn exact_match(pattern: &str, document: &Url, path: &str) -> bool {
    if document.as_str() == pattern || path == pattern {
        return true;
    }
    let suffix = pattern.trim_start_matches("./").trim_start_matches('/');
    !suffix.is_empty() && path.ends_with(&format!("/{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("url")
    }

    fn index(entries: &[(&str, &[&str])]) -> AssociationIndex {
        let mut index = AssociationIndex::new();
        index.set_configured(entries.iter().map(|(schema, patterns)| {
            (url(schema), patterns.iter().map(|p| p.to_string()).collect())
        }));
        index
    }

    #[test]
    fn test_glob_match() {
        let index = index(&[("https://example.com/k8s.json", &["*.k8s.yaml"])]);
        let doc = url("file:///project/deploy/app.k8s.yaml");
        assert_eq!(index.schemas_for(&doc, ""), vec![url("https://example.com/k8s.json")]);
        assert!(index.schemas_for(&url("file:///project/app.yaml"), "").is_empty());
    }

    #[test]
    fn test_exact_beats_glob() {
        let index = index(&[
            ("https://example.com/glob.json", &["**/*.yaml"]),
            ("https://example.com/exact.json", &["deploy/app.yaml"]),
        ]);
        let doc = url("file:///project/deploy/app.yaml");
        assert_eq!(index.schemas_for(&doc, ""), vec![url("https://example.com/exact.json")]);
    }

    #[test]
    fn test_multiple_matches_keep_configuration_order() {
        let index = index(&[
            ("https://example.com/a.json", &["*.yaml"]),
            ("https://example.com/b.json", &["app.*"]),
            ("https://example.com/a.json", &["**/app.yaml"]),
        ]);
        let doc = url("file:///project/app.yaml");
        assert_eq!(
            index.schemas_for(&doc, ""),
            vec![url("https://example.com/a.json"), url("https://example.com/b.json")]
        );
    }

    #[test]
    fn test_override_wins_and_survives_reload() {
        let mut index = index(&[("https://example.com/a.json", &["*.yaml"])]);
        let doc = url("file:///project/app.yaml");
        index.set_override(&doc, vec![url("https://example.com/pinned.json")]);
        index.set_configured(vec![(url("https://example.com/b.json"), vec!["*.yaml".to_string()])]);
        assert_eq!(index.schemas_for(&doc, ""), vec![url("https://example.com/pinned.json")]);

        index.set_override(&doc, Vec::new());
        assert_eq!(index.schemas_for(&doc, ""), vec![url("https://example.com/b.json")]);
    }

    #[test]
    fn test_modeline_is_last_resort() {
        let text = "# yaml-language-server: $schema=../schemas/app.json\nkind: Pod\n";
        let doc = url("file:///project/deploy/app.yaml");
        assert_eq!(
            AssociationIndex::new().schemas_for(&doc, text),
            vec![url("file:///project/schemas/app.json")]
        );

        let configured = index(&[("https://example.com/a.json", &["app.yaml"])]);
        assert_eq!(
            configured.schemas_for(&doc, text),
            vec![url("https://example.com/a.json")]
        );
    }

    #[test]
    fn test_modeline_alias() {
        let text = "#yaml-language-server: $schema=Kubernetes\n";
        let schema = modeline_schema(&url("file:///a.yaml"), text).expect("modeline");
        assert_eq!(schema.as_str(), crate::schema::uri::KUBERNETES_SCHEMA_URL);
    }
}
