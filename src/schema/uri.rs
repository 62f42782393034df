//! Schema identifier resolution
//!
//! Maps the raw schema identifiers found in settings, modelines and
//! association requests to canonical, fetchable URIs. Pure string work: no
//! filesystem or network access happens here.

use tower_lsp::lsp_types::{Url, WorkspaceFolder};

/// Alias accepted in place of the Kubernetes schema URL
pub const KUBERNETES_ALIAS: &str = "kubernetes";

/// The schema the Kubernetes alias stands for
pub const KUBERNETES_SCHEMA_URL: &str = "https://raw.githubusercontent.com/yannh/kubernetes-json-schema/master/v1.22.4-standalone-strict/all.json";

/// Resolve a raw schema identifier to an absolute URI.
///
/// Relative identifiers whose first segment names a workspace folder are
/// resolved inside that folder, others against `workspace_root`. Without a
/// root the identifier is anchored at `file:///`.
pub fn resolve_schema_uri(
    workspace_folders: &[WorkspaceFolder],
    workspace_root: Option<&Url>,
    raw: &str,
) -> Url {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case(KUBERNETES_ALIAS) {
        return kubernetes_schema_url();
    }

    if let Ok(url) = Url::parse(raw) {
        // A single-letter scheme is a Windows drive letter, not a URI
        if url.scheme().len() > 1 {
            return url;
        }
    }

    if raw.starts_with('/') {
        if let Ok(url) = Url::from_file_path(raw) {
            return url;
        }
    }

    resolve_relative(workspace_folders, workspace_root, raw)
}

/// Resolve an identifier relative to another URI, such as a modeline in a
/// document or a `$ref` in a schema
pub fn resolve_against(base: &Url, raw: &str) -> Url {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case(KUBERNETES_ALIAS) {
        return kubernetes_schema_url();
    }
    match Url::parse(raw) {
        Ok(url) if url.scheme().len() > 1 => url,
        _ => base.join(raw).unwrap_or_else(|_| base.clone()),
    }
}

pub fn kubernetes_schema_url() -> Url {
    Url::parse(KUBERNETES_SCHEMA_URL).unwrap_or_else(|_| fallback_root())
}

fn resolve_relative(
    workspace_folders: &[WorkspaceFolder],
    workspace_root: Option<&Url>,
    raw: &str,
) -> Url {
    let relative = raw.trim_start_matches("./");
    let mut segments = relative.splitn(2, '/');
    let first = segments.next().unwrap_or_default();
    let rest = segments.next().unwrap_or_default();

    for folder in workspace_folders {
        if !folder.name.is_empty() && folder.name == first {
            if let Ok(url) = as_directory(&folder.uri).join(rest) {
                return url;
            }
        }
    }

    let base = workspace_root
        .map(as_directory)
        .unwrap_or_else(fallback_root);
    base.join(relative).unwrap_or(base)
}

/// Ensure a URL ends with `/` so that joining appends instead of replacing
/// the last segment
fn as_directory(url: &Url) -> Url {
    let mut dir = url.clone();
    if !dir.path().ends_with('/') {
        let path = format!("{}/", dir.path());
        dir.set_path(&path);
    }
    dir
}

fn fallback_root() -> Url {
    Url::parse("file:///").unwrap_or_else(|_| unreachable!("static URL is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(uri: &str, name: &str) -> WorkspaceFolder {
        WorkspaceFolder {
            uri: Url::parse(uri).expect("url"),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_kubernetes_alias_ignores_workspace() {
        let root = Url::parse("file:///work").expect("url");
        let folders = vec![folder("file:///work/a", "kubernetes")];
        for raw in ["kubernetes", "Kubernetes", "KUBERNETES"] {
            assert_eq!(
                resolve_schema_uri(&folders, Some(&root), raw).as_str(),
                KUBERNETES_SCHEMA_URL
            );
            assert_eq!(resolve_schema_uri(&[], None, raw).as_str(), KUBERNETES_SCHEMA_URL);
        }
    }

    #[test]
    fn test_absolute_uri_passes_through() {
        let raw = "https://json.schemastore.org/github-workflow.json";
        assert_eq!(resolve_schema_uri(&[], None, raw).as_str(), raw);
    }

    #[test]
    fn test_relative_against_root_without_folders() {
        let root = Url::parse("file:///home/user/project").expect("url");
        let url = resolve_schema_uri(&[], Some(&root), "schemas/app.json");
        assert_eq!(url.as_str(), "file:///home/user/project/schemas/app.json");
    }

    #[test]
    fn test_relative_with_dot_prefix() {
        let root = Url::parse("file:///project/").expect("url");
        let url = resolve_schema_uri(&[], Some(&root), "./app.json");
        assert_eq!(url.as_str(), "file:///project/app.json");
    }

    #[test]
    fn test_relative_inside_named_folder() {
        let root = Url::parse("file:///work").expect("url");
        let folders = vec![
            folder("file:///elsewhere/api", "api"),
            folder("file:///elsewhere/web", "web"),
        ];
        let url = resolve_schema_uri(&folders, Some(&root), "web/schema.json");
        assert_eq!(url.as_str(), "file:///elsewhere/web/schema.json");
    }

    #[test]
    fn test_relative_without_root_is_still_absolute() {
        let url = resolve_schema_uri(&[], None, "schema.json");
        assert_eq!(url.as_str(), "file:///schema.json");
    }

    #[test]
    fn test_absolute_path() {
        let url = resolve_schema_uri(&[], None, "/etc/schema.json");
        assert_eq!(url.as_str(), "file:///etc/schema.json");
    }

    #[test]
    fn test_resolve_against_document() {
        let base = Url::parse("file:///project/deploy/app.yaml").expect("url");
        assert_eq!(
            resolve_against(&base, "../schemas/app.json").as_str(),
            "file:///project/schemas/app.json"
        );
        assert_eq!(
            resolve_against(&base, "kubernetes").as_str(),
            KUBERNETES_SCHEMA_URL
        );
    }
}
