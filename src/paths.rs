//! Canonical directory paths derived from site configuration.
//!
//! The host config may spell directories with leading slashes, double
//! slashes, or not at all; everything downstream (collection path
//! resolution, prefix classification, the report's `paths` section) needs
//! one canonical relative form. These are pure functions; the only inputs
//! are the config map and the host capabilities.

use crate::site::HostCapabilities;
use serde_json::{Map, Value};

/// Directory holding collection folders, `""` when unset or unsupported.
pub fn collections_dir(config: &Map<String, Value>, caps: &HostCapabilities) -> String {
    if !caps.collections_dir {
        return String::new();
    }
    config
        .get("collections_dir")
        .and_then(Value::as_str)
        .map(|dir| strip_leading_slashes(dir).to_string())
        .unwrap_or_default()
}

/// Directory holding data files, `_data` by default.
pub fn data_dir(config: &Map<String, Value>) -> String {
    dir_with_default(config, "data_dir", "_data")
}

/// Directory holding layouts, `_layouts` by default.
pub fn layouts_dir(config: &Map<String, Value>) -> String {
    dir_with_default(config, "layouts_dir", "_layouts")
}

/// Uploads directory, only present when the user configured one.
pub fn uploads_dir(config: &Map<String, Value>) -> Option<String> {
    config
        .get("uploads_dir")
        .and_then(Value::as_str)
        .map(|dir| strip_leading_slashes(dir).to_string())
}

fn dir_with_default(config: &Map<String, Value>, key: &str, default: &str) -> String {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(strip_leading_slashes)
        .filter(|dir| !dir.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Strip any leading `/` characters from a path.
pub fn strip_leading_slashes(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Join two relative path fragments, collapsing repeated slashes and
/// stripping the leading one. Empty fragments vanish instead of producing
/// stray separators.
pub fn join(base: &str, rest: &str) -> String {
    let joined = match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{rest}"),
    };
    collapse_slashes(strip_leading_slashes(&joined))
}

/// Collapse runs of `/` into one.
pub fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn collections_dir_default_empty() {
        let dir = collections_dir(&Map::new(), &HostCapabilities::modern());
        assert_eq!(dir, "");
    }

    #[test]
    fn collections_dir_strips_leading_slash() {
        let cfg = config(json!({ "collections_dir": "/collections" }));
        assert_eq!(
            collections_dir(&cfg, &HostCapabilities::modern()),
            "collections"
        );
    }

    #[test]
    fn collections_dir_empty_without_capability() {
        let cfg = config(json!({ "collections_dir": "collections" }));
        let caps = HostCapabilities {
            legacy_content: true,
            static_file_urls: false,
            collections_dir: false,
        };
        assert_eq!(collections_dir(&cfg, &caps), "");
    }

    #[test]
    fn data_dir_default() {
        assert_eq!(data_dir(&Map::new()), "_data");
    }

    #[test]
    fn data_dir_configured() {
        let cfg = config(json!({ "data_dir": "/content/_data" }));
        assert_eq!(data_dir(&cfg), "content/_data");
    }

    #[test]
    fn layouts_dir_default() {
        assert_eq!(layouts_dir(&Map::new()), "_layouts");
    }

    #[test]
    fn uploads_dir_absent_by_default() {
        assert_eq!(uploads_dir(&Map::new()), None);
    }

    #[test]
    fn uploads_dir_configured() {
        let cfg = config(json!({ "uploads_dir": "/uploads" }));
        assert_eq!(uploads_dir(&cfg), Some("uploads".to_string()));
    }

    #[test]
    fn join_both_fragments() {
        assert_eq!(join("collections", "_posts"), "collections/_posts");
    }

    #[test]
    fn join_empty_base() {
        assert_eq!(join("", "_posts"), "_posts");
    }

    #[test]
    fn join_empty_rest() {
        assert_eq!(join("collections", ""), "collections");
    }

    #[test]
    fn join_strips_and_collapses() {
        assert_eq!(join("/collections/", "/_posts"), "collections/_posts");
    }

    #[test]
    fn collapse_slashes_runs() {
        assert_eq!(collapse_slashes("a//b///c"), "a/b/c");
    }
}
