//! CMS configuration normalization.
//!
//! CloudCannon settings have accumulated three shapes over the years:
//!
//! 1. An explicit config file in the site source (`cloudcannon.config.json`
//!    > `cloudcannon.config.yaml` > `cloudcannon.config.yml`, or any path
//!    named by the `CLOUDCANNON_CONFIG_PATH` environment variable).
//! 2. Legacy keys scattered through the site configuration: a reserved
//!    `cloudcannon` sub-map plus deprecated flat keys (`_editor`,
//!    `_source_editor`, `_array_structures`, ...).
//! 3. Nothing at all, in which case a usable select-data set is derived by
//!    scanning the site config for user-authored array/map values.
//!
//! [`normalize`] reconciles all of that into one [`CanonicalConfig`]. The
//! merge is strict priority, not blending: when a config file loads, legacy
//! keys are never consulted; computed defaults (`source`, `timezone`,
//! `base_url`) fill only keys the chosen source left absent. Section and
//! per-collection keys are renamed to their current spellings so downstream
//! code only ever sees canonical names.
//!
//! A missing config file is normal (one info line). A malformed one is
//! deliberately non-fatal: it logs a warning and normalization falls back to
//! legacy extraction: a typo in CMS settings must not take the site build
//! down with it.

use crate::log;
use crate::serializer::{self, COLLECTION_KEY_RENAMES, KeyRenameTable};
use crate::site::Site;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit CMS config file.
pub const CONFIG_PATH_ENV: &str = "CLOUDCANNON_CONFIG_PATH";

/// Discovery order for config files in the site source.
const CONFIG_FILENAMES: &[&str] = &[
    "cloudcannon.config.json",
    "cloudcannon.config.yaml",
    "cloudcannon.config.yml",
];

/// Top-level legacy section names and their current spellings.
const SECTION_RENAMES: KeyRenameTable = KeyRenameTable::new(&[
    ("_editor", "editor"),
    ("_source_editor", "source_editor"),
    ("_select_data", "select_data"),
    ("_inputs", "inputs"),
    ("_editables", "editables"),
    ("_structures", "structures"),
    ("_array_structures", "structures"),
    ("_collection_groups", "collection_groups"),
]);

/// CMS-reserved site config keys, never treated as user select data.
const CLOUDCANNON_KEYS: &[&str] = &[
    "_comments",
    "_options",
    "_editor",
    "_explore",
    "cloudcannon",
    "_collection_groups",
    "_enabled_editors",
    "_instance_values",
    "_source_editor",
    "_array_structures",
    "uploads_dir",
    "_editables",
    "_inputs",
    "_structures",
    "_select_data",
];

/// Generator-reserved site config keys, never treated as user select data.
const GENERATOR_KEYS: &[&str] = &[
    "source", "destination", "collections_dir", "cache_dir", "plugins_dir",
    "layouts_dir", "data_dir", "includes_dir", "collections", "safe",
    "include", "exclude", "keep_files", "encoding", "markdown_ext",
    "strict_front_matter", "show_drafts", "limit_posts", "future",
    "unpublished", "whitelist", "plugins", "markdown", "highlighter", "lsi",
    "excerpt_separator", "incremental", "detach", "port", "host", "baseurl",
    "show_dir_listing", "permalink", "paginate_path", "timezone", "quiet",
    "verbose", "defaults", "liquid", "kramdown", "title", "url",
    "description", "maruku", "redcloth", "rdiscount", "redcarpet", "gems",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("config file root must be a map")]
    NotAMap,
}

/// The normalized CMS configuration. Keys use canonical spellings; values
/// are whatever the winning source provided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalConfig {
    map: Map<String, Value>,
}

impl CanonicalConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.map
    }

    /// The `collections_config` section, empty when absent.
    pub fn collections_config(&self) -> Map<String, Value> {
        self.map
            .get("collections_config")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the user explicitly configured a collection with this name.
    pub fn has_collection(&self, name: &str) -> bool {
        self.map
            .get("collections_config")
            .and_then(Value::as_object)
            .is_some_and(|collections| collections.contains_key(name))
    }

    /// The `data_config` section: `true`, a subset map, or absent.
    pub fn data_config(&self) -> Option<&Value> {
        self.map.get("data_config")
    }
}

/// Explicit config path from the environment, if set.
pub fn env_override() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from)
}

/// Build the canonical CMS configuration for a site.
///
/// `override_path` (CLI flag or [`env_override`]) beats file discovery in
/// `source_root`; a loaded file beats legacy site-config extraction; computed
/// defaults fill only what remains absent.
pub fn normalize(site: &Site, source_root: &Path, override_path: Option<&Path>) -> CanonicalConfig {
    let base = load_explicit(source_root, override_path).unwrap_or_else(|| legacy_config(site));

    let mut map = rename_sections(base);
    rename_collection_keys(&mut map);
    apply_defaults(&mut map, site);

    CanonicalConfig { map }
}

// ============================================================================
// File loading
// ============================================================================

fn load_explicit(source_root: &Path, override_path: Option<&Path>) -> Option<Map<String, Value>> {
    if let Some(path) = override_path {
        return match load_config_file(path) {
            Ok(map) => {
                log!(info; "using config file at {}", path.display());
                Some(map)
            }
            Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                log!(info; "no config file found at {}", path.display());
                None
            }
            Err(err) => {
                log!(warn; "unreadable config file at {}: {err}", path.display());
                None
            }
        };
    }

    for name in CONFIG_FILENAMES {
        let path = source_root.join(name);
        match load_config_file(&path) {
            Ok(map) => {
                log!(info; "using config file at {}", path.display());
                return Some(map);
            }
            Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => {
                // The file exists, so the user meant it; don't silently
                // shadow it with a lower-priority candidate.
                log!(warn; "unreadable config file at {}: {err}", path.display());
                return None;
            }
        }
    }

    log!(info; "no config file found at {}", source_root.join(CONFIG_FILENAMES[0]).display());
    None
}

/// Parse one config file into a JSON map. `.json` files get the strict JSON
/// parser; everything else goes through YAML, which accepts JSON as a
/// subset.
fn load_config_file(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let content = fs::read_to_string(path)?;

    let value = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str::<Value>(&content)?
    } else {
        let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;
        serializer::yaml_to_json(&yaml)
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::NotAMap),
    }
}

// ============================================================================
// Legacy extraction
// ============================================================================

/// Reconstruct a config map from legacy site-config keys.
fn legacy_config(site: &Site) -> Map<String, Value> {
    log!(info; "falling back to site config");

    let config = &site.config;
    let mut map = Map::new();

    insert_some(&mut map, "data_config", dig(config, &["cloudcannon", "data"]).cloned());
    insert_some(
        &mut map,
        "collections_config",
        dig(config, &["cloudcannon", "collections"]).cloned(),
    );
    insert_some(
        &mut map,
        "_collection_groups",
        config
            .get("_collection_groups")
            .or_else(|| dig(config, &["_explore", "groups"]))
            .cloned(),
    );
    insert_some(
        &mut map,
        "_select_data",
        config
            .get("_select_data")
            .cloned()
            .or_else(|| legacy_select_data(config)),
    );
    for key in ["_inputs", "_editables", "_editor", "_source_editor"] {
        insert_some(&mut map, key, config.get(key).cloned());
    }
    insert_some(
        &mut map,
        "_structures",
        config
            .get("_structures")
            .or_else(|| config.get("_array_structures"))
            .cloned(),
    );

    if let Some(uploads) = config.get("uploads_dir").cloned() {
        let mut paths = Map::new();
        paths.insert("uploads".to_string(), uploads);
        map.insert("paths".to_string(), Value::Object(paths));
    }

    // Deprecated sections with no current equivalent pass through as-is.
    for key in ["_comments", "_enabled_editors", "_instance_values", "_options"] {
        insert_some(&mut map, key, config.get(key).cloned());
    }

    map
}

/// Derive a select-data set by scanning the site config for user-authored
/// array/map values, i.e. everything not reserved by the generator or the CMS.
fn legacy_select_data(config: &Map<String, Value>) -> Option<Value> {
    let mut out = Map::new();

    for (key, value) in config {
        if !value.is_array() && !value.is_object() {
            continue;
        }
        if CLOUDCANNON_KEYS.contains(&key.as_str()) || GENERATOR_KEYS.contains(&key.as_str()) {
            continue;
        }
        out.insert(key.clone(), value.clone());
    }

    if out.is_empty() {
        None
    } else {
        Some(Value::Object(out))
    }
}

// ============================================================================
// Canonicalization
// ============================================================================

/// Rename legacy top-level sections to their current names. When both the
/// legacy and current spelling are present, the current one wins; between
/// `_structures` and `_array_structures`, `_structures` wins.
fn rename_sections(map: Map<String, Value>) -> Map<String, Value> {
    let mut source = map;
    if source.contains_key("_structures") {
        source.remove("_array_structures");
    }

    let mut out = Map::new();

    // Current spellings first so a stray legacy duplicate cannot shadow them.
    for (key, value) in &source {
        if SECTION_RENAMES.rename(key) == key.as_str() {
            out.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in source {
        let renamed = SECTION_RENAMES.rename(&key);
        if renamed != key && !out.contains_key(renamed) {
            out.insert(renamed.to_string(), value);
        }
    }

    out
}

/// Apply the per-collection key renames to every entry of the
/// `collections_config` section.
fn rename_collection_keys(map: &mut Map<String, Value>) {
    let Some(collections) = map
        .get_mut("collections_config")
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    for entry in collections.values_mut() {
        let Some(fields) = entry.as_object_mut() else {
            continue;
        };
        let mut renamed = Map::new();
        for (key, value) in fields.iter() {
            let current = COLLECTION_KEY_RENAMES.rename(key);
            if current != key && fields.contains_key(current) {
                continue;
            }
            renamed.insert(current.to_string(), value.clone());
        }
        *fields = renamed;
    }
}

/// Fill in computed defaults for keys the chosen source left absent.
fn apply_defaults(map: &mut Map<String, Value>, site: &Site) {
    if !map.contains_key("source") {
        let source = site.config_str("source").unwrap_or("");
        map.insert("source".to_string(), Value::String(strip_cwd_prefix(source)));
    }
    if !map.contains_key("timezone") {
        if let Some(timezone) = site.config.get("timezone").filter(|v| !v.is_null()) {
            map.insert("timezone".to_string(), timezone.clone());
        }
    }
    if !map.contains_key("base_url") {
        if let Some(base_url) = site.config.get("baseurl").filter(|v| !v.is_null()) {
            map.insert("base_url".to_string(), base_url.clone());
        }
    }
}

/// The site source with the working-directory prefix stripped, so the
/// reported source is stable across machines.
fn strip_cwd_prefix(source: &str) -> String {
    let cwd = std::env::current_dir()
        .map(|dir| dir.to_string_lossy().to_string())
        .unwrap_or_default();

    if !cwd.is_empty() {
        if let Some(stripped) = source.strip_prefix(&cwd) {
            return stripped.to_string();
        }
    }
    source.to_string()
}

fn insert_some(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value.filter(|v| !v.is_null()) {
        map.insert(key.to_string(), value);
    }
}

/// Nested lookup through object values.
fn dig<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    let (first, rest) = keys.split_first()?;
    let mut current = map.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn site_with_config(config: Value) -> Site {
        serde_json::from_value(json!({ "config": config })).unwrap()
    }

    // =========================================================================
    // File discovery and parsing
    // =========================================================================

    #[test]
    fn missing_file_falls_back_to_legacy() {
        let tmp = TempDir::new().unwrap();
        let site = site_with_config(json!({ "_editor": { "default_path": "/about/" } }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(
            config.get("editor"),
            Some(&json!({ "default_path": "/about/" }))
        );
    }

    #[test]
    fn json_file_outranks_yaml() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.json"),
            r#"{ "timezone": "Etc/UTC" }"#,
        )
        .unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.yml"),
            "timezone: Pacific/Auckland\n",
        )
        .unwrap();

        let config = normalize(&Site::default(), tmp.path(), None);
        assert_eq!(config.get("timezone"), Some(&json!("Etc/UTC")));
    }

    #[test]
    fn yaml_file_parses_like_json_equivalent() {
        let tmp_yaml = TempDir::new().unwrap();
        fs::write(
            tmp_yaml.path().join("cloudcannon.config.yml"),
            "select_data:\n  news:\n    first: \"yes\"\n",
        )
        .unwrap();

        let tmp_json = TempDir::new().unwrap();
        fs::write(
            tmp_json.path().join("cloudcannon.config.json"),
            r#"{ "select_data": { "news": { "first": "yes" } } }"#,
        )
        .unwrap();

        let site = Site::default();
        let from_yaml = normalize(&site, tmp_yaml.path(), None);
        let from_json = normalize(&site, tmp_json.path(), None);
        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn malformed_file_falls_back_to_legacy() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.yml"),
            "timezone: [unclosed\n",
        )
        .unwrap();
        let site = site_with_config(json!({ "_source_editor": { "theme": "dawn" } }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(config.get("timezone"), None);
        assert_eq!(config.get("source_editor"), Some(&json!({ "theme": "dawn" })));
    }

    #[test]
    fn scalar_root_is_treated_as_malformed() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("cloudcannon.config.yml"), "just a string\n").unwrap();

        let config = normalize(&Site::default(), tmp.path(), None);
        assert_eq!(config.get("just a string"), None);
    }

    #[test]
    fn override_path_beats_discovery() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.json"),
            r#"{ "timezone": "Etc/UTC" }"#,
        )
        .unwrap();
        let custom = tmp.path().join("custom.yml");
        fs::write(&custom, "timezone: Pacific/Auckland\n").unwrap();

        let config = normalize(&Site::default(), tmp.path(), Some(&custom));
        assert_eq!(config.get("timezone"), Some(&json!("Pacific/Auckland")));
    }

    #[test]
    fn missing_override_path_falls_back_to_legacy() {
        let tmp = TempDir::new().unwrap();
        let site = site_with_config(json!({ "_inputs": { "title": { "type": "text" } } }));

        let config = normalize(&site, tmp.path(), Some(&tmp.path().join("absent.yml")));
        assert!(config.get("inputs").is_some());
    }

    // =========================================================================
    // Priority: file wins over legacy, defaults fill gaps
    // =========================================================================

    #[test]
    fn file_content_wins_over_legacy_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.yml"),
            "editor:\n  default_path: /from-file/\n",
        )
        .unwrap();
        let site = site_with_config(json!({ "_editor": { "default_path": "/from-legacy/" } }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(
            config.get("editor"),
            Some(&json!({ "default_path": "/from-file/" }))
        );
    }

    #[test]
    fn file_select_data_ignores_legacy_scan() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.yml"),
            "_select_data:\n  news:\n    first: \"yes\"\n",
        )
        .unwrap();
        // Site config holds a user array that the legacy scan would pick up.
        let site = site_with_config(json!({ "staff": ["jane", "sam"] }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(
            config.get("select_data"),
            Some(&json!({ "news": { "first": "yes" } }))
        );
    }

    #[test]
    fn defaults_fill_only_absent_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.yml"),
            "timezone: Pacific/Auckland\n",
        )
        .unwrap();
        let site = site_with_config(json!({
            "timezone": "Etc/UTC",
            "baseurl": "/blog"
        }));

        let config = normalize(&site, tmp.path(), None);
        // Explicit file value survives; base_url comes from the site config.
        assert_eq!(config.get("timezone"), Some(&json!("Pacific/Auckland")));
        assert_eq!(config.get("base_url"), Some(&json!("/blog")));
        assert!(config.get("source").is_some());
    }

    #[test]
    fn source_default_strips_cwd_prefix() {
        let tmp = TempDir::new().unwrap();
        let cwd = std::env::current_dir().unwrap();
        let site = site_with_config(json!({
            "source": format!("{}/site", cwd.display())
        }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(config.get("source"), Some(&json!("/site")));
    }

    // =========================================================================
    // Legacy extraction
    // =========================================================================

    #[test]
    fn legacy_reserved_submap_feeds_config_sections() {
        let tmp = TempDir::new().unwrap();
        let site = site_with_config(json!({
            "cloudcannon": {
                "data": true,
                "collections": { "posts": { "output": true } }
            },
            "uploads_dir": "uploads"
        }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(config.data_config(), Some(&json!(true)));
        assert!(config.has_collection("posts"));
        assert_eq!(config.get("paths"), Some(&json!({ "uploads": "uploads" })));
    }

    #[test]
    fn legacy_select_data_scan_excludes_reserved_keys() {
        let tmp = TempDir::new().unwrap();
        let site = site_with_config(json!({
            "collections": { "posts": {} },
            "defaults": [{ "scope": {}, "values": {} }],
            "_inputs": { "title": {} },
            "staff": ["jane", "sam"],
            "offices": { "hq": "Wellington" },
            "title": "scalar, ignored"
        }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(
            config.get("select_data"),
            Some(&json!({
                "staff": ["jane", "sam"],
                "offices": { "hq": "Wellington" }
            }))
        );
    }

    #[test]
    fn legacy_explore_groups_become_collection_groups() {
        let tmp = TempDir::new().unwrap();
        let site = site_with_config(json!({
            "_explore": { "groups": [{ "heading": "Blogging", "collections": ["posts"] }] }
        }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(
            config.get("collection_groups"),
            Some(&json!([{ "heading": "Blogging", "collections": ["posts"] }]))
        );
    }

    #[test]
    fn legacy_array_structures_rename_to_structures() {
        let tmp = TempDir::new().unwrap();
        let site = site_with_config(json!({
            "_array_structures": { "gallery": { "values": [] } }
        }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(
            config.get("structures"),
            Some(&json!({ "gallery": { "values": [] } }))
        );
    }

    #[test]
    fn structures_wins_over_array_structures() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.yml"),
            "_structures:\n  current: {}\n_array_structures:\n  stale: {}\n",
        )
        .unwrap();

        let config = normalize(&Site::default(), tmp.path(), None);
        assert_eq!(config.get("structures"), Some(&json!({ "current": {} })));
    }

    #[test]
    fn deprecated_sections_pass_through_unrenamed() {
        let tmp = TempDir::new().unwrap();
        let site = site_with_config(json!({
            "_comments": { "title": "The page title" },
            "_options": { "content": { "image": true } }
        }));

        let config = normalize(&site, tmp.path(), None);
        assert_eq!(
            config.get("_comments"),
            Some(&json!({ "title": "The page title" }))
        );
        assert_eq!(
            config.get("_options"),
            Some(&json!({ "content": { "image": true } }))
        );
    }

    // =========================================================================
    // Collection key renames
    // =========================================================================

    #[test]
    fn collection_entries_get_current_key_names() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.yml"),
            concat!(
                "collections_config:\n",
                "  posts:\n",
                "    _sort_key: date\n",
                "    _image_key: hero\n",
                "    path: _posts\n",
            ),
        )
        .unwrap();

        let config = normalize(&Site::default(), tmp.path(), None);
        assert_eq!(
            config.collections_config().get("posts"),
            Some(&json!({ "sort_key": "date", "image_key": "hero", "path": "_posts" }))
        );
    }

    #[test]
    fn current_collection_key_wins_over_legacy_duplicate() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("cloudcannon.config.yml"),
            "collections_config:\n  posts:\n    _sort_key: stale\n    sort_key: date\n",
        )
        .unwrap();

        let config = normalize(&Site::default(), tmp.path(), None);
        assert_eq!(
            config.collections_config().get("posts"),
            Some(&json!({ "sort_key": "date" }))
        );
    }
}
