//! Site snapshot model.
//!
//! The host static-site generator owns content discovery: it parses front
//! matter, resolves URLs, and builds the page/document/collection graph. After
//! that pass it emits a **site snapshot**, one JSON document describing the
//! resolved site, and this module is the typed view over it.
//!
//! ```text
//! {
//!   "time": "2026-01-01T00:00:00+00:00",
//!   "generator": { "name": "jekyll", "version": "4.2.0", ... },
//!   "config": { "source": "/site", "collections": {...}, ... },
//!   "pages": [ { "name": "index.html", "path": "index.html", ... } ],
//!   "static_files": [ { "path": "robots.txt", "url": "/robots.txt", ... } ],
//!   "collections": { "posts": [ { "path": "_posts/2020-01-01-a.md", ... } ] },
//!   "drafts": [ ... ],
//!   "data": { "authors": { ... } },
//!   "categories": ["news"], "tags": ["release"]
//! }
//! ```
//!
//! Everything here is read-only for the rest of the crate: the bridge never
//! mutates the snapshot, it only produces serialized copies. Version-specific
//! host behavior is captured once, up front, in [`HostCapabilities`]; the
//! rest of the crate branches on capability flags, never on version strings.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The resolved site, as emitted by the host generator after content discovery.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Site {
    /// Build time in ISO-8601, if the host recorded one.
    pub time: Option<String>,
    /// Host generator identity and environment.
    pub generator: GeneratorInfo,
    /// The host's resolved site configuration map.
    pub config: Map<String, Value>,
    /// Freestanding pages (not belonging to any collection).
    pub pages: Vec<Page>,
    /// Files copied through without rendering.
    pub static_files: Vec<StaticFile>,
    /// Collection label → documents, as discovered by the host.
    pub collections: BTreeMap<String, Vec<Document>>,
    /// Draft documents (hosts keep these outside the collections map).
    pub drafts: Vec<Document>,
    /// Parsed data tree, keyed by data-file basename.
    pub data: Map<String, Value>,
    /// All category labels used across posts.
    pub categories: Vec<String>,
    /// All tag labels used across posts.
    pub tags: Vec<String>,
}

impl Site {
    /// Read and parse a snapshot file.
    pub fn from_path(path: &Path) -> Result<Site, SnapshotError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Parse a snapshot from a JSON string.
    pub fn from_json(content: &str) -> Result<Site, SnapshotError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Capability flags for the host that produced this snapshot.
    pub fn capabilities(&self) -> HostCapabilities {
        HostCapabilities::detect(&self.generator)
    }

    /// String-valued site config key, if present and a string.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Whether the site is configured to publish drafts.
    pub fn show_drafts(&self) -> bool {
        self.config
            .get("show_drafts")
            .or_else(|| self.config.get("drafts"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The posts collection, empty if the host discovered none.
    pub fn posts(&self) -> &[Document] {
        self.collections.get("posts").map(Vec::as_slice).unwrap_or(&[])
    }

    /// Front-matter defaults lookup built from the site `defaults` config.
    pub fn frontmatter_defaults(&self) -> FrontmatterDefaults {
        FrontmatterDefaults::from_config(&self.config)
    }
}

/// Host generator identity, passed through into the report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeneratorInfo {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub metadata: Map<String, Value>,
}

/// A freestanding page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Page {
    /// Source filename (e.g. `about.md`).
    pub name: String,
    /// Source path relative to the site root.
    pub path: String,
    /// Rendered URL.
    pub url: String,
    /// Output extension after rendering (e.g. `.html`), if the host knows it.
    pub output_ext: Option<String>,
    /// Front-matter map.
    pub data: Map<String, Value>,
}

impl Page {
    /// Whether this page renders to an HTML document.
    pub fn renders_html(&self) -> bool {
        matches!(self.output_ext.as_deref(), Some(".html") | Some(".htm"))
    }
}

/// A file copied into the output without rendering.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticFile {
    /// Path relative to the site root.
    pub path: String,
    /// Public URL.
    pub url: String,
    /// File extension including the dot (e.g. `.html`).
    pub extension: String,
    /// Last modification time, if the host records it.
    pub modified_time: Option<String>,
}

/// A document belonging to a collection (or a draft).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Document {
    /// Path relative to the collections base (e.g. `_posts/2020-01-01-a.md`).
    pub path: String,
    /// Rendered URL.
    pub url: String,
    /// Label of the collection the host filed this under.
    pub collection: Option<String>,
    /// Host-assigned identifier.
    pub id: Option<String>,
    /// Publication date (legacy hosts expose it as a document attribute).
    pub date: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// Front-matter map.
    pub data: Map<String, Value>,
}

// ============================================================================
// Host capabilities
// ============================================================================

/// Version-dependent host behavior, detected once at startup.
///
/// Old 2.x hosts differ in three ways that matter to the bridge: posts carry
/// explicit date/id/categories/tags attributes, static files have no resolved
/// URL, and there is no `collections_dir` setting. Everything downstream
/// consults these flags instead of re-parsing version strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Posts/drafts use the legacy attribute layout.
    pub legacy_content: bool,
    /// Static files carry a resolved `url` (2.x hosts don't).
    pub static_file_urls: bool,
    /// The host honors a `collections_dir` setting.
    pub collections_dir: bool,
}

impl HostCapabilities {
    pub fn detect(generator: &GeneratorInfo) -> Self {
        let legacy = generator.version.starts_with("2.");
        HostCapabilities {
            legacy_content: legacy,
            static_file_urls: !legacy,
            collections_dir: !legacy,
        }
    }

    /// Capabilities of a current host; what tests and defaults assume.
    pub fn modern() -> Self {
        HostCapabilities {
            legacy_content: false,
            static_file_urls: true,
            collections_dir: true,
        }
    }
}

// ============================================================================
// Front-matter defaults
// ============================================================================

/// One entry of the site `defaults` config: a path/type scope plus the
/// front-matter values applied to everything it matches.
#[derive(Debug, Clone)]
struct DefaultsScope {
    path: String,
    node_type: Option<String>,
    values: Map<String, Value>,
}

/// Lookup for the host's front-matter defaults.
///
/// Hosts let users declare front-matter defaults scoped by path prefix and
/// node type. Rendered pages have those defaults merged in, but the raw
/// `data` map in the snapshot does not, so the serializer re-applies them
/// for pages, with the page's own front matter winning.
#[derive(Debug, Clone, Default)]
pub struct FrontmatterDefaults {
    scopes: Vec<DefaultsScope>,
}

impl FrontmatterDefaults {
    /// Parse the `defaults` key of a site config. Malformed entries are
    /// skipped rather than failing the build.
    pub fn from_config(config: &Map<String, Value>) -> Self {
        let mut scopes = Vec::new();
        let entries = config.get("defaults").and_then(Value::as_array);

        for entry in entries.into_iter().flatten() {
            let Some(entry) = entry.as_object() else {
                continue;
            };
            let Some(values) = entry.get("values").and_then(Value::as_object) else {
                continue;
            };
            let scope = entry.get("scope").and_then(Value::as_object);
            let path = scope
                .and_then(|s| s.get("path"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim_matches('/')
                .to_string();
            let node_type = scope
                .and_then(|s| s.get("type"))
                .and_then(Value::as_str)
                .map(str::to_string);

            scopes.push(DefaultsScope {
                path,
                node_type,
                values: values.clone(),
            });
        }

        FrontmatterDefaults { scopes }
    }

    /// All default values applying to a node at `path` with the given type,
    /// merged in declaration order (later scopes override earlier ones).
    pub fn all(&self, path: &str, node_type: &str) -> Map<String, Value> {
        let path = path.trim_matches('/');
        let mut merged = Map::new();

        for scope in &self.scopes {
            if !scope_matches_path(&scope.path, path) {
                continue;
            }
            if scope.node_type.as_deref().is_some_and(|t| t != node_type) {
                continue;
            }
            for (key, value) in &scope.values {
                merged.insert(key.clone(), value.clone());
            }
        }

        merged
    }
}

/// An empty scope path matches everything; otherwise match on whole path
/// segments so `posts` does not claim `posts-archive/x.md`.
fn scope_matches_path(scope_path: &str, path: &str) -> bool {
    scope_path.is_empty()
        || path == scope_path
        || path.starts_with(&format!("{scope_path}/"))
}

// ============================================================================
// Tests
// ============================================================================
