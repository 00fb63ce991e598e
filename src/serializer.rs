//! Depth-bounded conversion of content nodes and raw values into JSON.
//!
//! Everything the report embeds (documents, pages, static files, data
//! values, configuration sections) flows through here. The conversion is
//! **total**: it never returns an error, because one surprising front-matter
//! shape must not fail an entire site build. Three mechanisms keep it safe:
//!
//! - **Depth limiting**: every recursive descent increments a depth counter;
//!   past the maximum (default 12) the serializer emits the literal sentinel
//!   `"MAXIMUM_DEPTH"` instead of descending. Document-like nodes are cut
//!   off much earlier (depth 3); a post embedding another post gains
//!   nothing from a full expansion. The structures extension point
//!   (`_structures`/`_array_structures`) legitimately nests deeply by
//!   design and gets a wider allowance.
//! - **Field exclusion**: structural keys already emitted at the top of a
//!   node (`path`, `url`, ...) and derived render-time fields (`content`,
//!   `output`, `next`, `previous`, `excerpt`) are dropped from data maps.
//! - **Degradation**: YAML-only shapes that JSON cannot represent (tagged
//!   values, non-finite floats, exotic mapping keys) become
//!   `"UNSUPPORTED:<kind>"` marker strings at ingestion.
//!
//! Dispatch is a closed sum, [`NodeRef`]: the caller names the variant
//! explicitly (the host capabilities decide `Document` vs. `LegacyPost`),
//! and each variant has one serialization function.

use crate::paths;
use crate::site::{Document, FrontmatterDefaults, HostCapabilities, Page, Site, StaticFile};
use serde_json::{Map, Value};

/// Default maximum recursion depth.
pub const MAX_DEPTH: usize = 12;

/// Document-like nodes are truncated beyond this depth even when the
/// general maximum allows more.
const DOCUMENT_DEPTH_LIMIT: usize = 3;

/// Deeper allowance for the structures extension point.
const STRUCTURES_MAX_DEPTH: usize = 20;

/// Emitted in place of a value once recursion depth is exhausted.
pub const MAX_DEPTH_SENTINEL: &str = "MAXIMUM_DEPTH";

/// Render-time fields excluded from every document-like data map.
const DERIVED_FIELDS: &[&str] = &["content", "output", "next", "previous", "excerpt"];

/// Keys whose values get the deeper structures allowance.
const STRUCTURES_KEYS: &[&str] = &["structures", "_structures", "_array_structures"];

/// One content node or raw value, tagged with its shape.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    /// A plain data value: scalar, array, or map.
    Value(&'a Value),
    StaticFile(&'a StaticFile),
    Page(&'a Page),
    Document(&'a Document),
    /// A post/draft from a legacy host: date, id, categories, and tags are
    /// document attributes rather than front matter.
    LegacyPost(&'a Document),
}

impl NodeRef<'_> {
    fn is_document_like(&self) -> bool {
        matches!(
            self,
            NodeRef::Page(_) | NodeRef::Document(_) | NodeRef::LegacyPost(_)
        )
    }
}

// ============================================================================
// Key renaming
// ============================================================================

/// A context-scoped key substitution table.
///
/// The serializer itself has no global rename state: the caller passes the
/// table for the section being serialized, and it applies to every map key
/// within that section.
#[derive(Debug, Clone, Copy)]
pub struct KeyRenameTable {
    entries: &'static [(&'static str, &'static str)],
}

impl KeyRenameTable {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        KeyRenameTable { entries }
    }

    /// The current name for `key`, or `key` itself if it is not renamed.
    pub fn rename<'a>(&self, key: &'a str) -> &'a str {
        self.entries
            .iter()
            .find(|(legacy, _)| *legacy == key)
            .map(|(_, current)| *current)
            .unwrap_or(key)
    }
}

/// Deprecated per-collection configuration keys and their current names.
pub const COLLECTION_KEY_RENAMES: KeyRenameTable = KeyRenameTable::new(&[
    ("_sort_key", "sort_key"),
    ("_subtext_key", "subtext_key"),
    ("_image_key", "image_key"),
    ("_image_size", "image_size"),
    ("_singular_name", "singular_name"),
    ("_singular_key", "singular_key"),
    ("_disable_add", "disable_add"),
    ("_icon", "icon"),
    ("_add_options", "add_options"),
]);

// ============================================================================
// Serializer
// ============================================================================

/// Serialization context: the resolved collections directory (documents
/// report collections_dir-relative paths), the site's front-matter defaults
/// (re-applied to pages), and the host capabilities.
#[derive(Debug, Clone)]
pub struct Serializer {
    collections_dir: String,
    defaults: FrontmatterDefaults,
    caps: HostCapabilities,
}

impl Serializer {
    pub fn for_site(site: &Site) -> Self {
        let caps = site.capabilities();
        Serializer {
            collections_dir: paths::collections_dir(&site.config, &caps),
            defaults: site.frontmatter_defaults(),
            caps,
        }
    }

    #[cfg(test)]
    fn bare() -> Self {
        Serializer {
            collections_dir: String::new(),
            defaults: FrontmatterDefaults::default(),
            caps: HostCapabilities::modern(),
        }
    }

    /// Serialize one node. `depth` is the recursion depth already consumed
    /// (pass 0 at the root); `max_depth` is the cutoff for this tree.
    pub fn node(&self, node: NodeRef<'_>, depth: usize, max_depth: usize) -> Value {
        let depth = depth + 1;

        if depth > max_depth || (depth > DOCUMENT_DEPTH_LIMIT && node.is_document_like()) {
            return Value::String(MAX_DEPTH_SENTINEL.to_string());
        }

        match node {
            NodeRef::Value(value) => self.value_inner(value, depth, max_depth, None),
            NodeRef::StaticFile(file) => self.static_file(file),
            NodeRef::Page(page) => self.page(page, depth, max_depth),
            NodeRef::Document(doc) => self.document(doc, depth, max_depth),
            NodeRef::LegacyPost(doc) => self.legacy_post(doc, depth, max_depth),
        }
    }

    /// Serialize a raw value with the default depth budget.
    pub fn value(&self, value: &Value, depth: usize, max_depth: usize) -> Value {
        self.node(NodeRef::Value(value), depth, max_depth)
    }

    /// Serialize a raw value, renaming map keys through `table`.
    pub fn value_renamed(
        &self,
        value: &Value,
        depth: usize,
        max_depth: usize,
        table: &KeyRenameTable,
    ) -> Value {
        let depth = depth + 1;
        if depth > max_depth {
            return Value::String(MAX_DEPTH_SENTINEL.to_string());
        }
        self.value_inner(value, depth, max_depth, Some(table))
    }

    /// `depth` has already been incremented for this value.
    fn value_inner(
        &self,
        value: &Value,
        depth: usize,
        max_depth: usize,
        renames: Option<&KeyRenameTable>,
    ) -> Value {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.descend(item, depth, max_depth, renames))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    let child_max = max_depth_for_key(key, max_depth);
                    let name = renames.map(|t| t.rename(key)).unwrap_or(key.as_str());
                    out.insert(name.to_string(), self.descend(child, depth, child_max, renames));
                }
                Value::Object(out)
            }
        }
    }

    fn descend(
        &self,
        value: &Value,
        depth: usize,
        max_depth: usize,
        renames: Option<&KeyRenameTable>,
    ) -> Value {
        let depth = depth + 1;
        if depth > max_depth {
            return Value::String(MAX_DEPTH_SENTINEL.to_string());
        }
        self.value_inner(value, depth, max_depth, renames)
    }

    // ------------------------------------------------------------------
    // Variant serializers
    // ------------------------------------------------------------------

    fn static_file(&self, file: &StaticFile) -> Value {
        let path = paths::strip_leading_slashes(&file.path).to_string();
        let url = if self.caps.static_file_urls {
            file.url.clone()
        } else {
            format!("/{path}")
        };

        let mut out = Map::new();
        out.insert("path".to_string(), Value::String(path));
        out.insert("url".to_string(), Value::String(url));
        if let Some(modified) = &file.modified_time {
            out.insert("modified_time".to_string(), Value::String(modified.clone()));
        }
        Value::Object(out)
    }

    fn page(&self, page: &Page, depth: usize, max_depth: usize) -> Value {
        let mut out = Map::new();
        out.insert("name".to_string(), Value::String(page.name.clone()));
        out.insert(
            "path".to_string(),
            Value::String(paths::strip_leading_slashes(&page.path).to_string()),
        );
        out.insert("url".to_string(), Value::String(page.url.clone()));

        // Defaults are merged under the page's own front matter; a scoped
        // `date` default would turn pages into pseudo-posts, so it is
        // dropped before merging.
        let mut defaults = self.defaults.all(&page.path, "pages");
        defaults.remove("date");
        let data = deep_merge_maps(defaults, &page.data);

        self.data_fields(&data, &mut out, &["dir", "name", "path", "url"], depth, max_depth);
        Value::Object(out)
    }

    fn document(&self, doc: &Document, depth: usize, max_depth: usize) -> Value {
        let mut out = Map::new();
        out.insert("path".to_string(), Value::String(self.document_path(doc)));
        out.insert("url".to_string(), Value::String(doc.url.clone()));
        if let Some(collection) = &doc.collection {
            out.insert("collection".to_string(), Value::String(collection.clone()));
        }
        if let Some(id) = &doc.id {
            out.insert("id".to_string(), Value::String(id.clone()));
        }

        self.data_fields(
            &doc.data,
            &mut out,
            &["dir", "id", "relative_path", "url", "collection"],
            depth,
            max_depth,
        );
        Value::Object(out)
    }

    fn legacy_post(&self, doc: &Document, depth: usize, max_depth: usize) -> Value {
        let path = paths::strip_leading_slashes(&doc.path).to_string();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();

        let mut out = Map::new();
        out.insert("name".to_string(), Value::String(name));
        out.insert("path".to_string(), Value::String(path));
        out.insert("url".to_string(), Value::String(doc.url.clone()));
        out.insert("date".to_string(), optional_string(&doc.date));
        out.insert("id".to_string(), optional_string(&doc.id));
        out.insert("categories".to_string(), string_list(&doc.categories));
        out.insert("tags".to_string(), string_list(&doc.tags));

        self.data_fields(
            &doc.data,
            &mut out,
            &["dir", "name", "path", "url", "date", "id", "categories", "tags"],
            depth,
            max_depth,
        );
        Value::Object(out)
    }

    /// Document paths are reported relative to the site root, so documents
    /// in a collection get the collections directory prefixed.
    fn document_path(&self, doc: &Document) -> String {
        if doc.collection.is_some() && !self.collections_dir.is_empty() {
            paths::join(&self.collections_dir, &doc.path)
        } else {
            paths::strip_leading_slashes(&doc.path).to_string()
        }
    }

    /// Append a data map's fields to `out`, skipping structural keys already
    /// emitted, derived render-time fields, and keys already present.
    fn data_fields(
        &self,
        data: &Map<String, Value>,
        out: &mut Map<String, Value>,
        structural: &[&str],
        depth: usize,
        max_depth: usize,
    ) {
        for (key, value) in data {
            if structural.contains(&key.as_str())
                || DERIVED_FIELDS.contains(&key.as_str())
                || out.contains_key(key)
            {
                continue;
            }
            let child_max = max_depth_for_key(key, max_depth);
            out.insert(key.clone(), self.descend(value, depth, child_max, None));
        }
    }
}

/// The structures extension point may nest up to [`STRUCTURES_MAX_DEPTH`].
fn max_depth_for_key(key: &str, max_depth: usize) -> usize {
    if STRUCTURES_KEYS.contains(&key) {
        STRUCTURES_MAX_DEPTH
    } else {
        max_depth
    }
}

fn optional_string(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

fn string_list(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

/// Recursively merge `overlay` on top of `defaults`: overlay keys win, and
/// nested maps merge key-by-key.
pub fn deep_merge_maps(defaults: Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults;
    for (key, value) in overlay {
        let combined = match (merged.remove(key), value) {
            (Some(Value::Object(base)), Value::Object(over)) => {
                Value::Object(deep_merge_maps(base, over))
            }
            (_, value) => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}

// ============================================================================
// YAML ingestion
// ============================================================================

/// Convert a YAML value into a JSON value, degrading YAML-only shapes into
/// `UNSUPPORTED:` marker strings instead of failing.
pub fn yaml_to_json(value: &serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => yaml_number(n),
        serde_yaml::Value::String(s) => Value::String(s.clone()),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut out = Map::new();
            for (key, child) in mapping {
                out.insert(yaml_key(key), yaml_to_json(child));
            }
            Value::Object(out)
        }
        serde_yaml::Value::Tagged(tagged) => {
            Value::String(format!("UNSUPPORTED:{}", tagged.tag))
        }
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        return Value::Number(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Value::Number(u.into());
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String("UNSUPPORTED:non-finite number".to_string()))
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        _ => "UNSUPPORTED:key".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
