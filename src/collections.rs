//! Collection assembly and content classification.
//!
//! Turns the loose facts in the snapshot (site-config collection entries,
//! CMS collection configuration, discovered documents/pages/static files)
//! into the two maps the report embeds:
//!
//! - **collection configuration**: one entry per named collection with a
//!   resolved base `path`, an `output` flag, and whatever per-collection
//!   settings the user provided;
//! - **collection members**: one ordered list of serialized nodes per
//!   collection.
//!
//! Assembly runs in a fixed order. Names come from the generator's own
//! `collections` setting unioned with the CMS `collections_config`; posts
//! and drafts living in category folders (`other/_posts/...`) synthesize
//! `other/posts`-style collections; the implicit `pages`, `data`, `posts`,
//! and `drafts` entries are filled in unless explicitly configured; every
//! entry gets a resolved path.
//!
//! Classification then assigns every content node to **exactly one**
//! collection by longest-matching path prefix (`other/posts` must claim
//! `other/_posts/x.md` before plain `posts` can), with the root `pages`
//! entry (path `""`) evaluated last. Nodes matching nothing are dropped
//! with a warning, as are nodes inside a collection that disables parsing.
//! Finally, collections that ended up empty and were never explicitly
//! configured are pruned, with one diagnostic line per collection either
//! way.

use crate::config::CanonicalConfig;
use crate::log;
use crate::paths;
use crate::reader;
use crate::serializer::{MAX_DEPTH, NodeRef, Serializer};
use crate::site::{Document, Page, Site, StaticFile};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::Path;

/// Static files that pass the strict pages filter by extension.
const STATIC_PAGE_EXTENSIONS: &[&str] = &[".html", ".htm"];

/// Root-level static files that pass the strict pages filter by name.
const STATIC_PAGE_FILENAMES: &[&str] = &["robots.txt", "sitemap.xml"];

/// The assembled collection configuration and membership maps.
#[derive(Debug, Clone, Default)]
pub struct AssembledCollections {
    /// Collection name → configuration entry.
    pub config: Map<String, Value>,
    /// Collection name → ordered serialized members.
    pub members: Map<String, Value>,
}

/// Derive the canonical collection set for a site and classify every
/// content node into it. `source_root` is only touched to check whether raw
/// data files exist (the `data` collection is pruned otherwise).
pub fn assemble(
    site: &Site,
    canonical: &CanonicalConfig,
    source_root: &Path,
) -> AssembledCollections {
    let caps = site.capabilities();
    let collections_dir = paths::collections_dir(&site.config, &caps);
    let data_dir = paths::data_dir(&site.config);

    let mut config = base_config(site, canonical);
    add_implicit_config(&mut config, site, &collections_dir, &data_dir);
    add_category_config(&mut config, site, &collections_dir);
    resolve_paths(&mut config, &collections_dir);
    mark_auto_discovered(&mut config, canonical);

    let mut members = classify(site, &config);
    prune(&mut config, &mut members, canonical, source_root, &data_dir);

    AssembledCollections { config, members }
}

// ============================================================================
// Configuration assembly
// ============================================================================

/// Union of CMS-configured collections and the generator's own `collections`
/// setting (a list of names or a map of per-collection options). Generator
/// options win for the keys they set, since they describe how the site actually
/// built.
fn base_config(site: &Site, canonical: &CanonicalConfig) -> Map<String, Value> {
    let mut config = canonical.collections_config();
    for entry in config.values_mut() {
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
    }

    match site.config.get("collections") {
        Some(Value::Array(names)) => {
            for name in names.iter().filter_map(Value::as_str) {
                entry_mut(&mut config, name);
            }
        }
        Some(Value::Object(collections)) => {
            for (name, options) in collections {
                let entry = entry_mut(&mut config, name);
                match options.as_object() {
                    Some(options) => {
                        for (key, value) in options {
                            entry.insert(key.clone(), value.clone());
                        }
                    }
                    // Workaround for empty collection configurations.
                    None => {
                        entry.entry("output".to_string()).or_insert(json!(false));
                    }
                }
            }
        }
        _ => {}
    }

    config
}

/// Ensure the implicit collections exist unless explicitly configured.
fn add_implicit_config(
    config: &mut Map<String, Value>,
    site: &Site,
    collections_dir: &str,
    data_dir: &str,
) {
    if site.capabilities().legacy_content {
        // Legacy hosts have no posts entry in their collections setting.
        entry_mut(config, "posts")
            .entry("output".to_string())
            .or_insert(json!(true));
    }

    if !config.contains_key("pages") {
        config.insert(
            "pages".to_string(),
            json!({ "path": "", "output": true, "filter": "strict" }),
        );
    }
    if !config.contains_key("data") {
        config.insert(
            "data".to_string(),
            json!({ "path": data_dir, "output": false }),
        );
    }
    if !config.contains_key("posts") {
        config.insert(
            "posts".to_string(),
            json!({ "path": paths::join(collections_dir, "_posts"), "output": true }),
        );
    }
    if !config.contains_key("drafts") {
        let output = site.show_drafts()
            || config
                .get("posts")
                .and_then(|posts| posts.get("output"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
        config.insert(
            "drafts".to_string(),
            json!({ "path": paths::join(collections_dir, "_drafts"), "output": output }),
        );
    }
}

/// Synthesize `<folder>/posts` and `<folder>/drafts` entries for every
/// category folder discovered among the site's posts and drafts, inheriting
/// the base configuration with the folder-specific path.
fn add_category_config(config: &mut Map<String, Value>, site: &Site, collections_dir: &str) {
    for (kind, docs) in [("posts", site.posts()), ("drafts", site.drafts.as_slice())] {
        // The grouping map doubles as the seen-set: one entry per folder no
        // matter how many documents share it.
        for key in group_by_category_folder(docs, kind).into_keys() {
            if key == kind || config.contains_key(&key) {
                continue;
            }
            let folder = &key[..key.len() - kind.len() - 1];
            let mut entry = config
                .get(kind)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            entry.insert(
                "path".to_string(),
                json!(paths::join(collections_dir, &format!("{folder}/_{kind}"))),
            );
            config.insert(key, Value::Object(entry));
        }
    }
}

/// Group documents by their category-folder collection key: a document at
/// `other/_posts/x.md` belongs to `other/posts`, one at `_posts/x.md` to
/// plain `posts`.
fn group_by_category_folder<'a>(
    docs: &'a [Document],
    kind: &str,
) -> BTreeMap<String, Vec<&'a Document>> {
    let mut groups: BTreeMap<String, Vec<&Document>> = BTreeMap::new();
    for doc in docs {
        let key = category_folder_key(&doc.path, kind);
        groups.entry(key).or_default().push(doc);
    }
    groups
}

fn category_folder_key(path: &str, kind: &str) -> String {
    let relative = paths::strip_leading_slashes(path);
    let marker = format!("/_{kind}/");
    match relative.find(&marker) {
        Some(idx) => paths::join(&relative[..idx], kind),
        None => kind.to_string(),
    }
}

/// Give every entry a resolved, normalized path: the explicit value when
/// present, else `<collections_dir>/_<name>`.
fn resolve_paths(config: &mut Map<String, Value>, collections_dir: &str) {
    for (name, entry) in config.iter_mut() {
        let Some(fields) = entry.as_object_mut() else {
            continue;
        };
        let resolved = match fields.get("path").and_then(Value::as_str) {
            Some(path) => paths::collapse_slashes(paths::strip_leading_slashes(path)),
            None => paths::join(collections_dir, &format!("_{name}")),
        };
        fields.insert("path".to_string(), Value::String(resolved));
    }
}

/// Flag entries the user never explicitly configured; pruning consults this.
fn mark_auto_discovered(config: &mut Map<String, Value>, canonical: &CanonicalConfig) {
    for (name, entry) in config.iter_mut() {
        if canonical.has_collection(name) {
            continue;
        }
        if let Some(fields) = entry.as_object_mut() {
            fields.insert("auto_discovered".to_string(), json!(true));
        }
    }
}

fn entry_mut<'a>(config: &'a mut Map<String, Value>, name: &str) -> &'a mut Map<String, Value> {
    config
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .expect("collection entries are objects by construction")
}

// ============================================================================
// Classification
// ============================================================================

/// One candidate prefix: resolved path, collection name, whether the
/// collection disables parsing, whether the strict filter applies.
struct PrefixEntry {
    path: String,
    name: String,
    parse_disabled: bool,
    strict: bool,
}

/// Classify every content node into exactly one collection by longest
/// matching path prefix.
fn classify(site: &Site, config: &Map<String, Value>) -> Map<String, Value> {
    let serializer = Serializer::for_site(site);
    let caps = site.capabilities();
    let collections_dir = paths::collections_dir(&site.config, &caps);

    let table = prefix_table(config);
    let mut buckets: BTreeMap<String, Vec<Value>> = config
        .keys()
        .map(|name| (name.clone(), Vec::new()))
        .collect();

    let documents = site
        .collections
        .values()
        .flatten()
        .chain(site.drafts.iter());
    for doc in documents {
        let match_path = paths::join(&collections_dir, &doc.path);
        let node = if caps.legacy_content {
            NodeRef::LegacyPost(doc)
        } else {
            NodeRef::Document(doc)
        };
        file_node(&table, &match_path, node, None, &serializer, &mut buckets);
    }

    for page in &site.pages {
        let match_path = paths::strip_leading_slashes(&page.path).to_string();
        file_node(
            &table,
            &match_path,
            NodeRef::Page(page),
            Some(FilterSubject::Page(page)),
            &serializer,
            &mut buckets,
        );
    }

    for file in &site.static_files {
        let match_path = paths::strip_leading_slashes(&file.path).to_string();
        file_node(
            &table,
            &match_path,
            NodeRef::StaticFile(file),
            Some(FilterSubject::StaticFile(file)),
            &serializer,
            &mut buckets,
        );
    }

    fallback_pages(site, &serializer, &mut buckets);

    buckets
        .into_iter()
        .map(|(name, members)| (name, Value::Array(members)))
        .collect()
}

/// Resolved prefixes sorted longest-first so the most specific collection
/// wins; the empty `pages` prefix sorts last and matches everything left.
fn prefix_table(config: &Map<String, Value>) -> Vec<PrefixEntry> {
    let mut table: Vec<PrefixEntry> = config
        .iter()
        .map(|(name, entry)| PrefixEntry {
            path: entry
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            name: name.clone(),
            parse_disabled: entry.get("parse").and_then(Value::as_bool) == Some(false),
            strict: entry.get("filter").and_then(Value::as_str) == Some("strict"),
        })
        .collect();

    table.sort_by(|a, b| {
        b.path
            .len()
            .cmp(&a.path.len())
            .then_with(|| a.name.cmp(&b.name))
    });
    table
}

/// What the strict pages filter gets to inspect.
enum FilterSubject<'a> {
    Page(&'a Page),
    StaticFile(&'a StaticFile),
}

/// Route one node into its collection bucket, or drop it with a warning.
fn file_node(
    table: &[PrefixEntry],
    match_path: &str,
    node: NodeRef<'_>,
    filter_subject: Option<FilterSubject<'_>>,
    serializer: &Serializer,
    buckets: &mut BTreeMap<String, Vec<Value>>,
) {
    let Some(entry) = table.iter().find(|entry| prefix_matches(&entry.path, match_path)) else {
        log!(warn; "no collection claims {match_path}");
        return;
    };

    if entry.parse_disabled {
        log!(warn; "{match_path} is in the unparsed {} collection", entry.name);
        return;
    }

    if entry.strict {
        if let Some(subject) = &filter_subject {
            if !passes_strict_filter(subject) {
                return;
            }
        }
    }

    if let Some(bucket) = buckets.get_mut(&entry.name) {
        bucket.push(serializer.node(node, 0, MAX_DEPTH));
    }
}

/// Directory-boundary prefix match; the empty prefix matches everything.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    prefix.is_empty() || path == prefix || path.starts_with(&format!("{prefix}/"))
}

/// The strict filter keeps only nodes that are really web pages: pages
/// rendering to HTML (or pretty URLs), and HTML-ish static files plus the
/// root `robots.txt`/`sitemap.xml`.
fn passes_strict_filter(subject: &FilterSubject<'_>) -> bool {
    match subject {
        FilterSubject::Page(page) => page.renders_html() || page.url.ends_with('/'),
        FilterSubject::StaticFile(file) => {
            STATIC_PAGE_EXTENSIONS.contains(&file.extension.as_str())
                || STATIC_PAGE_FILENAMES
                    .contains(&paths::strip_leading_slashes(&file.path))
        }
    }
}

/// When an explicitly-pathed `pages` collection claimed nothing, unclaimed
/// site pages fall back into it (strict filter still applied).
fn fallback_pages(site: &Site, serializer: &Serializer, buckets: &mut BTreeMap<String, Vec<Value>>) {
    let needs_fallback = buckets.get("pages").is_some_and(Vec::is_empty);
    if !needs_fallback {
        return;
    }

    let mut members = Vec::new();
    for page in &site.pages {
        if passes_strict_filter(&FilterSubject::Page(page)) {
            members.push(serializer.node(NodeRef::Page(page), 0, MAX_DEPTH));
        }
    }
    for file in &site.static_files {
        if passes_strict_filter(&FilterSubject::StaticFile(file)) {
            members.push(serializer.node(NodeRef::StaticFile(file), 0, MAX_DEPTH));
        }
    }

    if let Some(bucket) = buckets.get_mut("pages") {
        *bucket = members;
    }
}

// ============================================================================
// Pruning
// ============================================================================

/// Drop collections that earned no place in the output: `data` unless raw
/// data files exist on disk, everything else when auto-discovered and empty.
/// Explicitly-configured collections survive empty.
fn prune(
    config: &mut Map<String, Value>,
    members: &mut Map<String, Value>,
    canonical: &CanonicalConfig,
    source_root: &Path,
    data_dir: &str,
) {
    let names: Vec<String> = config.keys().cloned().collect();

    for name in names {
        let count = members
            .get(&name)
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);

        let drop = if name == "data" {
            !reader::has_data_files(source_root, data_dir)
        } else {
            count == 0 && !canonical.has_collection(&name)
        };

        if drop {
            log!(info; "ignored {name} collection");
            config.remove(&name);
            members.remove(&name);
        } else {
            log!(info; "processed {name} collection with {count} files");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
