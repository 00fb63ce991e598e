//! Final report assembly and artifact output.
//!
//! Combines everything the earlier stages produced (generator metadata,
//! the normalized CMS configuration, assembled collections, selected data
//! sets) into the one JSON document the CMS consumes, and writes it to
//! `_cloudcannon/info.json` in the build output.
//!
//! The report is **sparse**: optional sections that are absent or empty are
//! omitted entirely rather than emitted as `null`. Everything embedded in
//! the document has passed through the serializer's depth guard, so a
//! pathological config or data tree cannot blow up the artifact.
//!
//! Failing to write the artifact is the one fatal error in this crate: a
//! build whose metadata cannot land on disk has nothing to show the CMS.

use crate::collections::AssembledCollections;
use crate::config::CanonicalConfig;
use crate::log;
use crate::paths;
use crate::serializer::{COLLECTION_KEY_RENAMES, MAX_DEPTH, Serializer};
use crate::site::Site;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version of the report document layout, not of this crate.
pub const SCHEMA_VERSION: &str = "0.0.2";

/// Artifact location inside the build output directory.
pub const ARTIFACT_PATH: &str = "_cloudcannon/info.json";

/// CMS configuration sections passed through into the report when present.
const PASSTHROUGH_SECTIONS: &[&str] = &[
    "editor",
    "source_editor",
    "select_data",
    "inputs",
    "editables",
    "structures",
    "collection_groups",
    "_comments",
    "_enabled_editors",
    "_instance_values",
    "_options",
];

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The assembled report document.
#[derive(Debug, Serialize)]
pub struct Info {
    /// Build time, ISO-8601.
    pub time: String,
    /// Report layout version.
    pub version: String,
    pub cloudcannon: PluginInfo,
    pub generator: GeneratorSection,
    pub paths: PathsSection,
    pub collections_config: Value,
    pub collections: Map<String, Value>,
    pub data: Map<String, Value>,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<Value>,
    /// Sparse passthrough of the remaining CMS configuration sections.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Identity of this bridge, so the CMS knows what produced the artifact.
#[derive(Debug, Serialize)]
pub struct PluginInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Identity and environment of the host generator.
#[derive(Debug, Serialize)]
pub struct GeneratorSection {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub metadata: Map<String, Value>,
}

/// Resolved site directories the CMS needs to locate content.
#[derive(Debug, Serialize)]
pub struct PathsSection {
    #[serde(rename = "static")]
    pub static_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploads: Option<String>,
    pub data: String,
    pub collections: String,
    pub layouts: String,
}

/// Assemble the report document.
pub fn build_info(
    site: &Site,
    canonical: &CanonicalConfig,
    assembled: AssembledCollections,
) -> Info {
    let serializer = Serializer::for_site(site);
    let caps = site.capabilities();

    let collections_config = serializer.value_renamed(
        &Value::Object(assembled.config),
        0,
        MAX_DEPTH,
        &COLLECTION_KEY_RENAMES,
    );

    let mut extra = Map::new();
    for section in PASSTHROUGH_SECTIONS {
        if let Some(value) = canonical.get(section).filter(|v| !section_is_empty(v)) {
            extra.insert(section.to_string(), serializer.value(value, 0, MAX_DEPTH));
        }
    }
    if let Some(defaults) = site.config.get("defaults").filter(|v| !section_is_empty(v)) {
        extra.insert(
            "defaults".to_string(),
            serializer.value(defaults, 0, MAX_DEPTH),
        );
    }

    Info {
        time: build_time(site),
        version: SCHEMA_VERSION.to_string(),
        cloudcannon: PluginInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
        generator: generator_section(site),
        paths: paths_section(site, canonical, &caps),
        collections_config,
        collections: assembled.members,
        data: generate_data(site, canonical, &serializer),
        source: canonical
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        timezone: canonical.get("timezone").cloned(),
        base_url: canonical.get("base_url").cloned(),
        extra,
    }
}

/// Write the report into the build output directory, creating parent
/// directories as needed. Returns the artifact path, the caller's record
/// of generated files to retain.
pub fn write_artifact(destination: &Path, info: &Info) -> Result<PathBuf, BuildError> {
    let path = destination.join(ARTIFACT_PATH);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut json = serde_json::to_string_pretty(info)?;
    json.push('\n');
    fs::write(&path, json)?;
    Ok(path)
}

fn build_time(site: &Site) -> String {
    site.time.clone().unwrap_or_else(|| {
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
    })
}

fn generator_section(site: &Site) -> GeneratorSection {
    let mut metadata = Map::new();
    for key in ["markdown", "kramdown", "commonmark"] {
        if let Some(value) = site.config.get(key).filter(|v| !v.is_null()) {
            metadata.insert(key.to_string(), value.clone());
        }
    }
    for (key, value) in &site.generator.metadata {
        metadata.entry(key.clone()).or_insert_with(|| value.clone());
    }

    GeneratorSection {
        name: site.generator.name.clone(),
        version: site.generator.version.clone(),
        environment: site.generator.environment.clone(),
        metadata,
    }
}

fn paths_section(
    site: &Site,
    canonical: &CanonicalConfig,
    caps: &crate::site::HostCapabilities,
) -> PathsSection {
    let uploads = canonical
        .get("paths")
        .and_then(|paths| paths.get("uploads"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| paths::uploads_dir(&site.config));

    PathsSection {
        static_dir: String::new(),
        uploads,
        data: paths::data_dir(&site.config),
        collections: paths::collections_dir(&site.config, caps),
        layouts: paths::layouts_dir(&site.config),
    }
}

/// The data selection: the full tree when `data_config` is `true`, the
/// subset it names when it is a map, otherwise nothing; always
/// supplemented with the site's category and tag labels.
fn generate_data(
    site: &Site,
    canonical: &CanonicalConfig,
    serializer: &Serializer,
) -> Map<String, Value> {
    let selected: Map<String, Value> = match canonical.data_config() {
        Some(Value::Bool(true)) => site.data.clone(),
        Some(Value::Object(subset)) => site
            .data
            .iter()
            .filter(|(key, _)| subset.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => Map::new(),
    };

    let mut data: Map<String, Value> = selected
        .iter()
        .map(|(key, value)| (key.clone(), serializer.value(value, 0, MAX_DEPTH)))
        .collect();

    data.entry("categories".to_string())
        .or_insert_with(|| string_list(&site.categories));
    data.entry("tags".to_string())
        .or_insert_with(|| string_list(&site.tags));

    for key in data.keys() {
        log!(info; "processed {key} data set");
    }

    data
}

fn string_list(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

/// Empty maps and arrays are omitted from the report entirely.
fn section_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
