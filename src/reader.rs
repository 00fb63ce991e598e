//! Data-directory presence scanning.
//!
//! The report needs to know whether raw data files exist on disk (the
//! `data` collection is pruned when its directory holds nothing) and the
//! CMS wants a path-only listing of those files (a collections-style map,
//! not the parsed contents; the parsed tree already arrives in the
//! snapshot). Listing only, never parsing: a broken YAML data file must not
//! break metadata generation.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Extensions the host treats as data files.
pub const DATA_FILE_EXTENSIONS: &[&str] = &["yml", "yaml", "json", "csv", "tsv"];

/// Whether any data file exists under `<source>/<data_dir>`.
pub fn has_data_files(source: &Path, data_dir: &str) -> bool {
    WalkDir::new(source.join(data_dir))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .any(|entry| is_data_file(entry.path()))
}

/// A collections-style map of the data directory: one `{ "path": ... }`
/// entry per data file keyed by sanitized basename, with subdirectories as
/// nested maps. Paths are relative to the site source. Missing or unreadable
/// directories yield an empty map.
pub fn read_data_paths(source: &Path, data_dir: &str) -> Map<String, Value> {
    let mut out = Map::new();
    read_dir_into(&source.join(data_dir), source, &mut out);
    out
}

fn read_dir_into(dir: &Path, source: &Path, out: &mut Map<String, Value>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    // Directory iteration order is platform-dependent; sort for stable output.
    let mut paths: Vec<_> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        let key = sanitize_basename(&name);

        if path.is_dir() {
            let mut nested = Map::new();
            read_dir_into(&path, source, &mut nested);
            out.insert(key, Value::Object(nested));
        } else if is_data_file(&path) {
            let relative = path
                .strip_prefix(source)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let mut entry = Map::new();
            entry.insert("path".to_string(), Value::String(relative));
            out.insert(key, Value::Object(entry));
        }
    }
}

fn is_data_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| DATA_FILE_EXTENSIONS.contains(&ext.as_str()))
}

/// Sanitize a data-file basename into a lookup key: strip characters
/// outside `[\w\s-]`, then collapse whitespace runs into underscores.
fn sanitize_basename(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    let mut out = String::with_capacity(stripped.len());
    let mut in_space = false;
    for c in stripped.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}
