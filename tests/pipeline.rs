//! End-to-end pipeline tests: snapshot + site source in, artifact out.

use cloudcannon_bridge::{collections, config, report, site::Site};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Run the full pipeline against a source directory and return the parsed
/// artifact.
fn run_build(snapshot: Value, source_root: &Path) -> Value {
    let site: Site = serde_json::from_value(snapshot).unwrap();
    let canonical = config::normalize(&site, source_root, None);
    let assembled = collections::assemble(&site, &canonical, source_root);
    let info = report::build_info(&site, &canonical, assembled);

    let output = TempDir::new().unwrap();
    let artifact = report::write_artifact(output.path(), &info).unwrap();
    assert_eq!(artifact, output.path().join(report::ARTIFACT_PATH));

    let written = fs::read_to_string(&artifact).unwrap();
    serde_json::from_str(&written).unwrap()
}

fn blog_snapshot() -> Value {
    json!({
        "time": "2026-01-05T10:00:00+00:00",
        "generator": {
            "name": "jekyll",
            "version": "4.2.0",
            "environment": "production"
        },
        "config": {
            "source": "/site",
            "baseurl": "/blog",
            "timezone": "Etc/UTC",
            "collections": { "staff": { "output": true } }
        },
        "pages": [
            { "name": "index.md", "path": "index.md", "url": "/", "output_ext": ".html" },
            { "name": "feed.xml", "path": "feed.xml", "url": "/feed.xml", "output_ext": ".xml" }
        ],
        "static_files": [
            { "path": "404.html", "url": "/404.html", "extension": ".html" },
            { "path": "logo.png", "url": "/logo.png", "extension": ".png" }
        ],
        "collections": {
            "posts": [
                { "path": "_posts/2020-01-01-a.md", "url": "/blog/2020/01/01/a/",
                  "collection": "posts", "id": "/2020/01/01/a",
                  "data": { "title": "A", "content": "ignored" } },
                { "path": "other/_posts/2020-01-01-b.md", "url": "/blog/other/b/",
                  "collection": "posts", "data": { "title": "B" } }
            ],
            "staff": [
                { "path": "_staff/jane.md", "url": "/staff/jane/",
                  "collection": "staff", "data": { "name": "Jane" } }
            ]
        },
        "categories": ["news"],
        "tags": []
    })
}

#[test]
fn blog_build_produces_complete_artifact() {
    let source = TempDir::new().unwrap();
    fs::create_dir_all(source.path().join("_data")).unwrap();
    fs::write(source.path().join("_data/authors.yml"), "jane: {}\n").unwrap();

    let artifact = run_build(blog_snapshot(), source.path());

    // Identity and metadata.
    assert_eq!(artifact["time"], json!("2026-01-05T10:00:00+00:00"));
    assert_eq!(artifact["generator"]["name"], json!("jekyll"));
    assert_eq!(artifact["cloudcannon"]["name"], json!("cloudcannon-bridge"));
    assert_eq!(artifact["base_url"], json!("/blog"));
    assert_eq!(artifact["timezone"], json!("Etc/UTC"));

    // Collections: posts split by category folder, staff explicit, pages
    // strict-filtered, data backed by the on-disk file.
    let config = artifact["collections_config"].as_object().unwrap();
    assert!(config.contains_key("posts"));
    assert!(config.contains_key("other/posts"));
    assert!(config.contains_key("staff"));
    assert!(config.contains_key("pages"));
    assert!(config.contains_key("data"));
    assert!(!config.contains_key("drafts"));

    assert_eq!(config["other/posts"]["path"], json!("other/_posts"));
    assert_eq!(config["staff"]["path"], json!("_staff"));

    let posts = artifact["collections"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["path"], json!("_posts/2020-01-01-a.md"));
    assert_eq!(posts[0]["title"], json!("A"));
    assert_eq!(posts[0].get("content"), None);

    let split = artifact["collections"]["other/posts"].as_array().unwrap();
    assert_eq!(split.len(), 1);
    assert_eq!(split[0]["path"], json!("other/_posts/2020-01-01-b.md"));

    let pages: Vec<&str> = artifact["collections"]["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["path"].as_str().unwrap())
        .collect();
    assert_eq!(pages, vec!["index.md", "404.html"]);

    // Data selection defaults to the category/tag labels.
    assert_eq!(artifact["data"], json!({ "categories": ["news"], "tags": [] }));
}

#[test]
fn empty_site_collapses_to_pages_only() {
    let source = TempDir::new().unwrap();
    let snapshot = json!({
        "generator": { "name": "jekyll", "version": "4.2.0" },
        "pages": [
            { "name": "index.md", "path": "index.md", "url": "/", "output_ext": ".html" }
        ]
    });

    let artifact = run_build(snapshot, source.path());

    let config = artifact["collections_config"].as_object().unwrap();
    let names: Vec<&String> = config.keys().collect();
    assert_eq!(names, vec!["pages"]);
    assert_eq!(artifact["collections"].as_object().unwrap().len(), 1);
    assert!(artifact["collections"].get("data").is_none());
}

#[test]
fn cms_config_file_drives_the_artifact() {
    let source = TempDir::new().unwrap();
    fs::write(
        source.path().join("cloudcannon.config.yml"),
        concat!(
            "timezone: Pacific/Auckland\n",
            "_select_data:\n",
            "  news:\n",
            "    first: \"yes\"\n",
            "collections_config:\n",
            "  staff:\n",
            "    _sort_key: name\n",
        ),
    )
    .unwrap();

    let snapshot = json!({
        "generator": { "name": "jekyll", "version": "4.2.0" },
        "config": { "timezone": "Etc/UTC", "collections": { "staff": {} } },
        "collections": {
            "staff": [
                { "path": "_staff/jane.md", "url": "/staff/jane/", "collection": "staff" }
            ]
        }
    });

    let artifact = run_build(snapshot, source.path());

    // File beats the site config; legacy key spellings are canonicalized.
    assert_eq!(artifact["timezone"], json!("Pacific/Auckland"));
    assert_eq!(artifact["select_data"], json!({ "news": { "first": "yes" } }));
    assert_eq!(
        artifact["collections_config"]["staff"]["sort_key"],
        json!("name")
    );
}

#[test]
fn deep_front_matter_truncates_to_sentinel() {
    let source = TempDir::new().unwrap();

    let mut nested = json!("bottom");
    for _ in 0..20 {
        nested = json!({ "inner": nested });
    }
    let snapshot = json!({
        "generator": { "name": "jekyll", "version": "4.2.0" },
        "collections": {
            "posts": [
                { "path": "_posts/2020-01-01-a.md", "url": "/a/", "collection": "posts",
                  "data": { "deep": nested } }
            ]
        }
    });

    let artifact = run_build(snapshot, source.path());
    let rendered = serde_json::to_string(&artifact["collections"]["posts"]).unwrap();
    assert!(rendered.contains("MAXIMUM_DEPTH"));
    assert!(!rendered.contains("bottom"));
}
