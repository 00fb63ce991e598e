//! # CloudCannon Bridge
//!
//! Exports static site build metadata as JSON for the CloudCannon CMS.
//! The host generator owns content discovery and rendering; after its
//! discovery pass it emits a **site snapshot**, one JSON document with the
//! resolved configuration, pages, documents, static files, and data tree,
//! and this crate turns that into the `_cloudcannon/info.json` artifact the
//! CMS consumes.
//!
//! # Architecture: One Pass, Four Stages
//!
//! A build is a single synchronous pass over the snapshot:
//!
//! ```text
//! 1. Normalize   config file / legacy keys / defaults → CanonicalConfig
//! 2. Assemble    collection set + classified members   (collections)
//! 3. Serialize   nodes → depth-bounded JSON values     (serializer)
//! 4. Report      info.json written to the output dir   (report)
//! ```
//!
//! The separation exists for three reasons:
//!
//! - **Totality**: serialization never fails; depth overflows and
//!   unrepresentable values degrade into visible markers, so one odd data
//!   shape cannot take down a site build.
//! - **Priority is explicit**: configuration merging is strict precedence
//!   (explicit file > legacy keys > computed defaults), resolved once and
//!   passed along as a value, never mutated behind the pipeline's back.
//! - **Testability**: every stage is a function from inputs to values; unit
//!   tests drive them with in-memory snapshots and scratch directories.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`site`] | Site snapshot model, host capability detection, front-matter defaults lookup |
//! | [`config`] | CMS config normalization: file discovery, legacy fallback, defaults, key renames |
//! | [`collections`] | Collection assembly and longest-prefix content classification |
//! | [`serializer`] | Depth-bounded, exclusion-aware node/value serialization |
//! | [`report`] | Final `info.json` assembly and artifact output |
//! | [`paths`] | Pure directory-path resolvers from site configuration |
//! | [`reader`] | Data-directory presence scanning (path-only, never parsed) |
//! | [`logger`] | Tagged diagnostic lines (`cloudcannon:` prefix) |
//!
//! # Design Decisions
//!
//! ## A Snapshot, Not a Live Object Graph
//!
//! The bridge runs as its own stage instead of hooking into the generator's
//! process. The stage boundary is a JSON document, which keeps the host
//! integration down to "serialize what you already know" and makes every
//! pipeline stage reproducible from a file on disk. The only extra
//! filesystem context the bridge reads for itself is the CMS config file
//! and a data-directory listing.
//!
//! ## Total Serialization
//!
//! CMS tooling would rather see `"MAXIMUM_DEPTH"` or `"UNSUPPORTED:tag"`
//! markers than lose a whole build to one pathological value. The
//! serializer is therefore infallible by construction: recursion is depth-
//! bounded (cyclic or absurdly deep data cannot hang the build), and YAML
//! shapes JSON cannot express degrade into marker strings at ingestion.
//!
//! ## Capabilities Over Version Sniffing
//!
//! Old 2.x hosts differ in how posts, static files, and the collections
//! directory behave. Those differences are detected once, from the
//! generator version in the snapshot, into [`site::HostCapabilities`];
//! everything downstream branches on capability flags.

pub mod collections;
pub mod config;
pub mod logger;
pub mod paths;
pub mod reader;
pub mod report;
pub mod serializer;
pub mod site;
