use clap::{Parser, Subcommand};
use cloudcannon_bridge::{collections, config, report, site::Site};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "cloudcannon-bridge")]
#[command(about = "Exports static site build metadata for the CloudCannon CMS")]
#[command(long_about = "\
Exports static site build metadata for the CloudCannon CMS

The host generator emits a site snapshot (one JSON document describing the
resolved site) after content discovery. This tool reads that snapshot plus a
small amount of filesystem context and produces the _cloudcannon/info.json
artifact the CMS consumes:

  - CMS configuration, normalized from cloudcannon.config.json/.yaml/.yml,
    legacy site-config keys, or computed defaults (in that priority order)
  - every collection with a resolved path and its classified documents
  - selected data sets, plus category and tag labels

Set CLOUDCANNON_CONFIG_PATH (or pass --config) to name an explicit CMS
configuration file instead of relying on discovery.")]
#[command(version = version_string())]
struct Cli {
    /// Site snapshot produced by the host generator
    #[arg(long, default_value = ".cloudcannon/site.json", global = true)]
    site: PathBuf,

    /// Site source directory (CMS config discovery, data-file scanning)
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Build output directory the artifact is written into
    #[arg(long, default_value = "_site", global = true)]
    output: PathBuf,

    /// Explicit CMS configuration file (overrides discovery and environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read the snapshot and write _cloudcannon/info.json
    Build,
    /// Run the full pipeline without writing the artifact
    Check,
    /// Print the normalized CMS configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let override_path = cli.config.clone().or_else(config::env_override);

    match cli.command {
        Command::Build => {
            let site = Site::from_path(&cli.site)?;
            let canonical = config::normalize(&site, &cli.source, override_path.as_deref());
            let assembled = collections::assemble(&site, &canonical, &cli.source);
            let info = report::build_info(&site, &canonical, assembled);

            let artifact = report::write_artifact(&cli.output, &info)?;
            print_summary(&info);
            println!("==> Wrote {}", artifact.display());
        }
        Command::Check => {
            let site = Site::from_path(&cli.site)?;
            let canonical = config::normalize(&site, &cli.source, override_path.as_deref());
            let assembled = collections::assemble(&site, &canonical, &cli.source);
            let info = report::build_info(&site, &canonical, assembled);

            print_summary(&info);
            println!("==> Snapshot is valid");
        }
        Command::Config => {
            let site = Site::from_path(&cli.site)?;
            let canonical = config::normalize(&site, &cli.source, override_path.as_deref());
            let json = serde_json::to_string_pretty(canonical.as_map())?;
            println!("{json}");
        }
    }

    Ok(())
}

/// One line per collection with its member count, then the data sets.
fn print_summary(info: &report::Info) {
    println!("Collections");
    for (name, members) in &info.collections {
        let count = members.as_array().map(Vec::len).unwrap_or(0);
        println!("    {name} ({count} files)");
    }

    if !info.data.is_empty() {
        println!("Data");
        for name in info.data.keys() {
            println!("    {name}");
        }
    }
}
