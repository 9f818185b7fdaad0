//! Taxonomy export utility.
//!
//! Writes the taxonomy currently in effect (built-in, or the file named by
//! `COHORTGRAPH_TAXONOMY_PATH`) as JSON, so it can be edited and loaded back.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin export_taxonomy -- [--out <path>] [--force]
//! ```
//!
//! Without `--out` the JSON goes to stdout.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use cohortgraph::WorkspaceConfig;

const USAGE: &str = "Usage: export_taxonomy [--out <path>] [--force]";

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut out_path: Option<PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out" => {
                let p = args.next().unwrap_or_default();
                if p.is_empty() {
                    eprintln!("{USAGE}");
                    std::process::exit(2);
                }
                out_path = Some(PathBuf::from(p));
            }
            "--force" => force = true,
            "-h" | "--help" => {
                println!(
                    "{USAGE}\n\nWrites the active taxonomy (container -> ordered labels) as JSON. Refuses to overwrite an existing file unless --force is given."
                );
                return Ok(());
            }
            _ => {
                eprintln!("Unknown arg: {arg}\n{USAGE}");
                std::process::exit(2);
            }
        }
    }

    let config = WorkspaceConfig::from_env_or_default();
    let taxonomy = config.load_taxonomy()?;
    let json = taxonomy.to_json_pretty()?;

    match out_path {
        Some(path) => {
            if path.exists() && !force {
                eprintln!(
                    "Refusing to overwrite existing file: {} (use --force)",
                    path.display()
                );
                std::process::exit(2);
            }
            std::fs::write(&path, format!("{json}\n"))
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "Wrote {} containers to {}",
                taxonomy.iter().count(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }

    Ok(())
}
