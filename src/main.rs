//! cohortgraph: build patient relationship graphs from a dataset file.
//!
//! # Usage
//!
//! ```bash
//! cohortgraph <input> [--view flat|hierarchy|chain] [--patient <id>]
//!             [--container <name>] [--summary] [--out <path>]
//! ```
//!
//! Graph JSON goes to stdout (or `--out`); logs go to stderr unless
//! `COHORTGRAPH_LOG_MODE=file`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cohortgraph::adapters::sanitize::SanitizingMakeWriter;
use cohortgraph::adapters::FileSource;
use cohortgraph::application::BuildReport;
use cohortgraph::ports::PatientSource;
use cohortgraph::{Container, GraphFilter, GraphOutput, GraphService, GraphView, WorkspaceConfig};

const USAGE: &str = "Usage: cohortgraph <input> [--view flat|hierarchy|chain] [--patient <id>] [--container <name>] [--summary] [--out <path>]";

struct Options {
    input: PathBuf,
    view: Option<GraphView>,
    filter: GraphFilter,
    summary: bool,
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct Document<'a> {
    #[serde(flatten)]
    graph: &'a GraphOutput,
    report: &'a BuildReport,
}

fn usage_exit() -> ! {
    eprintln!("{USAGE}");
    std::process::exit(2);
}

fn parse_args() -> Result<Options> {
    let mut args = std::env::args().skip(1);
    let mut input = None;
    let mut view = None;
    let mut filter = GraphFilter::default();
    let mut summary = false;
    let mut out = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--view" => {
                let v = args.next().unwrap_or_else(|| usage_exit());
                view = Some(v.parse::<GraphView>()?);
            }
            "--patient" => {
                let p = args.next().unwrap_or_default();
                if p.trim().is_empty() {
                    usage_exit();
                }
                filter.patient = Some(p);
            }
            "--container" => {
                let c = args.next().unwrap_or_else(|| usage_exit());
                filter.container = Some(c.parse::<Container>()?);
            }
            "--summary" => summary = true,
            "--out" => {
                let p = args.next().unwrap_or_default();
                if p.is_empty() {
                    usage_exit();
                }
                out = Some(PathBuf::from(p));
            }
            "-h" | "--help" => {
                println!(
                    "{USAGE}\n\nReads a JSON, YAML, CSV, TSV or spreadsheet patient file and writes the requested graph view (or a dataset summary) as JSON."
                );
                std::process::exit(0);
            }
            other if other.starts_with("--") => {
                eprintln!("Unknown arg: {other}");
                usage_exit();
            }
            _ if input.is_none() => input = Some(PathBuf::from(&arg)),
            _ => {
                eprintln!("Unexpected extra input: {arg}");
                usage_exit();
            }
        }
    }

    let Some(input) = input else {
        usage_exit();
    };

    Ok(Options {
        input,
        view,
        filter,
        summary,
        out,
    })
}

fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_mode = std::env::var("COHORTGRAPH_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, guard) = if log_mode == "file" {
        let log_file = std::env::var("COHORTGRAPH_LOG_FILE")
            .unwrap_or_else(|_| "cohortgraph.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as an open error below.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("opening log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    Ok(guard)
}

fn write_output(out: Option<&PathBuf>, json: &str) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote output");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let options = parse_args()?;
    let _guard = init_logging()?;

    let config = WorkspaceConfig::from_env_or_default();
    let service = GraphService::from_config(&config)?;

    let source = FileSource::open(&options.input, config.limits)?;
    let dataset = source
        .load()
        .with_context(|| format!("loading {}", options.input.display()))?;

    if dataset.is_empty() {
        tracing::warn!("Input contains no patients");
    }

    let json = if options.summary {
        if !options.filter.is_empty() {
            bail!("--summary cannot be combined with --patient or --container");
        }
        serde_json::to_string_pretty(&service.summarize(&dataset))?
    } else {
        let view = options.view.unwrap_or(config.default_view);
        let (graph, report) = service.build(view, &dataset, &options.filter)?;
        tracing::info!(
            view = %view,
            patients = report.patients,
            nodes = report.nodes,
            edges = report.edges,
            dropped = report.mapping.dropped(),
            "Graph ready"
        );
        serde_json::to_string_pretty(&Document {
            graph: &graph,
            report: &report,
        })?
    };

    write_output(options.out.as_ref(), &json)
}
