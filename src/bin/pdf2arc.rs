//! CLI binary for the inverse direction: documents back to zip archives.

use anyhow::{Context, Result};
use clap::Parser;
use jisui_arc2pdf::pipeline::input::resolve_inputs;
use jisui_arc2pdf::repack::DEFAULT_OUTPUT_DIR;
use jisui_arc2pdf::report::{self, RunLog, DEFAULT_REPACK_LOG_NAME};
use jisui_arc2pdf::{repack_document, RepackConfig, RepackStatus, RepackToolchain, ToolPaths};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

/// Pull the page images out of PDF documents and pack them as zip archives.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2arc",
    version,
    about = "Extract page images from PDF documents into zip archives",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Documents or glob patterns.
    #[arg(required = true)]
    documents: Vec<String>,

    /// Directory receiving the archives.
    #[arg(short, long, env = "PDF2ARC_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Image extraction timeout in seconds.
    #[arg(long, env = "PDF2ARC_EXTRACT_TIMEOUT", default_value_t = 300)]
    extract_timeout: u64,

    /// Timeout for packing in seconds.
    #[arg(long, env = "PDF2ARC_TOOL_TIMEOUT", default_value_t = 120)]
    tool_timeout: u64,

    /// Parent directory for temporary working directories.
    #[arg(long, env = "PDF2ARC_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Path to 7z.
    #[arg(long = "7z-path")]
    sevenzip_path: Option<PathBuf>,

    /// Path to pdfcpu.
    #[arg(long)]
    pdfcpu_path: Option<PathBuf>,

    /// Log file, or a directory to hold pdf2arc_log.txt.
    #[arg(long, env = "PDF2ARC_LOG_PATH")]
    log_path: Option<PathBuf>,

    /// Print outcomes as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let paths = ToolPaths {
        sevenzip: cli.sevenzip_path.clone(),
        pdfcpu: cli.pdfcpu_path.clone(),
        ..ToolPaths::default()
    };
    let tools = RepackToolchain::discover(&paths, Duration::from_secs(cli.tool_timeout))
        .context("Required tool missing")?;
    let documents = resolve_inputs(&cli.documents).context("Nothing to repack")?;

    let config = RepackConfig {
        output_dir: cli.output_dir.clone(),
        extract_timeout_secs: cli.extract_timeout,
        work_dir: cli.work_dir.clone(),
        ..RepackConfig::default()
    };
    let log = RunLog::resolve(cli.log_path.as_deref(), DEFAULT_REPACK_LOG_NAME);
    let chatty = !cli.quiet && !cli.json;
    let invocation = report::invocation_line(std::env::args());

    let mut outcomes = Vec::with_capacity(documents.len());
    for (i, document) in documents.iter().enumerate() {
        if chatty {
            eprintln!(
                "{} {}",
                dim(&format!("[{}/{}]", i + 1, documents.len())),
                document.display()
            );
        }
        let outcome = repack_document(document, &config, &tools).await;
        log.record(&report::repack_record(
            &invocation,
            &outcome,
            chrono::Local::now(),
        ));

        if chatty {
            let line = match outcome.status {
                RepackStatus::Success => format!(
                    "  {} {} images → {}",
                    green("✔"),
                    outcome.images,
                    outcome
                        .output
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                ),
                RepackStatus::Skipped => format!("  {} no images found", yellow("–")),
                RepackStatus::Failed => format!(
                    "  {} {}",
                    red("✘"),
                    red(outcome.failure.as_deref().unwrap_or("unknown error"))
                ),
            };
            eprintln!("{line}");
        }
        outcomes.push(outcome);
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcomes).context("Failed to serialise outcomes")?
        );
    }
    if chatty && io::stderr().is_terminal() {
        eprintln!("{}", dim(&format!("log: {}", log.path().display())));
    }
    Ok(())
}
