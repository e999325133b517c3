//! CLI binary for jisui-arc2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, converts each archive, and appends to the run log.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use jisui_arc2pdf::pipeline::input::resolve_inputs;
use jisui_arc2pdf::report::{self, RunLog, DEFAULT_LOG_NAME};
use jisui_arc2pdf::{
    convert_archives_with, BindingDirection, ConversionConfig, ConversionOutcome,
    ConversionProgressCallback, OutcomeStatus, PageGeometry, PaperSize, ProgressCallback, Stage,
    TargetSize, ToolPaths, Toolchain,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar per archive: a spinner while extracting and discovering, then a
/// page counter for each encode pass.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: ProgressBar::hidden(),
        })
    }

    fn spinner(&self, prefix: &str, msg: &str) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.set_message(msg.to_string());
    }

    fn counter(&self, prefix: &str, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_archive_start(&self, name: &str, position: usize, batch_len: usize) {
        self.bar.reset();
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {} {}",
            cyan("◆"),
            dim(&format!("[{position}/{batch_len}]")),
            bold(name)
        ));
    }

    fn on_stage(&self, stage: Stage, pages: usize) {
        match stage {
            Stage::Extract => self.spinner("Extracting", "unpacking archive…"),
            Stage::Discover => self.spinner("Scanning", "identifying page images…"),
            Stage::Split => self.spinner("Splitting", &format!("{pages} pages")),
            Stage::Encode => self.counter("Converting", pages),
            Stage::Fallback => {
                self.bar.println(format!(
                    "  {} {}",
                    yellow("↺"),
                    dim("converted set larger; re-encoding originals")
                ));
                self.counter("Re-encoding", pages);
            }
            Stage::Assemble => self.spinner("Assembling", &format!("{pages} pages → PDF")),
        }
    }

    fn on_page_complete(&self, _index: usize, _total: usize, _bytes: u64) {
        self.bar.inc(1);
    }

    fn on_page_error(&self, index: usize, total: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_archive_complete(&self, outcome: &ConversionOutcome) {
        self.bar.finish_and_clear();
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        eprintln!("{}", summary_line(outcome));
    }
}

fn summary_line(outcome: &ConversionOutcome) -> String {
    match outcome.status {
        OutcomeStatus::Success | OutcomeStatus::SuccessWithSkips => {
            let mark = if outcome.skipped_pages == 0 {
                green("✔")
            } else {
                yellow("⚠")
            };
            let decision = outcome
                .selection
                .map(|s| {
                    let ratio = s
                        .ratio_percent()
                        .map(|r| format!(" {r:.1}%"))
                        .unwrap_or_default();
                    format!("{}{}", s.rendition, ratio)
                })
                .unwrap_or_default();
            let skipped = if outcome.skipped_pages > 0 {
                format!("  ({} skipped)", red(&outcome.skipped_pages.to_string()))
            } else {
                String::new()
            };
            format!(
                "{}  {}/{} pages{}  {}  {}ms  →  {}",
                mark,
                outcome.used_pages,
                outcome.discovered_pages,
                skipped,
                dim(&decision),
                outcome.duration_ms,
                bold(
                    &outcome
                        .output
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                ),
            )
        }
        OutcomeStatus::Failed | OutcomeStatus::RetryableFailure => format!(
            "{}  {}  {}",
            red("✘"),
            outcome.archive.display(),
            red(outcome.failure.as_deref().unwrap_or("unknown error"))
        ),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every zip in the current directory (A4 @ 144 dpi, quality 85)
  arc2pdf "*.zip"

  # Trim borders, straighten pages, and split two-page spreads (manga order)
  arc2pdf --trim --deskew --split-spreads --binding right book.cbz

  # Western book, left-to-right spreads, B5 at 300 dpi
  arc2pdf --split-spreads --binding left --paper B5 --dpi 300 scans.7z

  # Only accept the converted set if it is under half the original size
  arc2pdf --compression-threshold 50 archive.rar

  # Crisper grayscale pages, automatic contrast on colour pages
  arc2pdf --grayscale-level "10%,90%" --auto-contrast volume01.zip

  # Web-ready output on a fixed page size
  arc2pdf --page-size A4 --linearize book.zip

SELECTION:
  Every page is converted (resized, normalised). If the converted pages
  together are not smaller than the originals (+2% allowance, or under
  --compression-threshold percent if given), the originals are re-encoded
  without resizing and used instead. The choice is per archive, never per page.

ENVIRONMENT VARIABLES:
  ARC2PDF_SEVENZIP_PATH   Path to 7z / 7z.exe
  ARC2PDF_MAGICK_PATH     Path to magick / magick.exe
  ARC2PDF_PDFCPU_PATH     Path to pdfcpu / pdfcpu.exe
  ARC2PDF_QPDF_PATH       Path to qpdf / qpdf.exe (only for --linearize)
  RUST_LOG                Override log filtering (e.g. jisui_arc2pdf=debug)

TOOLS:
  Each tool is looked up from its --*-path flag, then the variable above,
  then the directory holding arc2pdf, then PATH.
"#;

/// Convert archives of scanned page images into PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "arc2pdf",
    version,
    about = "Convert archives of scanned page images into compact PDF documents",
    long_about = "Convert archives of scanned page images (zip, rar, 7z, cbz, …) into one PDF \
per archive. Pages are naturally ordered, optionally split, deskewed and trimmed, resized to a \
target height, and encoded as grayscale or colour by measured saturation.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Archive files or glob patterns.
    archives: Vec<String>,

    /// Write documents here instead of next to each archive.
    #[arg(short, long, env = "ARC2PDF_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// JPEG quality (1–100).
    #[arg(short, long, env = "ARC2PDF_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Saturation below which a page is encoded as grayscale (0–1).
    #[arg(long, env = "ARC2PDF_SATURATION_THRESHOLD", default_value_t = 0.05)]
    saturation_threshold: f64,

    /// Target page height in pixels (overrides --paper/--dpi).
    #[arg(long, env = "ARC2PDF_HEIGHT")]
    height: Option<u32>,

    /// Paper size for the target height (A0–A7, B0–B7). Requires --dpi.
    #[arg(long, env = "ARC2PDF_PAPER")]
    paper: Option<PaperSize>,

    /// Pixel density stamped on pages (and used with --paper).
    #[arg(long, env = "ARC2PDF_DPI")]
    dpi: Option<u32>,

    /// Use converted pages only if they total under this percentage of the originals.
    #[arg(long, env = "ARC2PDF_COMPRESSION_THRESHOLD")]
    compression_threshold: Option<f64>,

    /// Remove uniform borders.
    #[arg(long, env = "ARC2PDF_TRIM")]
    trim: bool,

    /// Colour tolerance for --trim.
    #[arg(long, env = "ARC2PDF_FUZZ", default_value = "1%")]
    fuzz: String,

    /// Straighten rotated scans.
    #[arg(long, env = "ARC2PDF_DESKEW")]
    deskew: bool,

    /// Split two-page spreads into single pages.
    #[arg(long, env = "ARC2PDF_SPLIT_SPREADS")]
    split_spreads: bool,

    /// Binding edge: right (right-to-left reading) or left.
    #[arg(long, env = "ARC2PDF_BINDING", value_enum, default_value = "right")]
    binding: BindingArg,

    /// Level for grayscale pages, e.g. "10%,90%".
    #[arg(long, env = "ARC2PDF_GRAYSCALE_LEVEL")]
    grayscale_level: Option<String>,

    /// Brightness/contrast for colour pages, e.g. "0x25".
    #[arg(long, env = "ARC2PDF_COLOR_CONTRAST")]
    color_contrast: Option<String>,

    /// Normalise colour pages automatically (wins over --color-contrast).
    #[arg(long, env = "ARC2PDF_AUTO_CONTRAST")]
    auto_contrast: bool,

    /// Page geometry: none, auto, or a paper size such as A4, B5L.
    #[arg(long, env = "ARC2PDF_PAGE_SIZE", default_value = "none")]
    page_size: PageGeometry,

    /// Linearise the result for progressive loading (requires qpdf).
    #[arg(long, env = "ARC2PDF_LINEARIZE")]
    linearize: bool,

    /// Skip the structural optimisation pass.
    #[arg(long, env = "ARC2PDF_SKIP_OPTIMIZATION")]
    skip_optimization: bool,

    /// Pages encoded concurrently.
    #[arg(short = 'j', long, env = "ARC2PDF_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Archive extraction timeout in seconds.
    #[arg(long, env = "ARC2PDF_EXTRACT_TIMEOUT", default_value_t = 300)]
    extract_timeout: u64,

    /// Timeout for every other tool call in seconds.
    #[arg(long, env = "ARC2PDF_TOOL_TIMEOUT", default_value_t = 120)]
    tool_timeout: u64,

    /// Parent directory for temporary working directories.
    #[arg(long, env = "ARC2PDF_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Path to 7z.
    #[arg(long = "7z-path")]
    sevenzip_path: Option<PathBuf>,

    /// Path to magick.
    #[arg(long)]
    magick_path: Option<PathBuf>,

    /// Path to pdfcpu.
    #[arg(long)]
    pdfcpu_path: Option<PathBuf>,

    /// Path to qpdf.
    #[arg(long)]
    qpdf_path: Option<PathBuf>,

    /// Log file, or a directory to hold arc2pdf_log.txt.
    #[arg(long, env = "ARC2PDF_LOG_PATH")]
    log_path: Option<PathBuf>,

    /// Print outcomes as JSON on stdout.
    #[arg(long, env = "ARC2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ARC2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ARC2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long, env = "ARC2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BindingArg {
    Right,
    Left,
}

impl From<BindingArg> for BindingDirection {
    fn from(v: BindingArg) -> Self {
        match v {
            BindingArg::Right => BindingDirection::RightEdge,
            BindingArg::Left => BindingDirection::LeftEdge,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // ── Interactive prompting ────────────────────────────────────────────
    if cli.archives.is_empty() {
        if io::stdin().is_terminal() {
            prompt_interactive(&mut cli).context("Failed to read answers")?;
        } else {
            Cli::command().print_help().ok();
            eprintln!();
            std::process::exit(2);
        }
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && io::stderr().is_terminal();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and locate tools ────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let paths = ToolPaths {
        sevenzip: cli.sevenzip_path.clone(),
        magick: cli.magick_path.clone(),
        pdfcpu: cli.pdfcpu_path.clone(),
        qpdf: cli.qpdf_path.clone(),
    };
    let tools = Toolchain::discover(&paths, &config).context("Required tool missing")?;

    let archives = resolve_inputs(&cli.archives).context("Nothing to convert")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let log = RunLog::resolve(cli.log_path.as_deref(), DEFAULT_LOG_NAME);
    let invocation = report::invocation_line(std::env::args());
    let settings = config.settings_summary();

    let outcomes = convert_archives_with(&archives, &config, &tools, |outcome| {
        log.record(&report::conversion_record(
            &invocation,
            outcome,
            &settings,
            chrono::Local::now(),
        ));
        if !show_progress && !cli.quiet && !cli.json {
            eprintln!("{}", summary_line(outcome));
        }
    })
    .await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcomes).context("Failed to serialise outcomes")?
        );
    }

    if !cli.quiet && outcomes.len() > 1 {
        let ok = outcomes.iter().filter(|o| o.is_success()).count();
        let retry = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::RetryableFailure)
            .count();
        eprintln!(
            "{} {}/{} archives converted{}",
            if ok == outcomes.len() { green("✔") } else { yellow("⚠") },
            bold(&ok.to_string()),
            outcomes.len(),
            if retry > 0 {
                format!("  ({retry} locked; close the open PDF and re-run)")
            } else {
                String::new()
            }
        );
    }
    if !cli.quiet {
        eprintln!("{}", dim(&format!("log: {}", log.path().display())));
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let target = TargetSize::resolve(cli.height, cli.paper, cli.dpi).context("Invalid target size")?;

    let mut builder = ConversionConfig::builder()
        .quality(cli.quality)
        .saturation_threshold(cli.saturation_threshold)
        .target(target)
        .compression_threshold(cli.compression_threshold)
        .trim(cli.trim)
        .fuzz(cli.fuzz.clone())
        .deskew(cli.deskew)
        .split_spreads(cli.split_spreads)
        .binding(cli.binding.into())
        .auto_contrast(cli.auto_contrast)
        .page_geometry(cli.page_size)
        .linearize(cli.linearize)
        .skip_optimization(cli.skip_optimization)
        .concurrency(cli.concurrency)
        .extract_timeout_secs(cli.extract_timeout)
        .tool_timeout_secs(cli.tool_timeout);

    if let Some(ref level) = cli.grayscale_level {
        builder = builder.grayscale_level(level.clone());
    }
    if let Some(ref contrast) = cli.color_contrast {
        builder = builder.color_contrast(contrast.clone());
    }
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir.clone());
    }
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

// ── Interactive prompting ────────────────────────────────────────────────────

/// Ask for archives and the main settings; an empty answer keeps the default.
fn prompt_interactive(cli: &mut Cli) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut ask = |question: &str, default: &str| -> io::Result<String> {
        if default.is_empty() {
            eprint!("{} ", bold(question));
        } else {
            eprint!("{} {} ", bold(question), dim(&format!("[{default}]")));
        }
        io::stderr().flush()?;
        let answer = lines.next().transpose()?.unwrap_or_default();
        let answer = answer.trim();
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer.to_string()
        })
    };

    eprintln!("{}", cyan("arc2pdf: no archives given, answering a few questions."));
    loop {
        let path = ask("Archive path or pattern (empty line to finish):", "")?;
        if path.is_empty() {
            break;
        }
        // Drag-and-drop on Windows wraps paths in quotes.
        cli.archives.push(path.trim_matches('"').to_string());
    }
    if cli.archives.is_empty() {
        eprintln!("{}", red("No archives entered."));
        std::process::exit(2);
    }

    if let Ok(q) = ask("Quality (1-100):", &cli.quality.to_string())?.parse::<u8>() {
        cli.quality = q.clamp(1, 100);
    }
    let resolved = resolved_height(cli);
    let answer = ask("Target height in pixels:", &resolved.to_string())?;
    cli.height = height_answer(&answer, resolved, cli.height);
    cli.trim = yes(&ask("Trim borders? (y/n)", if cli.trim { "y" } else { "n" })?);
    cli.deskew = yes(&ask("Deskew? (y/n)", if cli.deskew { "y" } else { "n" })?);
    cli.split_spreads = yes(&ask(
        "Split two-page spreads? (y/n)",
        if cli.split_spreads { "y" } else { "n" },
    )?);
    if cli.split_spreads {
        let binding = ask("Binding edge (right/left):", "right")?;
        cli.binding = if binding.eq_ignore_ascii_case("left") {
            BindingArg::Left
        } else {
            BindingArg::Right
        };
    }
    Ok(())
}

fn yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Height the current flags resolve to, including `--paper`/`--dpi`.
fn resolved_height(cli: &Cli) -> u32 {
    TargetSize::resolve(cli.height, cli.paper, cli.dpi)
        .map(|t| t.height)
        .unwrap_or_else(|_| TargetSize::default().height)
}

/// Explicit height from a prompt answer. Accepting the shown default keeps
/// whatever the flags resolved to.
fn height_answer(answer: &str, resolved: u32, current: Option<u32>) -> Option<u32> {
    match answer.trim().parse::<u32>() {
        Ok(h) if h != resolved => Some(h),
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_default_keeps_paper_and_dpi() {
        let cli = Cli::parse_from(["arc2pdf", "--paper", "b5", "--dpi", "300"]);
        let resolved = resolved_height(&cli);
        assert_ne!(resolved, TargetSize::default().height);
        assert_eq!(height_answer(&resolved.to_string(), resolved, cli.height), None);

        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.target.height, resolved);
        assert_eq!(config.target.density, 300);
    }

    #[test]
    fn typed_height_overrides() {
        assert_eq!(height_answer("2000", 1683, None), Some(2000));
        assert_eq!(height_answer("abc", 1683, Some(1500)), Some(1500));
        assert_eq!(height_answer("1683", 1683, Some(1683)), Some(1683));
    }
}
