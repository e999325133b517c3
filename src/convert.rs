//! Per-archive conversion entry points.
//!
//! [`convert_archive`] never returns `Err`: every archive-level failure is
//! absorbed into a failed [`ConversionOutcome`] so a batch can carry on with
//! the next archive. Run-level failures (missing tools, bad settings) are
//! raised earlier, by [`Toolchain::discover`] and
//! [`ConversionConfigBuilder::build`](crate::config::ConversionConfigBuilder::build).
//!
//! Each archive gets a private working directory (`arc2pdf_*`) that is
//! removed when the archive finishes, on every exit path:
//!
//! ```text
//! arc2pdf_XXXX/
//!   extracted/     archive contents
//!   split/         spread halves
//!   converted/     primary pass, 0000.jpg …
//!   passthrough/   fallback pass, 0000.jpg …
//!   temp.pdf       assembled document
//! ```

use crate::config::ConversionConfig;
use crate::error::{Arc2PdfError, ToolError};
use crate::output::{ConversionOutcome, OutcomeStatus, PageRecord, PageStatus, Rendition};
use crate::page::{PageSet, SourcePage};
use crate::pipeline::{assemble, discover, encode, input, select, split};
use crate::progress::Stage;
use crate::tools::Toolchain;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{error, info, warn};

/// What an archive run learned before it stopped; kept for failed outcomes.
#[derive(Default)]
struct RunState {
    discovered: usize,
    records: Vec<PageRecord>,
}

/// Convert one archive into a document.
///
/// The document is written to [`ConversionConfig::output_dir`] or next to
/// the archive, named after the archive's stem.
pub async fn convert_archive(
    archive: &Path,
    config: &ConversionConfig,
    tools: &Toolchain,
) -> ConversionOutcome {
    run_archive(archive, 1, 1, config, tools).await
}

/// Convert `archives` one at a time, in order.
pub async fn convert_archives(
    archives: &[PathBuf],
    config: &ConversionConfig,
    tools: &Toolchain,
) -> Vec<ConversionOutcome> {
    convert_archives_with(archives, config, tools, |_| {}).await
}

/// Like [`convert_archives`], calling `on_outcome` as soon as each archive
/// finishes (e.g. to append to the run log before the next one starts).
pub async fn convert_archives_with<F>(
    archives: &[PathBuf],
    config: &ConversionConfig,
    tools: &Toolchain,
    mut on_outcome: F,
) -> Vec<ConversionOutcome>
where
    F: FnMut(&ConversionOutcome),
{
    let mut outcomes = Vec::with_capacity(archives.len());
    for (i, archive) in archives.iter().enumerate() {
        let outcome = run_archive(archive, i + 1, archives.len(), config, tools).await;
        on_outcome(&outcome);
        outcomes.push(outcome);
    }
    outcomes
}

/// Synchronous wrapper around [`convert_archive`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_archive_sync(
    archive: &Path,
    config: &ConversionConfig,
    tools: &Toolchain,
) -> Result<ConversionOutcome, Arc2PdfError> {
    Ok(tokio::runtime::Runtime::new()
        .map_err(|e| Arc2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_archive(archive, config, tools)))
}

async fn run_archive(
    archive: &Path,
    position: usize,
    batch_len: usize,
    config: &ConversionConfig,
    tools: &Toolchain,
) -> ConversionOutcome {
    let start = Instant::now();
    let name = crate::page::file_name(archive);
    info!("[{}/{}] Converting {}", position, batch_len, archive.display());
    if let Some(ref cb) = config.progress_callback {
        cb.on_archive_start(&name, position, batch_len);
    }

    let mut state = RunState::default();
    let outcome = match process_archive(archive, config, tools, &mut state, start).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}: {}", archive.display(), e);
            ConversionOutcome::failed(
                archive.to_path_buf(),
                &e,
                state.discovered,
                state.records,
                start.elapsed().as_millis() as u64,
            )
        }
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_archive_complete(&outcome);
    }
    outcome
}

async fn process_archive(
    archive: &Path,
    config: &ConversionConfig,
    tools: &Toolchain,
    state: &mut RunState,
    start: Instant,
) -> Result<ConversionOutcome, Arc2PdfError> {
    if !archive.is_file() {
        return Err(Arc2PdfError::ArchiveNotFound {
            path: archive.to_path_buf(),
        });
    }

    // Dropped (and deleted) on every return below.
    let work = create_work_dir(config)?;
    let work_dir = work.path();
    let stage = |s: Stage, pages: usize| {
        if let Some(ref cb) = config.progress_callback {
            cb.on_stage(s, pages);
        }
    };

    // ── Step 1: Extract ──────────────────────────────────────────────────
    stage(Stage::Extract, 0);
    let extracted = work_dir.join("extracted");
    tokio::fs::create_dir_all(&extracted)
        .await
        .map_err(|e| Arc2PdfError::Internal(format!("Cannot create work dir: {e}")))?;
    tools
        .archiver
        .extract(
            archive,
            &extracted,
            Duration::from_secs(config.extract_timeout_secs),
        )
        .await
        .map_err(|e| match e {
            ToolError::Timeout { secs, .. } => Arc2PdfError::ExtractionTimeout {
                path: archive.to_path_buf(),
                secs,
            },
            other => Arc2PdfError::ExtractionFailed {
                path: archive.to_path_buf(),
                detail: other.to_string(),
            },
        })?;

    // ── Step 2: Discover ─────────────────────────────────────────────────
    stage(Stage::Discover, 0);
    let pages = discover::discover_pages(
        &extracted,
        &discover::intermediate_dirs(work_dir),
        archive,
        tools.raster.as_ref(),
        config,
    )
    .await?;
    state.discovered = pages.len();

    // ── Step 3: Split spreads ────────────────────────────────────────────
    let pages = if config.split_spreads {
        stage(Stage::Split, pages.len());
        let (pages, dropped) =
            split::split_spreads(pages, tools.raster.as_ref(), config, &work_dir.join("split")).await;
        state.records.extend(dropped);
        pages
    } else {
        pages
    };
    if pages.is_empty() {
        return Err(Arc2PdfError::NoPagesPrepared {
            skipped: state.records.len(),
        });
    }

    // ── Step 4: Primary encode ───────────────────────────────────────────
    stage(Stage::Encode, pages.len());
    let total = pages.len();
    let primary = encode::encode_pages(
        tools.raster.as_ref(),
        jobs(pages),
        config,
        &work_dir.join("converted"),
        Rendition::Converted,
    )
    .await;
    let first_error = primary.failures.first().map(|(_, e)| e.to_string());
    record_failures(state, primary.failures);

    if primary.candidates.is_empty() {
        return Err(Arc2PdfError::NoPagesEncoded {
            total,
            first_error: first_error.unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    let converted_pages = primary.candidates.len();

    // ── Step 5: Select ───────────────────────────────────────────────────
    let selection = select::select_rendition(&primary.candidates, config);

    let set = match selection.rendition {
        Rendition::Converted => {
            PageSet::new(Rendition::Converted, primary.candidates, state.records.len())?
        }
        Rendition::Original => {
            stage(Stage::Fallback, primary.candidates.len());
            let fallback_jobs = primary
                .candidates
                .into_iter()
                .map(|c| (c.source, Some(c.saturation)))
                .collect();
            let fallback = encode::encode_pages(
                tools.raster.as_ref(),
                fallback_jobs,
                config,
                &work_dir.join("passthrough"),
                Rendition::Original,
            )
            .await;
            record_failures(state, fallback.failures);
            PageSet::new(Rendition::Original, fallback.candidates, state.records.len())?
        }
    };
    let fallback_pages = match set.rendition() {
        Rendition::Original => set.len(),
        Rendition::Converted => 0,
    };

    // ── Step 6: Assemble ─────────────────────────────────────────────────
    stage(Stage::Assemble, set.len());
    let destination = input::output_path_for(archive, config.output_dir.as_deref(), "pdf");
    let output = assemble::assemble(tools, &set, config, work_dir, archive, &destination).await?;

    // ── Step 7: Outcome ──────────────────────────────────────────────────
    let mut pages: Vec<PageRecord> = set
        .pages()
        .iter()
        .map(|c| PageRecord::included(c, set.rendition()))
        .collect();
    pages.append(&mut state.records);
    pages.sort_by_key(|r| (r.source_index, r.index.unwrap_or(usize::MAX)));

    let skipped_pages = pages
        .iter()
        .filter(|r| r.status == PageStatus::Skipped)
        .count();
    let status = if skipped_pages > 0 {
        warn!("{} page(s) skipped in {}", skipped_pages, archive.display());
        OutcomeStatus::SuccessWithSkips
    } else {
        OutcomeStatus::Success
    };

    let outcome = ConversionOutcome {
        archive: archive.to_path_buf(),
        status,
        discovered_pages: state.discovered,
        converted_pages,
        fallback_pages,
        skipped_pages,
        used_pages: set.len(),
        selection: Some(selection),
        output: Some(output),
        failure: None,
        pages,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {}/{} pages used, {} skipped, {}ms",
        outcome.used_pages, outcome.discovered_pages, outcome.skipped_pages, outcome.duration_ms
    );
    Ok(outcome)
}

fn create_work_dir(config: &ConversionConfig) -> Result<TempDir, Arc2PdfError> {
    let parent = config
        .work_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&parent)
        .and_then(|_| tempfile::Builder::new().prefix("arc2pdf_").tempdir_in(&parent))
        .map_err(|e| {
            Arc2PdfError::Internal(format!(
                "Cannot create working directory in '{}': {e}",
                parent.display()
            ))
        })
}

fn jobs(pages: Vec<SourcePage>) -> Vec<(SourcePage, Option<f64>)> {
    pages.into_iter().map(|p| (p, None)).collect()
}

fn record_failures(state: &mut RunState, failures: Vec<(SourcePage, crate::error::PageError)>) {
    state.records.extend(
        failures
            .into_iter()
            .map(|(page, err)| PageRecord::skipped(&page, Some(page.index), err)),
    );
}
