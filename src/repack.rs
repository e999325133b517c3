//! Document → archive: the inverse direction.
//!
//! Embedded page images are pulled out of a document with the document
//! tool and packed, in natural order, into `<output dir>/<stem>.zip`.

use crate::error::{Arc2PdfError, ToolError};
use crate::pipeline::{discover, input};
use crate::tools::RepackToolchain;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "pdf2arc_converted";

/// Settings for [`repack_document`].
#[derive(Debug, Clone)]
pub struct RepackConfig {
    pub output_dir: PathBuf,
    /// Wall-clock budget for image extraction in seconds. Default: 300.
    pub extract_timeout_secs: u64,
    /// Parent directory for temporary extraction directories.
    pub work_dir: Option<PathBuf>,
    pub sort_separators: String,
}

impl Default for RepackConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            extract_timeout_secs: 300,
            work_dir: None,
            sort_separators: " _-\u{3000}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepackStatus {
    Success,
    /// The document held no extractable images.
    Skipped,
    Failed,
}

impl fmt::Display for RepackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepackStatus::Success => "Success",
            RepackStatus::Skipped => "Skipped",
            RepackStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Result for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepackOutcome {
    pub document: PathBuf,
    pub status: RepackStatus,
    pub output: Option<PathBuf>,
    pub images: usize,
    pub failure: Option<String>,
}

/// Repack one document. Never fails; errors become a `Failed` outcome.
pub async fn repack_document(
    document: &Path,
    config: &RepackConfig,
    tools: &RepackToolchain,
) -> RepackOutcome {
    match try_repack(document, config, tools).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{}: {}", document.display(), e);
            RepackOutcome {
                document: document.to_path_buf(),
                status: RepackStatus::Failed,
                output: None,
                images: 0,
                failure: Some(e.to_string()),
            }
        }
    }
}

async fn try_repack(
    document: &Path,
    config: &RepackConfig,
    tools: &RepackToolchain,
) -> Result<RepackOutcome, Arc2PdfError> {
    if !document.is_file() {
        return Err(Arc2PdfError::ArchiveNotFound {
            path: document.to_path_buf(),
        });
    }

    let parent = config.work_dir.clone().unwrap_or_else(std::env::temp_dir);
    let work = tempfile::Builder::new()
        .prefix("pdf2arc_")
        .tempdir_in(&parent)
        .map_err(|e| Arc2PdfError::Internal(format!("Cannot create working directory: {e}")))?;
    let images_dir = work.path().join("images");
    tokio::fs::create_dir_all(&images_dir)
        .await
        .map_err(|e| Arc2PdfError::Internal(format!("Cannot create working directory: {e}")))?;

    tools
        .document
        .extract_images(
            document,
            &images_dir,
            Duration::from_secs(config.extract_timeout_secs),
        )
        .await
        .map_err(|e| match e {
            ToolError::Timeout { secs, .. } => Arc2PdfError::ExtractionTimeout {
                path: document.to_path_buf(),
                secs,
            },
            other => Arc2PdfError::ExtractionFailed {
                path: document.to_path_buf(),
                detail: other.to_string(),
            },
        })?;

    let mut files = discover::collect_files(&images_dir, &[])
        .map_err(|e| Arc2PdfError::Internal(format!("Cannot read extracted images: {e}")))?;
    if files.is_empty() {
        warn!("No images in {}, skipping", document.display());
        return Ok(RepackOutcome {
            document: document.to_path_buf(),
            status: RepackStatus::Skipped,
            output: None,
            images: 0,
            failure: None,
        });
    }
    discover::sort_naturally(&mut files, &images_dir, &config.sort_separators);

    let relative: Vec<PathBuf> = files
        .iter()
        .filter_map(|f| f.strip_prefix(&images_dir).ok().map(Path::to_path_buf))
        .collect();

    let write_err = |path: &Path, source: std::io::Error| Arc2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| write_err(&config.output_dir, e))?;
    let dest = input::output_path_for(document, Some(&config.output_dir), "zip");
    let dest = std::path::absolute(&dest).map_err(|e| write_err(&dest, e))?;
    // 7-Zip adds to an existing archive instead of replacing it.
    if dest.exists() {
        tokio::fs::remove_file(&dest)
            .await
            .map_err(|e| write_err(&dest, e))?;
    }

    tools
        .archiver
        .pack_zip(&images_dir, &relative, &dest)
        .await
        .map_err(|e| Arc2PdfError::AssemblyFailed {
            stage: "zip",
            detail: e.to_string(),
        })?;

    info!("Packed {} image(s) into {}", relative.len(), dest.display());
    Ok(RepackOutcome {
        document: document.to_path_buf(),
        status: RepackStatus::Success,
        output: Some(dest),
        images: relative.len(),
        failure: None,
    })
}
