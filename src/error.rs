//! Error types for the jisui-arc2pdf library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`Arc2PdfError`]: **Fatal**: the run (missing tool, bad settings) or
//!   the current archive (extraction failed, nothing to assemble) cannot
//!   proceed. Archive-scoped variants are absorbed by
//!   [`crate::convert::convert_archive`] into a failed
//!   [`crate::output::ConversionOutcome`]; only run-scoped variants reach
//!   the caller as `Err`.
//!
//! * [`PageError`]: **Non-fatal**: one page could not be measured, split
//!   or encoded. Stored inside [`crate::output::PageRecord`]; the archive
//!   continues with its remaining pages.
//!
//! * [`ToolError`]: the raw failure of one external-process invocation.
//!   Stages translate it into one of the two types above depending on the
//!   scope they run in.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the jisui-arc2pdf library.
#[derive(Debug, Error)]
pub enum Arc2PdfError {
    // ── Run-level errors ──────────────────────────────────────────────────
    /// A required external executable could not be located.
    #[error(transparent)]
    ToolNotFound(#[from] tool_locate::LocateError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A fuzz, level or contrast value is malformed.
    #[error("Invalid {kind} value '{value}': expected {expected}")]
    InvalidTransformSpec {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },

    /// None of the supplied paths or patterns matched a file.
    #[error("No input files found for: {patterns}")]
    NoInputs { patterns: String },

    // ── Archive-level errors ──────────────────────────────────────────────
    /// The archive path does not exist.
    #[error("Archive not found: '{path}'")]
    ArchiveNotFound { path: PathBuf },

    /// The archive extractor exited with an error.
    #[error("Failed to extract '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },

    /// The archive extractor did not finish in time.
    #[error("Extraction of '{path}' timed out after {secs}s")]
    ExtractionTimeout { path: PathBuf, secs: u64 },

    /// The archive contained no file the raster engine recognises.
    #[error("No pages found in '{path}'")]
    NoPagesFound { path: PathBuf },

    /// Every page failed during the primary encode pass.
    #[error("All {total} pages failed to encode.\nFirst error: {first_error}")]
    NoPagesEncoded { total: usize, first_error: String },

    /// The selected rendition left nothing to put in the document.
    #[error("No pages were prepared for assembly ({skipped} skipped)")]
    NoPagesPrepared { skipped: usize },

    /// Document import, optimisation or linearisation failed.
    #[error("Document {stage} failed: {detail}")]
    AssemblyFailed { stage: &'static str, detail: String },

    /// The destination is held open by another process.
    ///
    /// Re-running the same archive once the file is released is enough; the
    /// pages do not need to be reprocessed by hand.
    #[error("Destination '{path}' is locked by another process; close it and retry")]
    DestinationLocked { path: PathBuf },

    /// Could not create, copy or rename an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Arc2PdfError {
    /// `true` when the operator can simply retry the same archive.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Arc2PdfError::DestinationLocked { .. })
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Width/height could not be read.
    #[error("Page {page}: dimensions unavailable: {detail}")]
    DimensionsUnavailable { page: usize, detail: String },

    /// A detected spread could not be cut into halves.
    #[error("Page {page}: spread split failed: {detail}")]
    SplitFailed { page: usize, detail: String },

    /// The raster engine rejected the transform chain.
    #[error("Page {page}: transform failed: {detail}")]
    TransformFailed { page: usize, detail: String },

    /// The raster engine did not finish in time.
    #[error("Page {page}: transform timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// Map a tool failure during encoding into a page error.
    pub(crate) fn from_transform(page: usize, err: ToolError) -> Self {
        match err {
            ToolError::Timeout { secs, .. } => PageError::Timeout { page, secs },
            other => PageError::TransformFailed {
                page,
                detail: other.to_string(),
            },
        }
    }
}

/// Failure of a single external-process invocation.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The process could not be started at all.
    #[error("could not run {program}: {detail}")]
    Spawn { program: String, detail: String },

    /// The process exited unsuccessfully.
    #[error("{program} exited with {code}: {stderr}")]
    Failed {
        program: String,
        code: String,
        stderr: String,
    },

    /// The process exceeded its wall-clock budget and was killed.
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// The process succeeded but printed something unexpected.
    #[error("{program} returned unparsable output '{output}'")]
    BadOutput { program: String, output: String },
}
