//! Per-archive results handed to the reporter and returned to callers.

use crate::error::{Arc2PdfError, PageError};
use crate::page::{EncodedCandidate, SourcePage};
use crate::transform::ColorClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which of the two candidate renditions was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rendition {
    /// Resized, normalised candidates from the primary pass.
    Converted,
    /// Originals re-encoded through the same chain without resizing.
    Original,
}

impl fmt::Display for Rendition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendition::Converted => f.write_str("converted"),
            Rendition::Original => f.write_str("original"),
        }
    }
}

/// Which rule produced a [`Selection`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SelectionRule {
    /// Explicit percentage threshold.
    Threshold(f64),
    /// Default rule with its allowance factor.
    Allowance(f64),
    /// Original total was zero; the converted set is used.
    EmptyOriginal,
}

/// Aggregate size decision for one archive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub rendition: Rendition,
    pub original_bytes: u64,
    pub converted_bytes: u64,
    pub rule: SelectionRule,
}

impl Selection {
    /// `100 × converted / original`, if the original total is non-zero.
    pub fn ratio_percent(&self) -> Option<f64> {
        if self.original_bytes == 0 {
            None
        } else {
            Some(100.0 * self.converted_bytes as f64 / self.original_bytes as f64)
        }
    }
}

/// Final state of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStatus {
    /// Included from the converted set.
    Converted,
    /// Included from the re-encoded original set.
    Original,
    /// Excluded; see [`PageRecord::error`].
    Skipped,
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageStatus::Converted => f.write_str("Converted"),
            PageStatus::Original => f.write_str("Original"),
            PageStatus::Skipped => f.write_str("Skipped"),
        }
    }
}

/// Per-page line of a [`ConversionOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Discovery position of the archive entry this page came from.
    pub source_index: usize,
    /// Position in the post-split sequence; `None` when a spread was dropped.
    pub index: Option<usize>,
    pub name: String,
    pub status: PageStatus,
    pub original_bytes: u64,
    /// Size of the artifact that went into the document.
    pub output_bytes: Option<u64>,
    pub color: Option<ColorClass>,
    pub error: Option<PageError>,
}

impl PageRecord {
    /// A page excluded from the document because of `error`.
    pub fn skipped(page: &SourcePage, index: Option<usize>, error: PageError) -> Self {
        Self {
            source_index: page.source_index,
            index,
            name: page.name.clone(),
            status: PageStatus::Skipped,
            original_bytes: page.bytes,
            output_bytes: None,
            color: None,
            error: Some(error),
        }
    }

    /// A page that made it into the document from `rendition`.
    pub fn included(candidate: &EncodedCandidate, rendition: Rendition) -> Self {
        let status = match rendition {
            Rendition::Converted => PageStatus::Converted,
            Rendition::Original => PageStatus::Original,
        };
        Self {
            source_index: candidate.source.source_index,
            index: Some(candidate.source.index),
            name: candidate.source.name.clone(),
            status,
            original_bytes: candidate.source.bytes,
            output_bytes: Some(candidate.bytes),
            color: Some(candidate.color),
            error: None,
        }
    }

    /// Output size as a percentage of the source size.
    pub fn ratio_percent(&self) -> Option<f64> {
        match self.output_bytes {
            Some(out) if self.original_bytes > 0 => {
                Some(100.0 * out as f64 / self.original_bytes as f64)
            }
            _ => None,
        }
    }
}

/// Overall result of one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Success,
    SuccessWithSkips,
    Failed,
    /// Failed only because the destination was locked; retry as-is.
    RetryableFailure,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Success => "Success",
            OutcomeStatus::SuccessWithSkips => "Success (pages skipped)",
            OutcomeStatus::Failed => "Failed",
            OutcomeStatus::RetryableFailure => "Failed (retryable)",
        };
        f.write_str(s)
    }
}

/// Immutable per-archive record consumed by the reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub archive: PathBuf,
    pub status: OutcomeStatus,
    /// Page images found in the archive.
    pub discovered_pages: usize,
    /// Pages successfully encoded in the primary pass.
    pub converted_pages: usize,
    /// Pages re-encoded from originals (0 unless the original set was selected).
    pub fallback_pages: usize,
    /// Pages excluded at any stage.
    pub skipped_pages: usize,
    /// Pages in the finished document.
    pub used_pages: usize,
    pub selection: Option<Selection>,
    pub output: Option<PathBuf>,
    pub failure: Option<String>,
    pub pages: Vec<PageRecord>,
    pub duration_ms: u64,
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            OutcomeStatus::Success | OutcomeStatus::SuccessWithSkips
        )
    }

    /// Outcome for an archive abandoned with `err`, keeping whatever was learned so far.
    pub fn failed(
        archive: PathBuf,
        err: &Arc2PdfError,
        discovered_pages: usize,
        pages: Vec<PageRecord>,
        duration_ms: u64,
    ) -> Self {
        let status = if err.is_retryable() {
            OutcomeStatus::RetryableFailure
        } else {
            OutcomeStatus::Failed
        };
        let skipped_pages = pages
            .iter()
            .filter(|p| p.status == PageStatus::Skipped)
            .count();
        Self {
            archive,
            status,
            discovered_pages,
            converted_pages: 0,
            fallback_pages: 0,
            skipped_pages,
            used_pages: 0,
            selection: None,
            output: None,
            failure: Some(err.to_string()),
            pages,
            duration_ms,
        }
    }
}
