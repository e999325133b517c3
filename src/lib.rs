//! # jisui-arc2pdf
//!
//! Turn archives of scanned page images (zip, rar, 7z, cbz, …) into a
//! single PDF, choosing per archive between resized/normalised pages and
//! re-encoded originals, whichever keeps the document smaller.
//!
//! ## Pipeline Overview
//!
//! ```text
//! archive
//!  │
//!  ├─ 1. Extract   7-Zip into a private working directory
//!  ├─ 2. Discover  keep raster files, natural sort (p2 before p10)
//!  ├─ 3. Split     optional: cut two-page spreads in reading order
//!  ├─ 4. Encode    ImageMagick: deskew, trim, resize, gray/colour treatment
//!  ├─ 5. Select    converted set vs. re-encoded originals (all or nothing)
//!  └─ 6. Assemble  pdfcpu import + optimise, optional qpdf linearise
//! ```
//!
//! Every external program sits behind a trait in [`tools`], so the whole
//! pipeline runs against in-memory fakes in tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jisui_arc2pdf::{convert_archive, ConversionConfig, ToolPaths, Toolchain};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().quality(80).trim(true).build()?;
//!     let tools = Toolchain::discover(&ToolPaths::default(), &config)?;
//!     let outcome = convert_archive(Path::new("book.zip"), &config, &tools).await;
//!     println!("{}: {} pages", outcome.status, outcome.used_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `arc2pdf` and `pdf2arc` binaries (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## External tools
//!
//! | Tool | Needed for |
//! |------|------------|
//! | 7-Zip (`7z`) | extraction, zip packing |
//! | ImageMagick 7 (`magick`) | classification, measurement, transforms |
//! | pdfcpu | import, viewer preferences, optimisation, image extraction |
//! | qpdf | `--linearize` only |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod progress;
pub mod repack;
pub mod report;
pub mod tools;
pub mod transform;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    BindingDirection, ConversionConfig, ConversionConfigBuilder, Orientation, PageGeometry,
    PaperSize, TargetSize,
};
pub use convert::{convert_archive, convert_archive_sync, convert_archives, convert_archives_with};
pub use error::{Arc2PdfError, PageError, ToolError};
pub use output::{ConversionOutcome, OutcomeStatus, PageRecord, PageStatus, Rendition, Selection};
pub use page::{EncodedCandidate, PageSet, SourcePage};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use repack::{repack_document, RepackConfig, RepackOutcome, RepackStatus};
pub use report::RunLog;
pub use tools::{RepackToolchain, ToolPaths, Toolchain};
pub use transform::{ColorClass, TransformOp, TransformSpec};
