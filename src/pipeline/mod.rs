//! Pipeline stages for archive-to-document conversion.
//!
//! Each submodule implements exactly one transformation step and hands a
//! fresh, owned sequence to the next one.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ discover ──▶ split ──▶ encode ──▶ select ──▶ assemble
//! (globs)   (walk+sort)  (spreads)  (magick)   (sizes)    (pdfcpu/qpdf)
//! ```
//!
//! 1. [`input`]: expand CLI paths and glob patterns into archive paths
//! 2. [`discover`]: walk the extracted tree, keep raster files, natural sort
//! 3. [`split`]: cut two-page spreads into halves in reading order
//! 4. [`encode`]: one transform invocation per page, bounded concurrency
//! 5. [`select`]: all-or-nothing choice between converted and original sets
//! 6. [`assemble`]: import, optimise, linearise, atomic move into place

pub mod assemble;
pub mod discover;
pub mod encode;
pub mod input;
pub mod select;
pub mod split;
