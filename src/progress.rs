//! Progress-callback trait for per-archive and per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through each archive.
//!
//! The trait is `Send + Sync` because page encodes run concurrently and
//! their events may arrive from different tasks in completion order.
//!
//! # Example
//!
//! ```rust
//! use jisui_arc2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     encoded: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, index: usize, total: usize, bytes: u64) {
//!         let done = self.encoded.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("page {} done ({done}/{total}, {bytes} bytes)", index + 1);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { encoded: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ConversionOutcome;
use std::fmt;
use std::sync::Arc;

/// Coarse pipeline stage, reported once per archive as each one begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Discover,
    Split,
    Encode,
    Fallback,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Extract => "Extracting",
            Stage::Discover => "Discovering",
            Stage::Split => "Splitting",
            Stage::Encode => "Converting",
            Stage::Fallback => "Re-encoding",
            Stage::Assemble => "Assembling",
        };
        f.write_str(s)
    }
}

/// Called by the conversion pipeline as it processes each archive.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Page indices are zero-based positions in the
/// post-split page sequence.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before an archive is extracted.
    ///
    /// `position` is 1-indexed within a batch of `batch_len` archives.
    fn on_archive_start(&self, name: &str, position: usize, batch_len: usize) {
        let _ = (name, position, batch_len);
    }

    /// Called when a stage begins; `pages` is the number of pages it will touch
    /// (0 when not yet known).
    fn on_stage(&self, stage: Stage, pages: usize) {
        let _ = (stage, pages);
    }

    /// Called just before a page is handed to the raster engine.
    fn on_page_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a page is encoded; `bytes` is the output size.
    fn on_page_complete(&self, index: usize, total: usize, bytes: u64) {
        let _ = (index, total, bytes);
    }

    /// Called when a page is skipped.
    fn on_page_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after the archive succeeded or failed.
    fn on_archive_complete(&self, outcome: &ConversionOutcome) {
        let _ = outcome;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        stages: Mutex<Vec<Stage>>,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_stage(&self, stage: Stage, _pages: usize) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_page_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _index: usize, _total: usize, _bytes: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_archive_start("a.zip", 1, 1);
        cb.on_stage(Stage::Encode, 5);
        cb.on_page_start(0, 5);
        cb.on_page_complete(0, 5, 42);
        cb.on_page_error(1, 5, "some error");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_stage(Stage::Extract, 0);
        tracker.on_stage(Stage::Encode, 3);
        tracker.on_page_start(0, 3);
        tracker.on_page_complete(0, 3, 100);
        tracker.on_page_start(1, 3);
        tracker.on_page_complete(1, 3, 200);
        tracker.on_page_start(2, 3);
        tracker.on_page_error(2, 3, "transform failed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Extract, Stage::Encode]
        );
    }

    #[test]
    fn stage_labels() {
        assert_eq!(Stage::Fallback.to_string(), "Re-encoding");
        assert_eq!(Stage::Assemble.to_string(), "Assembling");
    }
}
