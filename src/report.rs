//! Append-only, human-readable run log.
//!
//! One record per archive (or per document for the inverse direction):
//!
//! ```text
//! Command: arc2pdf "book 1.zip" --quality 80
//! Timestamp="2026-10-17 21:04:11" Status="Success (pages skipped)" Source="/in/book 1.zip" Output="/in/book 1.pdf" Pages=10 Converted=9 Fallback=0 Skipped=1 Used=9 Decision="converted" Ratio="48.2%"
//! Settings: quality=80 saturation_threshold=0.05 …
//!   [0001] p01.jpg  Converted  45.0%
//!   [0007] p07.jpg  Skipped: Page 7: transform failed: …
//!
//! ```
//!
//! Writing the log never affects a conversion: failures are logged as
//! warnings and otherwise ignored.

use crate::output::{ConversionOutcome, PageStatus};
use crate::repack::RepackOutcome;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default log file name for `arc2pdf`.
pub const DEFAULT_LOG_NAME: &str = "arc2pdf_log.txt";

/// Default log file name for `pdf2arc`.
pub const DEFAULT_REPACK_LOG_NAME: &str = "pdf2arc_log.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Destination of the run log.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the user's `--log-path`.
    ///
    /// No value: `default_name` next to the running executable (or in the
    /// current directory if that cannot be determined). An existing
    /// directory: `default_name` inside it. Anything else: used as-is.
    pub fn resolve(requested: Option<&Path>, default_name: &str) -> Self {
        let path = match requested {
            Some(p) if p.is_dir() => p.join(default_name),
            Some(p) => p.to_path_buf(),
            None => std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|d| d.join(default_name)))
                .unwrap_or_else(|| PathBuf::from(default_name)),
        };
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` verbatim.
    pub fn append(&self, record: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(record.as_bytes())
    }

    /// Append `record`, downgrading any failure to a warning.
    pub fn record(&self, record: &str) {
        match self.append(record) {
            Ok(()) => debug!("Logged to {}", self.path.display()),
            Err(e) => warn!("Could not write log '{}': {}", self.path.display(), e),
        }
    }
}

/// Reconstruct a command line from `args`, quoting arguments with spaces.
pub fn invocation_line<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|a| {
            let a = a.as_ref();
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("\"{a}\"")
            } else {
                a.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format one archive's record.
pub fn conversion_record(
    invocation: &str,
    outcome: &ConversionOutcome,
    settings: &str,
    at: DateTime<Local>,
) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "Command: {invocation}");
    let _ = write!(
        s,
        "Timestamp=\"{}\" Status=\"{}\" Source=\"{}\"",
        at.format(TIMESTAMP_FORMAT),
        outcome.status,
        outcome.archive.display()
    );
    if let Some(ref out) = outcome.output {
        let _ = write!(s, " Output=\"{}\"", out.display());
    }
    let _ = write!(
        s,
        " Pages={} Converted={} Fallback={} Skipped={} Used={}",
        outcome.discovered_pages,
        outcome.converted_pages,
        outcome.fallback_pages,
        outcome.skipped_pages,
        outcome.used_pages
    );
    if let Some(ref sel) = outcome.selection {
        let _ = write!(s, " Decision=\"{}\"", sel.rendition);
        if let Some(r) = sel.ratio_percent() {
            let _ = write!(s, " Ratio=\"{r:.1}%\"");
        }
    }
    if let Some(ref why) = outcome.failure {
        let _ = write!(s, " Error=\"{}\"", why.replace('\n', " "));
    }
    s.push('\n');
    let _ = writeln!(s, "Settings: {settings}");

    for page in &outcome.pages {
        let index = page
            .index
            .map(|i| format!("{:04}", i + 1))
            .unwrap_or_else(|| "----".to_string());
        match page.status {
            PageStatus::Skipped => {
                let reason = page
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let _ = writeln!(s, "  [{index}] {}  Skipped: {reason}", page.name);
            }
            status => {
                let ratio = page
                    .ratio_percent()
                    .map(|r| format!("{r:.1}%"))
                    .unwrap_or_else(|| "-".to_string());
                let _ = writeln!(s, "  [{index}] {}  {status}  {ratio}", page.name);
            }
        }
    }
    s.push('\n');
    s
}

/// Format one document's record for the inverse direction.
pub fn repack_record(invocation: &str, outcome: &RepackOutcome, at: DateTime<Local>) -> String {
    let mut s = format!("Command: {invocation}\n");
    let _ = write!(
        s,
        "Timestamp=\"{}\" Status=\"{}\" Source=\"{}\"",
        at.format(TIMESTAMP_FORMAT),
        outcome.status,
        outcome.document.display()
    );
    if let Some(ref out) = outcome.output {
        let _ = write!(s, " Output=\"{}\"", out.display());
    }
    let _ = write!(s, " Images={}", outcome.images);
    if let Some(ref why) = outcome.failure {
        let _ = write!(s, " Error=\"{}\"", why.replace('\n', " "));
    }
    s.push_str("\n\n");
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Arc2PdfError, PageError};
    use crate::output::{OutcomeStatus, PageRecord, Rendition, Selection, SelectionRule};
    use crate::repack::RepackStatus;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 17, 9, 5, 0).unwrap()
    }

    fn outcome() -> ConversionOutcome {
        ConversionOutcome {
            archive: PathBuf::from("/in/book.zip"),
            status: OutcomeStatus::SuccessWithSkips,
            discovered_pages: 2,
            converted_pages: 1,
            fallback_pages: 0,
            skipped_pages: 1,
            used_pages: 1,
            selection: Some(Selection {
                rendition: Rendition::Converted,
                original_bytes: 200,
                converted_bytes: 90,
                rule: SelectionRule::Allowance(1.02),
            }),
            output: Some(PathBuf::from("/in/book.pdf")),
            failure: None,
            pages: vec![
                PageRecord {
                    source_index: 0,
                    index: Some(0),
                    name: "p1.jpg".into(),
                    status: PageStatus::Converted,
                    original_bytes: 100,
                    output_bytes: Some(45),
                    color: None,
                    error: None,
                },
                PageRecord {
                    source_index: 1,
                    index: Some(1),
                    name: "p2.jpg".into(),
                    status: PageStatus::Skipped,
                    original_bytes: 100,
                    output_bytes: None,
                    color: None,
                    error: Some(PageError::Timeout { page: 2, secs: 120 }),
                },
            ],
            duration_ms: 10,
        }
    }

    #[test]
    fn conversion_record_layout() {
        let rec = conversion_record("arc2pdf book.zip", &outcome(), "quality=85", at());
        let lines: Vec<_> = rec.lines().collect();
        assert_eq!(lines[0], "Command: arc2pdf book.zip");
        assert!(lines[1].starts_with("Timestamp=\"2026-10-17 09:05:00\" Status=\"Success (pages skipped)\""));
        assert!(lines[1].contains("Decision=\"converted\" Ratio=\"45.0%\""), "{}", lines[1]);
        assert_eq!(lines[2], "Settings: quality=85");
        assert_eq!(lines[3], "  [0001] p1.jpg  Converted  45.0%");
        assert!(lines[4].starts_with("  [0002] p2.jpg  Skipped: Page 2: transform timed out"));
        assert!(rec.ends_with("\n\n"));
    }

    #[test]
    fn failed_record_carries_error() {
        let err = Arc2PdfError::NoPagesFound {
            path: PathBuf::from("/in/empty.zip"),
        };
        let o = ConversionOutcome::failed(PathBuf::from("/in/empty.zip"), &err, 0, Vec::new(), 1);
        let rec = conversion_record("arc2pdf empty.zip", &o, "", at());
        assert!(rec.contains("Status=\"Failed\""));
        assert!(rec.contains("Error=\"No pages found"));
        assert!(!rec.contains("Output="));
    }

    #[test]
    fn repack_record_layout() {
        let o = RepackOutcome {
            document: PathBuf::from("a.pdf"),
            status: RepackStatus::Success,
            output: Some(PathBuf::from("out/a.zip")),
            images: 12,
            failure: None,
        };
        assert_eq!(
            repack_record("pdf2arc a.pdf", &o, at()),
            "Command: pdf2arc a.pdf\nTimestamp=\"2026-10-17 09:05:00\" Status=\"Success\" Source=\"a.pdf\" Output=\"out/a.zip\" Images=12\n\n"
        );
    }

    #[test]
    fn invocation_quotes_spaces() {
        assert_eq!(
            invocation_line(["arc2pdf", "my book.zip", "-q", "80"]),
            "arc2pdf \"my book.zip\" -q 80"
        );
    }

    #[test]
    fn log_resolution_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::resolve(Some(dir.path()), DEFAULT_LOG_NAME);
        assert_eq!(log.path(), dir.path().join(DEFAULT_LOG_NAME));
        log.append("one\n").unwrap();
        log.append("two\n").unwrap();
        assert_eq!(std::fs::read_to_string(log.path()).unwrap(), "one\ntwo\n");

        let file = dir.path().join("custom.log");
        assert_eq!(RunLog::resolve(Some(&file), DEFAULT_LOG_NAME).path(), file);
    }

    #[test]
    fn unwritable_log_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("missing/dir/log.txt"));
        assert!(log.append("x").is_err());
        log.record("x");
    }
}
