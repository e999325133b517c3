//! Page discovery: walk the extracted tree and order the page images.
//!
//! Archives rarely name their pages consistently (`p1.jpg`, `P02.JPG`,
//! `page_10.png`), so ordering uses a natural key: digit runs compare as
//! numbers, other runs compare case-insensitively with separator characters
//! removed. Ties fall back to the raw relative path so the order is total
//! and repeatable.

use crate::config::ConversionConfig;
use crate::error::Arc2PdfError;
use crate::page::SourcePage;
use crate::tools::RasterEngine;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Working-directory names the pipeline writes its own artifacts into.
pub const INTERMEDIATE_DIRS: &[&str] = &["converted", "passthrough", "split"];

static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

/// One run of a natural sort key.
///
/// Numbers sort before text at the same position; numbers compare by
/// significant-digit count first, which orders them numerically without
/// overflowing on very long runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyPart {
    Num { digits: usize, value: String },
    Text(String),
}

/// Natural sort key for `name`, ignoring `separators` in text runs.
pub fn natural_key(name: &str, separators: &str) -> Vec<KeyPart> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in RE_DIGITS.find_iter(name) {
        push_text(&mut parts, &name[last..m.start()], separators);
        let value = m.as_str().trim_start_matches('0');
        parts.push(KeyPart::Num {
            digits: value.len(),
            value: value.to_string(),
        });
        last = m.end();
    }
    push_text(&mut parts, &name[last..], separators);
    parts
}

fn push_text(parts: &mut Vec<KeyPart>, run: &str, separators: &str) {
    let text: String = run
        .chars()
        .filter(|c| !separators.contains(*c))
        .flat_map(char::to_lowercase)
        .collect();
    if !text.is_empty() {
        parts.push(KeyPart::Text(text));
    }
}

/// Sort `paths` (relative to `root`) in natural order.
pub fn sort_naturally(paths: &mut [PathBuf], root: &Path, separators: &str) {
    paths.sort_by_cached_key(|p| {
        let rel = relative_display(p, root);
        (natural_key(&rel, separators), rel)
    });
}

fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every regular file under `root`, skipping the directories in `exclude`.
///
/// Exclusion is by exact path; a folder inside the archive that happens to
/// share a name with a working directory is still walked. Symlinks are not
/// followed.
pub fn collect_files(root: &Path, exclude: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let kind = entry.file_type()?;
            if kind.is_dir() {
                let path = entry.path();
                if !exclude.contains(&path) {
                    stack.push(path);
                }
            } else if kind.is_file() {
                files.push(entry.path());
            }
        }
    }
    Ok(files)
}

/// The pipeline's own artifact directories under `work_dir`.
pub fn intermediate_dirs(work_dir: &Path) -> Vec<PathBuf> {
    INTERMEDIATE_DIRS.iter().map(|d| work_dir.join(d)).collect()
}

/// Find the page images under `root` and return them in natural order.
///
/// Directories in `exclude` are skipped. Classification failures count as
/// "not an image". An empty result is fatal to `archive`.
pub async fn discover_pages(
    root: &Path,
    exclude: &[PathBuf],
    archive: &Path,
    engine: &dyn RasterEngine,
    config: &ConversionConfig,
) -> Result<Vec<SourcePage>, Arc2PdfError> {
    let walk_root = root.to_path_buf();
    let exclude = exclude.to_vec();
    let files = tokio::task::spawn_blocking(move || collect_files(&walk_root, &exclude))
        .await
        .map_err(|e| Arc2PdfError::Internal(format!("Directory walk panicked: {e}")))?
        .map_err(|e| Arc2PdfError::Internal(format!("Cannot read '{}': {e}", root.display())))?;

    let total = files.len();
    let mut images: Vec<PathBuf> = stream::iter(files)
        .map(|path| async move {
            let is_image = engine.is_image(&path).await;
            (path, is_image)
        })
        .buffered(config.concurrency)
        .filter_map(|(path, is_image)| async move {
            if !is_image {
                debug!("Not an image, skipping: {}", path.display());
            }
            is_image.then_some(path)
        })
        .collect()
        .await;

    if images.is_empty() {
        return Err(Arc2PdfError::NoPagesFound {
            path: archive.to_path_buf(),
        });
    }

    sort_naturally(&mut images, root, &config.sort_separators);
    info!("Discovered {} page image(s) among {} file(s)", images.len(), total);

    Ok(images
        .into_iter()
        .enumerate()
        .map(|(i, path)| {
            let bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            SourcePage::discovered(path, i, bytes)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fakes::FakeRaster;
    use std::fs;

    const SEPS: &str = " _-\u{3000}";

    fn sorted(names: &[&str]) -> Vec<String> {
        let root = Path::new("/r");
        let mut paths: Vec<PathBuf> = names.iter().map(|n| root.join(n)).collect();
        sort_naturally(&mut paths, root, SEPS);
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn digits_compare_numerically() {
        assert_eq!(sorted(&["p2.jpg", "p10.jpg", "p1.jpg"]), ["p1.jpg", "p2.jpg", "p10.jpg"]);
    }

    #[test]
    fn leading_zeros_and_case() {
        assert_eq!(
            sorted(&["Page_010.jpg", "page 9.JPG", "PAGE-0002.png"]),
            ["PAGE-0002.png", "page 9.JPG", "Page_010.jpg"]
        );
    }

    #[test]
    fn very_long_digit_runs_do_not_overflow() {
        assert_eq!(
            sorted(&["p123456789012345678901234567890.jpg", "p99.jpg"]),
            ["p99.jpg", "p123456789012345678901234567890.jpg"]
        );
    }

    #[test]
    fn ties_break_on_raw_name() {
        let a = sorted(&["p01.jpg", "p1.jpg"]);
        let b = sorted(&["p1.jpg", "p01.jpg"]);
        assert_eq!(a, b);
    }

    #[test]
    fn natural_key_shape() {
        assert_eq!(
            natural_key("Vol 02_p3", SEPS),
            vec![
                KeyPart::Text("vol".into()),
                KeyPart::Num { digits: 1, value: "2".into() },
                KeyPart::Text("p".into()),
                KeyPart::Num { digits: 1, value: "3".into() },
            ]
        );
    }

    #[tokio::test]
    async fn discovery_skips_non_images_and_intermediate_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("vol")).unwrap();
        fs::create_dir_all(root.join("converted")).unwrap();
        fs::write(root.join("vol/p10.jpg"), "100 100").unwrap();
        fs::write(root.join("vol/p2.jpg"), "100 100").unwrap();
        fs::write(root.join("vol/readme.txt"), "hello").unwrap();
        fs::write(root.join("converted/0000.jpg"), "100 100").unwrap();

        let engine = FakeRaster::default();
        let config = ConversionConfig::default();
        let pages = discover_pages(root, &intermediate_dirs(root), Path::new("a.zip"), &engine, &config)
            .await
            .unwrap();

        let names: Vec<_> = pages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["p2.jpg", "p10.jpg"]);
        assert_eq!(pages[1].index, 1);
        assert_eq!(pages[0].bytes, 7);
    }

    #[tokio::test]
    async fn archive_folders_sharing_work_dir_names_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("extracted");
        for sub in ["split", "converted", "passthrough"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(root.join("split/p1.jpg"), "100 100").unwrap();
        fs::write(root.join("converted/p2.jpg"), "100 100").unwrap();
        fs::write(root.join("passthrough/p3.jpg"), "100 100").unwrap();

        let engine = FakeRaster::default();
        let pages = discover_pages(
            &root,
            &intermediate_dirs(dir.path()),
            Path::new("a.zip"),
            &engine,
            &ConversionConfig::default(),
        )
        .await
        .unwrap();

        let names: Vec<_> = pages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["p1.jpg", "p2.jpg", "p3.jpg"]);
    }

    #[tokio::test]
    async fn no_images_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let engine = FakeRaster::default();
        let err = discover_pages(dir.path(), &[], Path::new("a.zip"), &engine, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Arc2PdfError::NoPagesFound { .. }));
    }
}
