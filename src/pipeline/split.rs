//! Spread splitting: cut two-page scans into single pages.
//!
//! A page is a spread when `width / height` is strictly greater than
//! [`ConversionConfig::spread_ratio`]. Its halves are written losslessly
//! (PNG) so the encoder sees the same pixels it would have seen for a
//! single page, then emitted in reading order for the binding. Each half
//! carries its share of the source file's size, so the size comparison
//! during selection sees the archive's own bytes rather than PNG output.

use crate::config::{BindingDirection, ConversionConfig};
use crate::error::PageError;
use crate::output::PageRecord;
use crate::page::SourcePage;
use crate::tools::RasterEngine;
use crate::transform::{Half, TransformOp, TransformSpec};
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, info, warn};

/// `true` when a `width`×`height` page should be split.
pub fn is_spread(width: u32, height: u32, ratio: f64) -> bool {
    height > 0 && (width as f64 / height as f64) > ratio
}

/// Halves in reading order for `binding`.
pub fn reading_order(binding: BindingDirection) -> [Half; 2] {
    match binding {
        BindingDirection::RightEdge => [Half::Right, Half::Left],
        BindingDirection::LeftEdge => [Half::Left, Half::Right],
    }
}

/// Split every spread in `pages`, writing halves into `split_dir`.
///
/// Returns the flattened page sequence with indices reassigned, plus one
/// skip record per page that had to be dropped. Disabled splitting returns
/// the input unchanged.
pub async fn split_spreads(
    pages: Vec<SourcePage>,
    engine: &dyn RasterEngine,
    config: &ConversionConfig,
    split_dir: &Path,
) -> (Vec<SourcePage>, Vec<PageRecord>) {
    if !config.split_spreads {
        return (pages, Vec::new());
    }

    if let Err(e) = tokio::fs::create_dir_all(split_dir).await {
        warn!("Cannot create '{}': {}", split_dir.display(), e);
    }

    let results: Vec<Result<Vec<SourcePage>, PageRecord>> = stream::iter(pages)
        .map(|page| split_one(page, engine, config, split_dir))
        .buffered(config.concurrency)
        .collect()
        .await;

    let mut out = Vec::new();
    let mut skipped = Vec::new();
    for result in results {
        match result {
            Ok(halves) => out.extend(halves),
            Err(record) => skipped.push(record),
        }
    }
    for (i, page) in out.iter_mut().enumerate() {
        page.index = i;
    }

    info!(
        "Split stage: {} page(s) out, {} dropped",
        out.len(),
        skipped.len()
    );
    (out, skipped)
}

async fn split_one(
    mut page: SourcePage,
    engine: &dyn RasterEngine,
    config: &ConversionConfig,
    split_dir: &Path,
) -> Result<Vec<SourcePage>, PageRecord> {
    let page_num = page.index + 1;
    let (width, height) = match engine.dimensions(&page.path).await {
        Ok(dims) => dims,
        Err(e) => {
            warn!("Dropping page {} ({}): {}", page_num, page.name, e);
            let err = PageError::DimensionsUnavailable {
                page: page_num,
                detail: e.to_string(),
            };
            return Err(PageRecord::skipped(&page, None, err));
        }
    };
    page.dimensions = Some((width, height));

    if !is_spread(width, height, config.spread_ratio) {
        return Ok(vec![page]);
    }

    debug!("Page {} ({}) is a spread: {}x{}", page_num, page.name, width, height);
    let stem = page
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("page{page_num}"));

    let first_share = page.bytes / 2;
    let mut halves = Vec::with_capacity(2);
    for (i, half) in reading_order(config.binding).into_iter().enumerate() {
        let tag = match half {
            Half::Right => "R",
            Half::Left => "L",
        };
        let out = split_dir.join(format!("{:04}_{stem}_{tag}.png", page.source_index));
        let spec = TransformSpec::new().then(TransformOp::CropHalf(half));

        if let Err(e) = engine.transform(&page.path, &spec, &out).await {
            warn!("Dropping spread {} ({}): {}", page_num, page.name, e);
            let err = PageError::SplitFailed {
                page: page_num,
                detail: e.to_string(),
            };
            return Err(PageRecord::skipped(&page, None, err));
        }

        let bytes = if i == 0 {
            first_share
        } else {
            page.bytes - first_share
        };
        halves.push(SourcePage {
            path: out,
            name: format!("{stem}_{tag}"),
            source_index: page.source_index,
            index: page.index,
            dimensions: None,
            saturation: None,
            bytes,
        });
    }
    Ok(halves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fakes::FakeRaster;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn ratio_threshold_is_strict() {
        assert!(!is_spread(1200, 1000, 1.2));
        assert!(is_spread(1210, 1000, 1.2));
        assert!(!is_spread(800, 1200, 1.2));
        assert!(!is_spread(100, 0, 1.2));
    }

    #[test]
    fn binding_order() {
        assert_eq!(reading_order(BindingDirection::RightEdge), [Half::Right, Half::Left]);
        assert_eq!(reading_order(BindingDirection::LeftEdge), [Half::Left, Half::Right]);
    }

    fn page(dir: &Path, name: &str, dims: &str, index: usize) -> SourcePage {
        let path = dir.join(name);
        fs::write(&path, dims).unwrap();
        SourcePage::discovered(path, index, dims.len() as u64)
    }

    #[tokio::test]
    async fn disabled_is_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let pages = vec![page(dir.path(), "a.jpg", "2000 1000", 0)];
        let engine = FakeRaster::default();
        let config = ConversionConfig::default();
        let (out, skipped) = split_spreads(pages.clone(), &engine, &config, &dir.path().join("split")).await;
        assert_eq!(out, pages);
        assert!(skipped.is_empty());
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn spreads_split_in_binding_order_and_reindex() {
        let dir = tempfile::tempdir().unwrap();
        let pages = vec![
            page(dir.path(), "p1.jpg", "1000 1400", 0),
            page(dir.path(), "p2.jpg", "2420 2000", 1),
            page(dir.path(), "p3.jpg", "1000 1400", 2),
        ];
        let engine = FakeRaster::default();
        let config = ConversionConfig::builder().split_spreads(true).build().unwrap();
        let (out, skipped) = split_spreads(pages, &engine, &config, &dir.path().join("split")).await;

        assert!(skipped.is_empty());
        let names: Vec<_> = out.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["p1.jpg", "p2_R", "p2_L", "p3.jpg"]);
        let idx: Vec<_> = out.iter().map(|p| p.index).collect();
        assert_eq!(idx, [0, 1, 2, 3]);
        assert_eq!(out[1].source_index, 1);
        assert_eq!(out[3].source_index, 2);
        assert_eq!(out[0].dimensions, Some((1000, 1400)));
    }

    #[tokio::test]
    async fn halves_share_the_source_size() {
        let dir = tempfile::tempdir().unwrap();
        let spread = dir.path().join("wide.jpg");
        fs::write(&spread, format!("3000 2000\n{}", ".".repeat(990))).unwrap();
        let pages = vec![SourcePage::discovered(spread, 0, 1001)];
        let engine = FakeRaster::default();
        let config = ConversionConfig::builder().split_spreads(true).build().unwrap();
        let (out, _) = split_spreads(pages, &engine, &config, &dir.path().join("split")).await;

        let bytes: Vec<_> = out.iter().map(|p| p.bytes).collect();
        assert_eq!(bytes, [500, 501]);
        assert!(out.iter().all(|p| p.path.extension().unwrap() == "png"));
    }

    #[tokio::test]
    async fn left_edge_binding_emits_left_first() {
        let dir = tempfile::tempdir().unwrap();
        let pages = vec![page(dir.path(), "s.jpg", "3000 2000", 0)];
        let engine = FakeRaster::default();
        let config = ConversionConfig::builder()
            .split_spreads(true)
            .binding(BindingDirection::LeftEdge)
            .build()
            .unwrap();
        let (out, _) = split_spreads(pages, &engine, &config, &dir.path().join("split")).await;
        let names: Vec<_> = out.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["s_L", "s_R"]);
    }

    #[tokio::test]
    async fn failed_split_drops_whole_page() {
        let dir = tempfile::tempdir().unwrap();
        let pages = vec![
            page(dir.path(), "broken.jpg", "3000 2000", 0),
            page(dir.path(), "ok.jpg", "1000 1400", 1),
            SourcePage::discovered(PathBuf::from("/nonexistent/x.jpg"), 2, 0),
        ];
        let engine = FakeRaster::default();
        let config = ConversionConfig::builder().split_spreads(true).build().unwrap();
        let (out, skipped) = split_spreads(pages, &engine, &config, &dir.path().join("split")).await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "ok.jpg");
        assert_eq!(out[0].index, 0);
        assert_eq!(skipped.len(), 2);
        assert!(matches!(skipped[0].error, Some(PageError::SplitFailed { .. })));
        assert!(matches!(
            skipped[1].error,
            Some(PageError::DimensionsUnavailable { .. })
        ));
    }
}
