//! Page encoding: one transform invocation per page.
//!
//! The same function produces both candidate renditions. The primary pass
//! ([`Rendition::Converted`]) may downscale; the fallback pass
//! ([`Rendition::Original`]) never resizes and reuses the saturation measured
//! by the primary pass, so a page cannot change colour class between the
//! two renditions.

use crate::config::ConversionConfig;
use crate::error::PageError;
use crate::output::Rendition;
use crate::page::{EncodedCandidate, SourcePage};
use crate::tools::RasterEngine;
use crate::transform::{Adjustment, ColorClass, TransformOp, TransformSpec};
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, warn};

/// Saturation assumed when measurement fails; treated as colour.
pub const FALLBACK_SATURATION: f64 = 0.5;

/// Colour class for a measured saturation.
pub fn classify(saturation: f64, threshold: f64) -> ColorClass {
    if saturation < threshold {
        ColorClass::Grayscale
    } else {
        ColorClass::Color
    }
}

/// Target height to resize to, if the page is taller than the target.
///
/// Never upscales. A target height of 0 disables resizing.
pub fn resize_target(page_height: u32, target_height: u32) -> Option<u32> {
    (target_height > 0 && page_height > target_height).then_some(target_height)
}

/// Build the transform chain for one page.
///
/// Order: deskew, trim, resize, density, quality, then the colour treatment.
pub fn build_transform(
    config: &ConversionConfig,
    color: ColorClass,
    adjustment: &Adjustment,
    resize_to: Option<u32>,
) -> TransformSpec {
    let spec = TransformSpec::new()
        .then_if(config.deskew, || TransformOp::Deskew {
            threshold_percent: config.deskew_threshold_percent,
        })
        .then_if(config.trim, || TransformOp::Trim {
            fuzz: config.fuzz.clone(),
        });
    let spec = match resize_to {
        Some(h) => spec.then(TransformOp::ResizeToHeight(h)),
        None => spec,
    };
    let spec = spec
        .then(TransformOp::Density(config.target.density))
        .then(TransformOp::Quality(config.quality))
        .then_if(color == ColorClass::Grayscale, || TransformOp::Grayscale);

    match adjustment {
        Adjustment::None => spec,
        Adjustment::Level(l) => spec.then(TransformOp::Level(l.clone())),
        Adjustment::Normalize => spec.then(TransformOp::Normalize),
        Adjustment::BrightnessContrast(c) => spec.then(TransformOp::BrightnessContrast(c.clone())),
    }
}

/// Encode one page into `output`.
///
/// `saturation` is measured when `None`; a measurement failure falls back to
/// [`FALLBACK_SATURATION`]. Dimensions are only needed (and only probed)
/// when a resize could apply.
pub async fn encode_page(
    engine: &dyn RasterEngine,
    page: &SourcePage,
    config: &ConversionConfig,
    output: &Path,
    rendition: Rendition,
    saturation: Option<f64>,
) -> Result<EncodedCandidate, PageError> {
    let page_num = page.index + 1;

    let saturation = match saturation.or(page.saturation) {
        Some(s) => s,
        None => engine.saturation(&page.path).await.unwrap_or_else(|e| {
            debug!("Page {}: saturation unavailable ({}), assuming colour", page_num, e);
            FALLBACK_SATURATION
        }),
    };
    let color = classify(saturation, config.saturation_threshold);
    let adjustment = match color {
        ColorClass::Grayscale => config.grayscale_adjustment(),
        ColorClass::Color => config.color_adjustment(),
    };

    let resize_to = if rendition == Rendition::Converted && config.target.height > 0 {
        let (_, height) = match page.dimensions {
            Some(dims) => dims,
            None => engine.dimensions(&page.path).await.map_err(|e| {
                PageError::DimensionsUnavailable {
                    page: page_num,
                    detail: e.to_string(),
                }
            })?,
        };
        resize_target(height, config.target.height)
    } else {
        None
    };

    let spec = build_transform(config, color, &adjustment, resize_to);
    debug!(
        "Page {} ({}): {:?} {} ops{}",
        page_num,
        page.name,
        color,
        spec.ops().len(),
        resize_to.map(|h| format!(", resize to {h}px")).unwrap_or_default()
    );

    engine
        .transform(&page.path, &spec, output)
        .await
        .map_err(|e| PageError::from_transform(page_num, e))?;

    let bytes = tokio::fs::metadata(output)
        .await
        .map(|m| m.len())
        .map_err(|e| PageError::TransformFailed {
            page: page_num,
            detail: format!("no output written: {e}"),
        })?;

    Ok(EncodedCandidate {
        source: page.clone(),
        output: output.to_path_buf(),
        bytes,
        saturation,
        color,
        adjustment,
    })
}

/// Results of one encode pass, in page order.
#[derive(Debug, Default)]
pub struct EncodePass {
    pub candidates: Vec<EncodedCandidate>,
    pub failures: Vec<(SourcePage, PageError)>,
}

/// Encode `jobs` into `out_dir` with bounded concurrency.
///
/// Each job is a page plus the saturation to reuse (if known). Outputs are
/// named `<index>.jpg`. Results are re-sorted by page index; one page's
/// failure never cancels another.
pub async fn encode_pages(
    engine: &dyn RasterEngine,
    jobs: Vec<(SourcePage, Option<f64>)>,
    config: &ConversionConfig,
    out_dir: &Path,
    rendition: Rendition,
) -> EncodePass {
    if let Err(e) = tokio::fs::create_dir_all(out_dir).await {
        warn!("Cannot create '{}': {}", out_dir.display(), e);
    }

    let total = jobs.len();
    let mut results: Vec<(SourcePage, Result<EncodedCandidate, PageError>)> = stream::iter(jobs)
        .map(|(page, saturation)| async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(page.index, total);
            }
            let output = out_dir.join(format!("{:04}.jpg", page.index));
            let result = encode_page(engine, &page, config, &output, rendition, saturation).await;
            if let Some(ref cb) = config.progress_callback {
                match &result {
                    Ok(c) => cb.on_page_complete(page.index, total, c.bytes),
                    Err(e) => cb.on_page_error(page.index, total, &e.to_string()),
                }
            }
            (page, result)
        })
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    results.sort_by_key(|(page, _)| page.index);

    let mut pass = EncodePass::default();
    for (page, result) in results {
        match result {
            Ok(candidate) => pass.candidates.push(candidate),
            Err(e) => {
                warn!("Skipping page {} ({}): {}", page.index + 1, page.name, e);
                pass.failures.push((page, e));
            }
        }
    }
    pass
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fakes::FakeRaster;
    use std::fs;

    fn has_resize(spec: &TransformSpec) -> bool {
        spec.contains(|op| matches!(op, TransformOp::ResizeToHeight(_)))
    }

    #[test]
    fn classification_threshold() {
        assert_eq!(classify(0.049, 0.05), ColorClass::Grayscale);
        assert_eq!(classify(0.05, 0.05), ColorClass::Color);
        assert_eq!(classify(FALLBACK_SATURATION, 0.05), ColorClass::Color);
    }

    #[test]
    fn never_upscales() {
        assert_eq!(resize_target(1200, 1683), None);
        assert_eq!(resize_target(1683, 1683), None);
        assert_eq!(resize_target(3000, 1683), Some(1683));
        assert_eq!(resize_target(3000, 0), None);
    }

    #[test]
    fn chain_order_grayscale_with_level() {
        let config = ConversionConfig::builder()
            .deskew(true)
            .trim(true)
            .grayscale_level("10%,90%")
            .build()
            .unwrap();
        let adj = config.grayscale_adjustment();
        let spec = build_transform(&config, ColorClass::Grayscale, &adj, Some(1683));
        let kinds: Vec<_> = spec
            .ops()
            .iter()
            .map(|op| std::mem::discriminant(op))
            .collect();
        let expected = [
            TransformOp::Deskew { threshold_percent: 40 },
            TransformOp::Trim { fuzz: Default::default() },
            TransformOp::ResizeToHeight(1683),
            TransformOp::Density(144),
            TransformOp::Quality(85),
            TransformOp::Grayscale,
            TransformOp::Level("1".parse().unwrap()),
        ]
        .iter()
        .map(std::mem::discriminant)
        .collect::<Vec<_>>();
        assert_eq!(kinds, expected);
    }

    #[test]
    fn color_page_gets_normalize_not_grayscale() {
        let config = ConversionConfig::builder().auto_contrast(true).build().unwrap();
        let spec = build_transform(&config, ColorClass::Color, &config.color_adjustment(), None);
        assert!(spec.contains(|op| *op == TransformOp::Normalize));
        assert!(!spec.contains(|op| *op == TransformOp::Grayscale));
        assert!(!has_resize(&spec));
    }

    #[tokio::test]
    async fn short_page_is_not_resized_tall_page_is() {
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short.jpg");
        let tall = dir.path().join("tall.jpg");
        fs::write(&short, "800 1200").unwrap();
        fs::write(&tall, "2000 3000").unwrap();

        let engine = FakeRaster::default();
        let config = ConversionConfig::default();
        for (src, expect_resize) in [(&short, false), (&tall, true)] {
            let page = SourcePage::discovered(src.clone(), 0, 8);
            let out = dir.path().join("out.jpg");
            encode_page(&engine, &page, &config, &out, Rendition::Converted, None)
                .await
                .unwrap();
            let (_, spec) = engine.calls().pop().unwrap();
            assert_eq!(has_resize(&spec), expect_resize, "{}", src.display());
        }
    }

    #[tokio::test]
    async fn original_rendition_reuses_saturation_and_skips_resize() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tall.jpg");
        fs::write(&src, "2000 3000").unwrap();
        // The engine would report colour; the reused value says grayscale.
        let engine = FakeRaster::with_saturation(0.9);
        let config = ConversionConfig::default();
        let page = SourcePage::discovered(src, 0, 9);

        let c = encode_page(
            &engine,
            &page,
            &config,
            &dir.path().join("o.jpg"),
            Rendition::Original,
            Some(0.01),
        )
        .await
        .unwrap();

        assert_eq!(c.color, ColorClass::Grayscale);
        assert_eq!(c.saturation, 0.01);
        let (_, spec) = engine.calls().pop().unwrap();
        assert!(!has_resize(&spec));
        assert!(spec.contains(|op| *op == TransformOp::Density(144)));
    }

    #[tokio::test]
    async fn failures_are_isolated_and_order_restored() {
        let dir = tempfile::tempdir().unwrap();
        let mut jobs = Vec::new();
        for i in 0..6 {
            let name = if i == 3 { "broken.jpg".to_string() } else { format!("p{i}.jpg") };
            let path = dir.path().join(&name);
            fs::write(&path, "100 100").unwrap();
            jobs.push((SourcePage::discovered(path, i, 7), None));
        }
        let engine = FakeRaster::default();
        let config = ConversionConfig::builder().concurrency(3).build().unwrap();
        let pass = encode_pages(
            &engine,
            jobs,
            &config,
            &dir.path().join("converted"),
            Rendition::Converted,
        )
        .await;

        let idx: Vec<_> = pass.candidates.iter().map(|c| c.source.index).collect();
        assert_eq!(idx, [0, 1, 2, 4, 5]);
        assert_eq!(pass.failures.len(), 1);
        assert_eq!(pass.failures[0].0.index, 3);
        assert!(matches!(pass.failures[0].1, PageError::TransformFailed { page: 4, .. }));
        assert!(dir.path().join("converted/0004.jpg").exists());
    }
}
