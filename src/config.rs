//! Configuration types for archive-to-document conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The value is constructed once per run
//! and only ever read afterwards: every pipeline stage receives `&ConversionConfig`
//! and none of them can change a setting halfway through an archive.
//!
//! Textual engine values (fuzz, grayscale level, colour contrast) are parsed
//! in [`ConversionConfigBuilder::build`], so malformed input is rejected
//! before any external tool runs.

use crate::error::Arc2PdfError;
use crate::progress::ProgressCallback;
use crate::transform::{Adjustment, ContrastSpec, FuzzSpec, LevelSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Width:height ratio above which a page is treated as a two-page spread.
pub const DEFAULT_SPREAD_RATIO: f64 = 1.2;

/// Converted total may exceed the original total by at most this factor.
pub const DEFAULT_SIZE_ALLOWANCE: f64 = 1.02;

/// Density used when only a target height is given.
pub const DEFAULT_DENSITY: u32 = 144;

/// Configuration for an archive-to-document conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use jisui_arc2pdf::{BindingDirection, ConversionConfig};
///
/// let config = ConversionConfig::builder()
///     .quality(80)
///     .trim(true)
///     .fuzz("2%")
///     .split_spreads(true)
///     .binding(BindingDirection::RightEdge)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Output compression quality, 1–100. Default: 85.
    pub quality: u8,

    /// Saturation below which a page is encoded as grayscale. Range 0–1. Default: 0.05.
    ///
    /// Scans of black-and-white pages always carry a little colour noise
    /// from the sensor; 0.05 sits above that noise floor but well below any
    /// page with real colour illustrations.
    pub saturation_threshold: f64,

    /// Resize target and stamped density. Default: A4 at 144 dpi.
    pub target: TargetSize,

    /// Straighten rotated scans. Default: false.
    pub deskew: bool,

    /// Deskew threshold in percent. Default: 40.
    pub deskew_threshold_percent: u8,

    /// Remove uniform borders. Default: false.
    pub trim: bool,

    /// Colour tolerance for trim. Default: `1%`.
    pub fuzz: FuzzSpec,

    /// Level applied to grayscale pages, e.g. `10%,90%`.
    pub grayscale_level: Option<LevelSpec>,

    /// Manual brightness/contrast for colour pages, e.g. `0x25`.
    pub color_contrast: Option<ContrastSpec>,

    /// Histogram normalisation for colour pages. Wins over `color_contrast`.
    pub auto_contrast: bool,

    /// Detect and cut two-page spreads. Default: false.
    pub split_spreads: bool,

    /// Reading order used to sequence the halves of a split spread.
    pub binding: BindingDirection,

    /// Width:height ratio strictly above which a page is a spread. Default: 1.2.
    pub spread_ratio: f64,

    /// Explicit compression threshold in percent. When set, the converted
    /// set is used iff `100 × converted / original < threshold`.
    pub compression_threshold: Option<f64>,

    /// Allowance for the default selection rule. Default: 1.02.
    pub size_allowance: f64,

    /// Page geometry directive passed to the document builder.
    pub page_geometry: PageGeometry,

    /// Run the linearisation pass (requires qpdf). Default: false.
    pub linearize: bool,

    /// Skip the structural optimise pass. Default: false.
    pub skip_optimization: bool,

    /// Number of pages encoded concurrently. Default: 4.
    ///
    /// Each worker is one engine process; page order is restored from the
    /// stored index afterwards, so any value produces the same document.
    pub concurrency: usize,

    /// Wall-clock budget for archive extraction in seconds. Default: 300.
    pub extract_timeout_secs: u64,

    /// Wall-clock budget for any other tool invocation in seconds. Default: 120.
    pub tool_timeout_secs: u64,

    /// Wall-clock budget for the "is this an image" probe in seconds. Default: 15.
    pub identify_timeout_secs: u64,

    /// Characters ignored in the text runs of filenames when ordering pages.
    pub sort_separators: String,

    /// Write documents here instead of next to each archive.
    pub output_dir: Option<PathBuf>,

    /// Parent directory for per-archive working directories. Default: system temp.
    pub work_dir: Option<PathBuf>,

    /// Optional per-archive / per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: 85,
            saturation_threshold: 0.05,
            target: TargetSize::default(),
            deskew: false,
            deskew_threshold_percent: 40,
            trim: false,
            fuzz: FuzzSpec::default(),
            grayscale_level: None,
            color_contrast: None,
            auto_contrast: false,
            split_spreads: false,
            binding: BindingDirection::default(),
            spread_ratio: DEFAULT_SPREAD_RATIO,
            compression_threshold: None,
            size_allowance: DEFAULT_SIZE_ALLOWANCE,
            page_geometry: PageGeometry::default(),
            linearize: false,
            skip_optimization: false,
            concurrency: 4,
            extract_timeout_secs: 300,
            tool_timeout_secs: 120,
            identify_timeout_secs: 15,
            sort_separators: " _-\u{3000}".to_string(),
            output_dir: None,
            work_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("quality", &self.quality)
            .field("saturation_threshold", &self.saturation_threshold)
            .field("target", &self.target)
            .field("deskew", &self.deskew)
            .field("trim", &self.trim)
            .field("fuzz", &self.fuzz)
            .field("grayscale_level", &self.grayscale_level)
            .field("color_contrast", &self.color_contrast)
            .field("auto_contrast", &self.auto_contrast)
            .field("split_spreads", &self.split_spreads)
            .field("binding", &self.binding)
            .field("compression_threshold", &self.compression_threshold)
            .field("page_geometry", &self.page_geometry)
            .field("linearize", &self.linearize)
            .field("skip_optimization", &self.skip_optimization)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
            fuzz: None,
            grayscale_level: None,
            color_contrast: None,
        }
    }

    /// Tonal adjustment for pages classified as colour.
    pub fn color_adjustment(&self) -> Adjustment {
        if self.auto_contrast {
            Adjustment::Normalize
        } else if let Some(ref spec) = self.color_contrast {
            Adjustment::BrightnessContrast(spec.clone())
        } else {
            Adjustment::None
        }
    }

    /// Tonal adjustment for pages classified as grayscale.
    pub fn grayscale_adjustment(&self) -> Adjustment {
        match self.grayscale_level {
            Some(ref level) => Adjustment::Level(level.clone()),
            None => Adjustment::None,
        }
    }

    /// One-line `key=value` rendering of the effective settings, for the run log.
    pub fn settings_summary(&self) -> String {
        let opt = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        format!(
            "quality={} saturation_threshold={} height={} density={} deskew={} trim={} fuzz={} \
             grayscale_level={} color_contrast={} auto_contrast={} split_spreads={} binding={} \
             compression_threshold={} geometry={} linearize={} skip_optimization={}",
            self.quality,
            self.saturation_threshold,
            self.target.height,
            self.target.density,
            self.deskew,
            self.trim,
            self.fuzz,
            opt(self.grayscale_level.as_ref().map(ToString::to_string)),
            opt(self.color_contrast.as_ref().map(ToString::to_string)),
            self.auto_contrast,
            self.split_spreads,
            self.binding,
            opt(self.compression_threshold.map(|t| format!("{t}%"))),
            self.page_geometry,
            self.linearize,
            self.skip_optimization,
        )
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
    fuzz: Option<String>,
    grayscale_level: Option<String>,
    color_contrast: Option<String>,
}

impl ConversionConfigBuilder {
    pub fn quality(mut self, q: u8) -> Self {
        self.config.quality = q;
        self
    }

    pub fn saturation_threshold(mut self, t: f64) -> Self {
        self.config.saturation_threshold = t;
        self
    }

    pub fn target(mut self, target: TargetSize) -> Self {
        self.config.target = target;
        self
    }

    pub fn deskew(mut self, v: bool) -> Self {
        self.config.deskew = v;
        self
    }

    pub fn trim(mut self, v: bool) -> Self {
        self.config.trim = v;
        self
    }

    /// Trim tolerance, validated in [`build`](Self::build).
    pub fn fuzz(mut self, fuzz: impl Into<String>) -> Self {
        self.fuzz = Some(fuzz.into());
        self
    }

    /// Grayscale level, validated in [`build`](Self::build).
    pub fn grayscale_level(mut self, level: impl Into<String>) -> Self {
        self.grayscale_level = Some(level.into());
        self
    }

    /// Colour brightness/contrast, validated in [`build`](Self::build).
    pub fn color_contrast(mut self, contrast: impl Into<String>) -> Self {
        self.color_contrast = Some(contrast.into());
        self
    }

    pub fn auto_contrast(mut self, v: bool) -> Self {
        self.config.auto_contrast = v;
        self
    }

    pub fn split_spreads(mut self, v: bool) -> Self {
        self.config.split_spreads = v;
        self
    }

    pub fn binding(mut self, binding: BindingDirection) -> Self {
        self.config.binding = binding;
        self
    }

    pub fn spread_ratio(mut self, ratio: f64) -> Self {
        self.config.spread_ratio = ratio;
        self
    }

    pub fn compression_threshold(mut self, percent: Option<f64>) -> Self {
        self.config.compression_threshold = percent;
        self
    }

    pub fn size_allowance(mut self, factor: f64) -> Self {
        self.config.size_allowance = factor;
        self
    }

    pub fn page_geometry(mut self, geometry: PageGeometry) -> Self {
        self.config.page_geometry = geometry;
        self
    }

    pub fn linearize(mut self, v: bool) -> Self {
        self.config.linearize = v;
        self
    }

    pub fn skip_optimization(mut self, v: bool) -> Self {
        self.config.skip_optimization = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extract_timeout_secs = secs;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn sort_separators(mut self, chars: impl Into<String>) -> Self {
        self.config.sort_separators = chars.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Arc2PdfError> {
        let mut config = self.config;

        if let Some(ref raw) = self.fuzz {
            config.fuzz = raw.parse()?;
        }
        if let Some(ref raw) = self.grayscale_level {
            config.grayscale_level = Some(raw.parse()?);
        }
        if let Some(ref raw) = self.color_contrast {
            config.color_contrast = Some(raw.parse()?);
        }

        if !(1..=100).contains(&config.quality) {
            return Err(Arc2PdfError::InvalidConfig(format!(
                "Quality must be 1–100, got {}",
                config.quality
            )));
        }
        if !(0.0..=1.0).contains(&config.saturation_threshold) {
            return Err(Arc2PdfError::InvalidConfig(format!(
                "Saturation threshold must be 0–1, got {}",
                config.saturation_threshold
            )));
        }
        if config.spread_ratio.is_nan() || config.spread_ratio <= 0.0 {
            return Err(Arc2PdfError::InvalidConfig(format!(
                "Spread ratio must be positive, got {}",
                config.spread_ratio
            )));
        }
        if config.size_allowance.is_nan() || config.size_allowance <= 0.0 {
            return Err(Arc2PdfError::InvalidConfig(format!(
                "Size allowance must be positive, got {}",
                config.size_allowance
            )));
        }
        if let Some(t) = config.compression_threshold {
            if t.is_nan() || t <= 0.0 {
                return Err(Arc2PdfError::InvalidConfig(format!(
                    "Compression threshold must be a positive percentage, got {t}"
                )));
            }
        }
        if config.target.density == 0 {
            return Err(Arc2PdfError::InvalidConfig("Density must be ≥ 1".into()));
        }
        Ok(config)
    }
}

// ── Target size ──────────────────────────────────────────────────────────

/// Resize target height and the density stamped on every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    /// Pages taller than this are downscaled; 0 disables resizing.
    pub height: u32,
    pub density: u32,
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::from_paper(PaperSize::A4, DEFAULT_DENSITY)
    }
}

impl TargetSize {
    /// Pixel height of `paper` at `dpi`, truncated.
    pub fn from_paper(paper: PaperSize, dpi: u32) -> Self {
        let height = (paper.height_mm() as f64 / 25.4 * dpi as f64) as u32;
        Self {
            height,
            density: dpi,
        }
    }

    /// Resolve the user's height / paper / dpi combination.
    ///
    /// An explicit height wins (density defaults to 144). Paper size and
    /// density must be given together. Nothing at all means A4 at 144 dpi.
    pub fn resolve(
        height: Option<u32>,
        paper: Option<PaperSize>,
        dpi: Option<u32>,
    ) -> Result<Self, Arc2PdfError> {
        match (height, paper, dpi) {
            (Some(h), _, d) => Ok(Self {
                height: h,
                density: d.unwrap_or(DEFAULT_DENSITY),
            }),
            (None, Some(p), Some(d)) => Ok(Self::from_paper(p, d)),
            (None, Some(_), None) | (None, None, Some(_)) => Err(Arc2PdfError::InvalidConfig(
                "Paper size and density must be used together".into(),
            )),
            (None, None, None) => Ok(Self::default()),
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Reading-order convention of the publication.
///
/// | Binding | Typical content | Spread halves emitted as |
/// |---------|-----------------|--------------------------|
/// | `RightEdge` | Japanese manga, vertical text | right, then left |
/// | `LeftEdge`  | Western books | left, then right |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BindingDirection {
    /// Leading edge on the right (right-to-left reading). (default)
    #[default]
    RightEdge,
    /// Leading edge on the left (left-to-right reading).
    LeftEdge,
}

impl fmt::Display for BindingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingDirection::RightEdge => f.write_str("right"),
            BindingDirection::LeftEdge => f.write_str("left"),
        }
    }
}

/// ISO A and JIS B paper sizes, used for height targets and page geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
}

impl PaperSize {
    /// Long-edge length in millimetres.
    pub fn height_mm(self) -> u32 {
        match self {
            PaperSize::A0 => 1189,
            PaperSize::A1 => 841,
            PaperSize::A2 => 594,
            PaperSize::A3 => 420,
            PaperSize::A4 => 297,
            PaperSize::A5 => 210,
            PaperSize::A6 => 148,
            PaperSize::A7 => 105,
            PaperSize::B0 => 1414,
            PaperSize::B1 => 1000,
            PaperSize::B2 => 707,
            PaperSize::B3 => 500,
            PaperSize::B4 => 364,
            PaperSize::B5 => 257,
            PaperSize::B6 => 182,
            PaperSize::B7 => 128,
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl FromStr for PaperSize {
    type Err = Arc2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let size = match s.trim().to_ascii_uppercase().as_str() {
            "A0" => PaperSize::A0,
            "A1" => PaperSize::A1,
            "A2" => PaperSize::A2,
            "A3" => PaperSize::A3,
            "A4" => PaperSize::A4,
            "A5" => PaperSize::A5,
            "A6" => PaperSize::A6,
            "A7" => PaperSize::A7,
            "B0" => PaperSize::B0,
            "B1" => PaperSize::B1,
            "B2" => PaperSize::B2,
            "B3" => PaperSize::B3,
            "B4" => PaperSize::B4,
            "B5" => PaperSize::B5,
            "B6" => PaperSize::B6,
            "B7" => PaperSize::B7,
            other => {
                return Err(Arc2PdfError::InvalidConfig(format!(
                    "Unknown paper size '{other}' (expected A0–A7 or B0–B7)"
                )))
            }
        };
        Ok(size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page geometry requested from the document builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageGeometry {
    /// Let the builder size each page to its image. (default)
    #[default]
    None,
    /// Every page on a fixed paper size.
    Paper(PaperSize, Orientation),
    /// Every page sized to the largest prepared page.
    Auto,
}

impl fmt::Display for PageGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageGeometry::None => f.write_str("none"),
            PageGeometry::Paper(size, Orientation::Portrait) => write!(f, "{size}P"),
            PageGeometry::Paper(size, Orientation::Landscape) => write!(f, "{size}L"),
            PageGeometry::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for PageGeometry {
    type Err = Arc2PdfError;

    /// Accepts `none`, `auto`, or a paper size with optional `P`/`L` suffix (`A4`, `B5L`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => return Ok(PageGeometry::None),
            "auto" => return Ok(PageGeometry::Auto),
            _ => {}
        }
        let upper = s.to_ascii_uppercase();
        let (size, orientation) = if let Some(rest) = upper.strip_suffix('L') {
            (rest, Orientation::Landscape)
        } else if let Some(rest) = upper.strip_suffix('P') {
            (rest, Orientation::Portrait)
        } else {
            (upper.as_str(), Orientation::Portrait)
        };
        Ok(PageGeometry::Paper(size.parse()?, orientation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_target_is_a4_at_144() {
        let t = TargetSize::default();
        assert_eq!(t.height, 1683);
        assert_eq!(t.density, 144);
    }

    #[test]
    fn explicit_height_wins() {
        let t = TargetSize::resolve(Some(2000), Some(PaperSize::B5), Some(300)).unwrap();
        assert_eq!(t, TargetSize { height: 2000, density: 300 });
        let t = TargetSize::resolve(Some(1600), None, None).unwrap();
        assert_eq!(t.density, DEFAULT_DENSITY);
    }

    #[test]
    fn paper_and_dpi_compute_height() {
        let t = TargetSize::resolve(None, Some(PaperSize::B6), Some(300)).unwrap();
        // 182mm / 25.4 * 300 = 2149.6
        assert_eq!(t.height, 2149);
    }

    #[test]
    fn paper_without_dpi_is_rejected() {
        assert!(TargetSize::resolve(None, Some(PaperSize::A5), None).is_err());
        assert!(TargetSize::resolve(None, None, Some(200)).is_err());
    }

    #[test]
    fn auto_contrast_wins_over_manual() {
        let config = ConversionConfig::builder()
            .auto_contrast(true)
            .color_contrast("0x25")
            .build()
            .unwrap();
        assert_eq!(config.color_adjustment(), Adjustment::Normalize);

        let config = ConversionConfig::builder()
            .color_contrast("0x25")
            .build()
            .unwrap();
        assert!(matches!(
            config.color_adjustment(),
            Adjustment::BrightnessContrast(_)
        ));
    }

    #[test]
    fn malformed_specs_fail_build() {
        assert!(ConversionConfig::builder().fuzz("lots").build().is_err());
        assert!(ConversionConfig::builder()
            .grayscale_level("10%;90%")
            .build()
            .is_err());
        assert!(ConversionConfig::builder()
            .color_contrast("brighter")
            .build()
            .is_err());
    }

    #[test]
    fn range_validation() {
        assert!(ConversionConfig::builder().quality(0).build().is_err());
        assert!(ConversionConfig::builder().quality(100).build().is_ok());
        assert!(ConversionConfig::builder()
            .saturation_threshold(1.5)
            .build()
            .is_err());
        assert!(ConversionConfig::builder()
            .compression_threshold(Some(0.0))
            .build()
            .is_err());
    }

    #[test]
    fn concurrency_floor_is_one() {
        let config = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn page_geometry_parsing() {
        assert_eq!("none".parse::<PageGeometry>().unwrap(), PageGeometry::None);
        assert_eq!("Auto".parse::<PageGeometry>().unwrap(), PageGeometry::Auto);
        assert_eq!(
            "a4".parse::<PageGeometry>().unwrap(),
            PageGeometry::Paper(PaperSize::A4, Orientation::Portrait)
        );
        assert_eq!(
            "B5L".parse::<PageGeometry>().unwrap(),
            PageGeometry::Paper(PaperSize::B5, Orientation::Landscape)
        );
        assert!("C3".parse::<PageGeometry>().is_err());
        assert_eq!(
            PageGeometry::Paper(PaperSize::A5, Orientation::Landscape).to_string(),
            "A5L"
        );
    }

    #[test]
    fn settings_summary_mentions_effective_values() {
        let config = ConversionConfig::builder()
            .quality(70)
            .grayscale_level("10%,90%")
            .build()
            .unwrap();
        let s = config.settings_summary();
        assert!(s.contains("quality=70"), "got: {s}");
        assert!(s.contains("grayscale_level=10%,90%"), "got: {s}");
        assert!(s.contains("compression_threshold=-"), "got: {s}");
    }
}
