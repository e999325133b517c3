//! Declarative transform specifications for the raster engine.
//!
//! A page transform is an ordered list of [`TransformOp`]s. Stages build the
//! list; one generic invoker ([`crate::tools::RasterEngine::transform`])
//! turns it into a concrete command line. Keeping the list as plain data
//! means the decision logic (what to deskew, when to resize, grayscale or
//! colour) is testable without an ImageMagick install.
//!
//! Free-form values that end up on the engine's command line (`--fuzz`,
//! `--grayscale-level`, `--color-contrast`) are parsed into typed values
//! ([`FuzzSpec`], [`LevelSpec`], [`ContrastSpec`]) when the configuration
//! is built, so a typo fails before the first archive is touched instead of
//! surfacing as an engine error on page one.

use crate::error::Arc2PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Typed argument values ────────────────────────────────────────────────

static RE_FUZZ: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?%?$").unwrap());

static RE_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+(?:\.\d+)?%?(?:,\d+(?:\.\d+)?%?){0,2}$").unwrap()
});

static RE_CONTRAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?\d+(?:\.\d+)?%?(?:[x,][+-]?\d+(?:\.\d+)?%?)?$").unwrap()
});

/// Colour-distance tolerance used by trim, e.g. `1%` or `5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzSpec(String);

impl FromStr for FuzzSpec {
    type Err = Arc2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if RE_FUZZ.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(Arc2PdfError::InvalidTransformSpec {
                kind: "fuzz",
                value: s.to_string(),
                expected: "a number or percentage such as 1%",
            })
        }
    }
}

impl Default for FuzzSpec {
    fn default() -> Self {
        Self("1%".to_string())
    }
}

impl fmt::Display for FuzzSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Black/white point (and optional gamma) for grayscale pages, e.g. `10%,90%`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec(String);

impl FromStr for LevelSpec {
    type Err = Arc2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if RE_LEVEL.is_match(&s) {
            Ok(Self(s))
        } else {
            Err(Arc2PdfError::InvalidTransformSpec {
                kind: "grayscale level",
                value: s,
                expected: "black[,white[,gamma]] such as 10%,90%",
            })
        }
    }
}

impl fmt::Display for LevelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Brightness/contrast pair for colour pages, e.g. `0x25`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContrastSpec(String);

impl FromStr for ContrastSpec {
    type Err = Arc2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if RE_CONTRAST.is_match(&s) {
            Ok(Self(s))
        } else {
            Err(Arc2PdfError::InvalidTransformSpec {
                kind: "color contrast",
                value: s,
                expected: "brightness[xcontrast] such as 0x25",
            })
        }
    }
}

impl fmt::Display for ContrastSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Classification ───────────────────────────────────────────────────────

/// Colour treatment chosen for a page from its measured saturation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorClass {
    Grayscale,
    Color,
}

/// Tonal adjustment that ended up in a page's transform chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Adjustment {
    None,
    Level(LevelSpec),
    Normalize,
    BrightnessContrast(ContrastSpec),
}

/// Which half of a spread to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Half {
    Left,
    Right,
}

// ── Transform chain ──────────────────────────────────────────────────────

/// One named operation with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOp {
    /// Straighten a rotated scan; threshold in percent.
    Deskew { threshold_percent: u8 },
    /// Remove uniform borders within `fuzz` colour distance.
    Trim { fuzz: FuzzSpec },
    /// Keep one half of the page (split along the vertical centre line).
    CropHalf(Half),
    /// Downscale so the page is exactly this tall.
    ResizeToHeight(u32),
    /// Stamp pixel density metadata.
    Density(u32),
    /// Output compression quality, 1–100.
    Quality(u8),
    /// Convert to a single gray channel.
    Grayscale,
    Level(LevelSpec),
    /// Stretch the histogram to the full range.
    Normalize,
    BrightnessContrast(ContrastSpec),
}

/// Ordered transform chain applied to one input image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformSpec {
    ops: Vec<TransformOp>,
}

impl TransformSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `op` to the chain.
    pub fn then(mut self, op: TransformOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Append `op` only when `cond` holds.
    pub fn then_if(self, cond: bool, op: impl FnOnce() -> TransformOp) -> Self {
        if cond {
            self.then(op())
        } else {
            self
        }
    }

    pub fn ops(&self) -> &[TransformOp] {
        &self.ops
    }

    pub fn contains(&self, pred: impl Fn(&TransformOp) -> bool) -> bool {
        self.ops.iter().any(pred)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
