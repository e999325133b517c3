//! Page values handed from one pipeline stage to the next.
//!
//! Every stage consumes an immutable sequence and returns a fresh one; no
//! stage keeps a reference into another stage's collection.

use crate::error::Arc2PdfError;
use crate::output::Rendition;
use crate::transform::{Adjustment, ColorClass};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One discovered page image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePage {
    /// Where the image lives inside the working directory.
    pub path: PathBuf,
    /// Display name: the archive entry's file name, or a synthetic
    /// `<stem>_R` / `<stem>_L` for spread halves.
    pub name: String,
    /// Position in the discovered order (pre-split).
    pub source_index: usize,
    /// Position in the page sequence; reassigned by the splitter.
    pub index: usize,
    /// Pixel dimensions, once measured.
    pub dimensions: Option<(u32, u32)>,
    /// Measured saturation in 0–1, once measured.
    pub saturation: Option<f64>,
    /// Size of the image file in bytes.
    pub bytes: u64,
}

impl SourcePage {
    /// A freshly discovered page; dimensions and saturation are probed lazily.
    pub fn discovered(path: PathBuf, index: usize, bytes: u64) -> Self {
        let name = file_name(&path);
        Self {
            path,
            name,
            source_index: index,
            index,
            dimensions: None,
            saturation: None,
            bytes,
        }
    }
}

/// One page after an encode pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedCandidate {
    pub source: SourcePage,
    pub output: PathBuf,
    /// Size of `output` in bytes.
    pub bytes: u64,
    /// Saturation used for classification; reused verbatim by the fallback pass.
    pub saturation: f64,
    pub color: ColorClass,
    pub adjustment: Adjustment,
}

impl EncodedCandidate {
    /// Output size as a percentage of the source size, if the source is non-empty.
    pub fn ratio_percent(&self) -> Option<f64> {
        if self.source.bytes == 0 {
            None
        } else {
            Some(100.0 * self.bytes as f64 / self.source.bytes as f64)
        }
    }
}

/// The ordered artifacts chosen for assembly.
///
/// Never empty, and ordered by page index whatever order the encodes finished in.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSet {
    rendition: Rendition,
    pages: Vec<EncodedCandidate>,
}

impl PageSet {
    pub fn new(
        rendition: Rendition,
        mut pages: Vec<EncodedCandidate>,
        skipped: usize,
    ) -> Result<Self, Arc2PdfError> {
        if pages.is_empty() {
            return Err(Arc2PdfError::NoPagesPrepared { skipped });
        }
        pages.sort_by_key(|c| c.source.index);
        Ok(Self { rendition, pages })
    }

    pub fn rendition(&self) -> Rendition {
        self.rendition
    }

    pub fn pages(&self) -> &[EncodedCandidate] {
        &self.pages
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.pages.iter().map(|c| c.output.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(index: usize, src_bytes: u64, bytes: u64) -> EncodedCandidate {
        let mut source = SourcePage::discovered(PathBuf::from(format!("p{index}.png")), index, src_bytes);
        source.index = index;
        EncodedCandidate {
            source,
            output: PathBuf::from(format!("{index:04}.jpg")),
            bytes,
            saturation: 0.0,
            color: ColorClass::Grayscale,
            adjustment: Adjustment::None,
        }
    }

    #[test]
    fn page_set_orders_by_index() {
        let set = PageSet::new(
            Rendition::Converted,
            vec![candidate(2, 10, 5), candidate(0, 10, 5), candidate(1, 10, 5)],
            0,
        )
        .unwrap();
        let names: Vec<_> = set.paths();
        assert_eq!(
            names,
            vec![
                PathBuf::from("0000.jpg"),
                PathBuf::from("0001.jpg"),
                PathBuf::from("0002.jpg")
            ]
        );
    }

    #[test]
    fn empty_page_set_is_rejected() {
        let err = PageSet::new(Rendition::Original, Vec::new(), 3).unwrap_err();
        assert!(matches!(err, Arc2PdfError::NoPagesPrepared { skipped: 3 }));
    }

    #[test]
    fn ratio_percent_handles_empty_source() {
        assert_eq!(candidate(0, 200, 50).ratio_percent(), Some(25.0));
        assert_eq!(candidate(0, 0, 50).ratio_percent(), None);
    }

    #[test]
    fn discovered_page_uses_file_name() {
        let p = SourcePage::discovered(PathBuf::from("/tmp/x/vol1/page 03.JPG"), 7, 99);
        assert_eq!(p.name, "page 03.JPG");
        assert_eq!(p.index, 7);
        assert_eq!(p.source_index, 7);
        assert!(p.dimensions.is_none());
    }
}
