//! Selection policy: converted set or re-encoded originals, all or nothing.

use crate::config::ConversionConfig;
use crate::output::{Rendition, Selection, SelectionRule};
use crate::page::EncodedCandidate;
use tracing::info;

/// Decide between the two renditions from aggregate byte totals.
///
/// * Original total of zero: converted.
/// * Explicit threshold `t`: converted iff `100 × converted / original < t`.
/// * Otherwise: converted iff `converted / original < allowance`.
pub fn decide(original_bytes: u64, converted_bytes: u64, config: &ConversionConfig) -> Selection {
    let (rendition, rule) = if original_bytes == 0 {
        (Rendition::Converted, SelectionRule::EmptyOriginal)
    } else {
        let ratio = converted_bytes as f64 / original_bytes as f64;
        match config.compression_threshold {
            Some(t) => (pick(100.0 * ratio < t), SelectionRule::Threshold(t)),
            None => (
                pick(ratio < config.size_allowance),
                SelectionRule::Allowance(config.size_allowance),
            ),
        }
    };
    Selection {
        rendition,
        original_bytes,
        converted_bytes,
        rule,
    }
}

fn pick(use_converted: bool) -> Rendition {
    if use_converted {
        Rendition::Converted
    } else {
        Rendition::Original
    }
}

/// Sum the surviving candidates and [`decide`].
pub fn select_rendition(candidates: &[EncodedCandidate], config: &ConversionConfig) -> Selection {
    let original: u64 = candidates.iter().map(|c| c.source.bytes).sum();
    let converted: u64 = candidates.iter().map(|c| c.bytes).sum();
    let selection = decide(original, converted, config);
    info!(
        "Selection: {} (original {} B, converted {} B{})",
        selection.rendition,
        original,
        converted,
        selection
            .ratio_percent()
            .map(|r| format!(", {r:.1}%"))
            .unwrap_or_default()
    );
    selection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allowance_boundary() {
        let config = ConversionConfig::default();
        assert_eq!(decide(1_000_000, 1_015_000, &config).rendition, Rendition::Converted);
        assert_eq!(decide(1_000_000, 1_025_000, &config).rendition, Rendition::Original);
        assert_eq!(decide(1_000_000, 1_020_000, &config).rendition, Rendition::Original);
    }

    #[test]
    fn explicit_threshold_overrides_default() {
        let config = ConversionConfig::builder()
            .compression_threshold(Some(50.0))
            .build()
            .unwrap();
        let s = decide(1_000_000, 450_000, &config);
        assert_eq!(s.rendition, Rendition::Converted);
        assert_eq!(s.rule, SelectionRule::Threshold(50.0));

        // Smaller than the original, but not small enough for the threshold.
        assert_eq!(decide(1_000_000, 600_000, &config).rendition, Rendition::Original);
    }

    #[test]
    fn empty_original_uses_converted() {
        let config = ConversionConfig::builder()
            .compression_threshold(Some(10.0))
            .build()
            .unwrap();
        let s = decide(0, 5_000, &config);
        assert_eq!(s.rendition, Rendition::Converted);
        assert_eq!(s.rule, SelectionRule::EmptyOriginal);
    }

    #[test]
    fn custom_allowance() {
        let config = ConversionConfig::builder().size_allowance(0.9).build().unwrap();
        assert_eq!(decide(100, 95, &config).rendition, Rendition::Original);
        assert_eq!(decide(100, 85, &config).rendition, Rendition::Converted);
    }
}
