//! Segment derivation from split-line positions

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Display color of a segment, stored as opaque RGB
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl SegmentColor {
    /// Opacity used for band highlights over the preview
    pub const HIGHLIGHT_ALPHA: f32 = 0.2;

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS-style `rgba(...)` with the highlight alpha
    #[must_use]
    pub fn highlight_css(&self) -> String {
        format!(
            "rgba({}, {}, {}, {})",
            self.r,
            self.g,
            self.b,
            Self::HIGHLIGHT_ALPHA
        )
    }

    #[must_use]
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for SegmentColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

pub const PALETTE: [SegmentColor; 6] = [
    SegmentColor::new(90, 200, 250),
    SegmentColor::new(0, 122, 255),
    SegmentColor::new(52, 199, 89),
    SegmentColor::new(255, 149, 0),
    SegmentColor::new(175, 82, 222),
    SegmentColor::new(255, 59, 48),
];

/// Palette color for a 1-based segment index
#[must_use]
pub fn color_for_index(index: usize) -> SegmentColor {
    PALETTE[index.saturating_sub(1) % PALETTE.len()]
}

#[must_use]
pub fn default_name(index: usize) -> String {
    format!("Part {index}")
}

/// A contiguous horizontal band of the page.
///
/// Segments are rebuilt from scratch whenever the split lines change, so
/// `index` is positional and not stable across edits.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Segment {
    /// 1-based position from the top of the page
    pub index: usize,
    pub name: String,
    pub start_ratio: f64,
    pub end_ratio: f64,
    pub color: SegmentColor,
}

impl Segment {
    #[must_use]
    pub fn height_ratio(&self) -> f64 {
        self.end_ratio - self.start_ratio
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SegmentError {
    #[error("split position {0} is outside the open interval (0, 1)")]
    PositionOutOfRange(f64),
}

/// Build the segments that tile `[0, 1]` for the given interior cut positions.
///
/// The input does not need to be sorted; a drag in progress can leave lines
/// out of order. Coincident positions are merged so no zero-height segment
/// is produced.
pub fn derive_segments(positions: &[f64]) -> Result<Vec<Segment>, SegmentError> {
    if let Some(&bad) = positions
        .iter()
        .find(|p| !p.is_finite() || **p <= 0.0 || **p >= 1.0)
    {
        return Err(SegmentError::PositionOutOfRange(bad));
    }

    let mut cuts = positions.to_vec();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();

    let mut bounds = Vec::with_capacity(cuts.len() + 2);
    bounds.push(0.0);
    bounds.extend(cuts);
    bounds.push(1.0);

    let segments = bounds
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let index = i + 1;
            Segment {
                index,
                name: default_name(index),
                start_ratio: pair[0],
                end_ratio: pair[1],
                color: color_for_index(index),
            }
        })
        .collect();

    Ok(segments)
}

/// True if the segments are contiguous, ordered and cover exactly `[0, 1]`
#[must_use]
pub fn segments_tile_unit_interval(segments: &[Segment]) -> bool {
    let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
        return false;
    };
    first.start_ratio == 0.0
        && last.end_ratio == 1.0
        && segments.iter().all(|s| s.start_ratio < s.end_ratio)
        && segments
            .windows(2)
            .all(|pair| pair[0].end_ratio == pair[1].start_ratio)
}
