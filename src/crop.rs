//! Crop planning: one native crop rectangle per segment

use log::error;
use thiserror::Error;

use crate::geometry::{CropRegion, PageGeometry};
use crate::segments::Segment;

/// Relative slack allowed on the page bounds check
const BOUNDS_TOLERANCE: f64 = 1e-6;

/// Internal invariant violations. These indicate a bug upstream, not bad input.
#[derive(Debug, Error, PartialEq)]
pub enum CropError {
    #[error("page geometry {width} x {height} is not usable for cropping")]
    InvalidGeometry { width: f64, height: f64 },

    #[error("crop for segment {index} falls outside the page (bottom {bottom}, height {height}, page height {page_height})")]
    OutOfBounds {
        index: usize,
        bottom: f64,
        height: f64,
        page_height: f64,
    },
}

/// Map every segment to its crop rectangle in PDF-native coordinates
pub fn plan_crops(
    segments: &[Segment],
    geometry: &PageGeometry,
) -> Result<Vec<CropRegion>, CropError> {
    if !geometry.is_valid() {
        error!("Refusing to plan crops for invalid geometry {geometry:?}");
        return Err(CropError::InvalidGeometry {
            width: geometry.width_native,
            height: geometry.height_native,
        });
    }

    segments
        .iter()
        .map(|segment| {
            let region = geometry.crop_for_range(segment.start_ratio, segment.end_ratio);
            check_bounds(segment.index, &region, geometry.height_native)?;
            Ok(region)
        })
        .collect()
}

fn check_bounds(index: usize, region: &CropRegion, page_height: f64) -> Result<(), CropError> {
    let slack = BOUNDS_TOLERANCE * page_height;
    let inside = region.height > 0.0
        && region.bottom >= -slack
        && region.bottom + region.height <= page_height + slack;

    if inside {
        return Ok(());
    }

    error!(
        "Crop invariant violated for segment {index}: bottom={} height={} page_height={page_height}",
        region.bottom, region.height
    );
    Err(CropError::OutOfBounds {
        index,
        bottom: region.bottom,
        height: region.height,
        page_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::{color_for_index, derive_segments};

    const EPS: f64 = 1e-9;

    fn letter() -> PageGeometry {
        PageGeometry::with_preview_scale(612.0, 792.0, 1.5)
    }

    #[test]
    fn thirds_of_letter_page() {
        let segments = derive_segments(&[1.0 / 3.0, 2.0 / 3.0]).unwrap();
        let plan = plan_crops(&segments, &letter()).unwrap();

        let expected_bottoms = [528.0, 264.0, 0.0];
        assert_eq!(plan.len(), 3);
        for (region, bottom) in plan.iter().zip(expected_bottoms) {
            assert!((region.bottom - bottom).abs() < EPS, "{region:?}");
            assert!((region.height - 264.0).abs() < EPS, "{region:?}");
            assert_eq!(region.left, 0.0);
            assert_eq!(region.width, 612.0);
        }
    }

    #[test]
    fn single_segment_covers_page() {
        let segments = derive_segments(&[]).unwrap();
        let plan = plan_crops(&segments, &letter()).unwrap();
        assert_eq!(plan[0].bottom, 0.0);
        assert_eq!(plan[0].height, 792.0);
    }

    #[test]
    fn empty_segment_list_gives_empty_plan() {
        assert!(plan_crops(&[], &letter()).unwrap().is_empty());
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let segments = derive_segments(&[]).unwrap();
        let geometry = PageGeometry::new(612.0, 0.0, 0.0);
        assert!(matches!(
            plan_crops(&segments, &geometry),
            Err(CropError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn band_reaching_past_page_is_an_invariant_error() {
        let broken = Segment {
            index: 1,
            name: "broken".to_string(),
            start_ratio: -0.5,
            end_ratio: 0.5,
            color: color_for_index(1),
        };
        let err = plan_crops(&[broken], &letter()).unwrap_err();
        assert!(matches!(err, CropError::OutOfBounds { index: 1, .. }));
    }
}
