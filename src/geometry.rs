//! Coordinate transforms between ratio, preview pixel and PDF-native space
//!
//! Ratios run from 0.0 at the top of the page to 1.0 at the bottom.
//! PDF-native coordinates put the origin at the bottom-left corner, so the
//! vertical axis is inverted when mapping a ratio band to a crop box.

use serde::Serialize;

/// Physical size of the source page plus the height of its rendered preview
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PageGeometry {
    /// Page width in PDF units (points)
    pub width_native: f64,
    /// Page height in PDF units (points)
    pub height_native: f64,
    /// Height of the rendered preview in pixels
    pub height_pixels: f64,
}

impl PageGeometry {
    #[must_use]
    pub const fn new(width_native: f64, height_native: f64, height_pixels: f64) -> Self {
        Self {
            width_native,
            height_native,
            height_pixels,
        }
    }

    /// Geometry for a preview rendered at `scale` times the native size
    #[must_use]
    pub fn with_preview_scale(width_native: f64, height_native: f64, scale: f64) -> Self {
        Self::new(width_native, height_native, height_native * scale)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width_native.is_finite()
            && self.height_native.is_finite()
            && self.width_native > 0.0
            && self.height_native > 0.0
    }

    #[must_use]
    pub fn ratio_to_pixel_y(&self, ratio: f64) -> f64 {
        ratio_to_pixel_y(ratio, self.height_pixels)
    }

    #[must_use]
    pub fn pixel_y_to_ratio(&self, y: f64) -> f64 {
        pixel_y_to_ratio(y, self.height_pixels)
    }

    #[must_use]
    pub fn crop_for_range(&self, start_ratio: f64, end_ratio: f64) -> CropRegion {
        ratio_range_to_native_crop(
            start_ratio,
            end_ratio,
            self.width_native,
            self.height_native,
        )
    }
}

/// Rectangle in PDF-native coordinates (origin bottom-left)
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CropRegion {
    pub left: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    #[must_use]
    pub fn top(&self) -> f64 {
        self.bottom + self.height
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// PDF rectangle form: `[llx, lly, urx, ury]`
    #[must_use]
    pub fn to_box(&self) -> [f64; 4] {
        [self.left, self.bottom, self.right(), self.top()]
    }
}

#[must_use]
pub fn ratio_to_pixel_y(ratio: f64, height_pixels: f64) -> f64 {
    ratio * height_pixels
}

/// Inverse of [`ratio_to_pixel_y`]. The result is not clamped.
#[must_use]
pub fn pixel_y_to_ratio(y: f64, height_pixels: f64) -> f64 {
    if height_pixels == 0.0 {
        return 0.0;
    }
    y / height_pixels
}

/// Map a top-down ratio band onto a bottom-up native crop rectangle.
///
/// The band keeps the full page width.
#[must_use]
pub fn ratio_range_to_native_crop(
    start_ratio: f64,
    end_ratio: f64,
    width_native: f64,
    height_native: f64,
) -> CropRegion {
    debug_assert!(start_ratio <= end_ratio, "inverted ratio range");
    CropRegion {
        left: 0.0,
        bottom: height_native * (1.0 - end_ratio),
        width: width_native,
        height: height_native * (end_ratio - start_ratio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn full_range_covers_whole_page() {
        let crop = ratio_range_to_native_crop(0.0, 1.0, 612.0, 792.0);
        assert_eq!(crop.left, 0.0);
        assert_eq!(crop.bottom, 0.0);
        assert_eq!(crop.width, 612.0);
        assert_eq!(crop.height, 792.0);
    }

    #[test]
    fn top_band_sits_at_top_of_native_space() {
        let crop = ratio_range_to_native_crop(0.0, 0.25, 612.0, 800.0);
        assert!((crop.bottom - 600.0).abs() < EPS);
        assert!((crop.height - 200.0).abs() < EPS);
        assert!((crop.top() - 800.0).abs() < EPS);
    }

    #[test]
    fn pixel_and_ratio_are_inverse() {
        let geometry = PageGeometry::with_preview_scale(612.0, 792.0, 1.5);
        assert!((geometry.height_pixels - 1188.0).abs() < EPS);

        let y = geometry.ratio_to_pixel_y(0.3);
        assert!((y - 356.4).abs() < EPS);
        assert!((geometry.pixel_y_to_ratio(y) - 0.3).abs() < EPS);
    }

    #[test]
    fn pixel_to_ratio_is_unclamped() {
        assert!((pixel_y_to_ratio(-50.0, 100.0) + 0.5).abs() < EPS);
        assert!((pixel_y_to_ratio(150.0, 100.0) - 1.5).abs() < EPS);
        assert_eq!(pixel_y_to_ratio(10.0, 0.0), 0.0);
    }

    #[test]
    fn crop_box_uses_pdf_rect_order() {
        let crop = CropRegion {
            left: 0.0,
            bottom: 264.0,
            width: 612.0,
            height: 264.0,
        };
        assert_eq!(crop.to_box(), [0.0, 264.0, 612.0, 528.0]);
    }

    #[test]
    fn invalid_geometry_is_detected() {
        assert!(PageGeometry::new(612.0, 792.0, 0.0).is_valid());
        assert!(!PageGeometry::new(0.0, 792.0, 0.0).is_valid());
        assert!(!PageGeometry::new(612.0, f64::NAN, 0.0).is_valid());
    }
}
