//! Band overlay on a rendered page, written out as PNG

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use log::debug;
use thiserror::Error;

use crate::geometry::ratio_to_pixel_y;
use crate::render::RasterImage;
use crate::segments::{Segment, SegmentColor};
use crate::split_lines::SplitLine;

pub const SPLIT_LINE_COLOR: Rgb<u8> = Rgb([255, 45, 85]);

/// Split lines are drawn this many pixels thick, centered on the cut
pub const SPLIT_LINE_THICKNESS: u32 = 2;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("raster of {width}x{height} has {len} bytes")]
    InconsistentRaster { width: u32, height: u32, len: usize },

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Tint every segment with its palette color and draw the split lines on top
pub fn render_preview(
    raster: &RasterImage,
    segments: &[Segment],
    lines: &[SplitLine],
) -> Result<RgbImage, PreviewError> {
    let inconsistent = || PreviewError::InconsistentRaster {
        width: raster.width,
        height: raster.height,
        len: raster.pixels.len(),
    };
    if !raster.is_consistent() {
        return Err(inconsistent());
    }
    let mut image = RgbImage::from_raw(raster.width, raster.height, raster.pixels.clone())
        .ok_or_else(inconsistent)?;

    let height = f64::from(raster.height);
    for segment in segments {
        let top = row_at(segment.start_ratio, height, raster.height);
        let bottom = row_at(segment.end_ratio, height, raster.height);
        tint_rows(&mut image, top, bottom, segment.color);
    }

    let half = SPLIT_LINE_THICKNESS / 2;
    for line in lines {
        let center = row_at(line.position, height, raster.height);
        let top = center.saturating_sub(half);
        let bottom = (top + SPLIT_LINE_THICKNESS).min(raster.height);
        for y in top..bottom {
            for x in 0..raster.width {
                image.put_pixel(x, y, SPLIT_LINE_COLOR);
            }
        }
    }

    debug!(
        "Drew {} segments and {} split lines on {}x{} preview",
        segments.len(),
        lines.len(),
        raster.width,
        raster.height
    );
    Ok(image)
}

fn row_at(ratio: f64, height: f64, rows: u32) -> u32 {
    let y = ratio_to_pixel_y(ratio, height).round();
    if y <= 0.0 {
        0
    } else {
        (y as u32).min(rows)
    }
}

fn tint_rows(image: &mut RgbImage, top: u32, bottom: u32, color: SegmentColor) {
    let alpha = SegmentColor::HIGHLIGHT_ALPHA;
    let tint = [color.r, color.g, color.b];
    for y in top..bottom {
        for x in 0..image.width() {
            let pixel = image.get_pixel_mut(x, y);
            for (channel, overlay) in pixel.0.iter_mut().zip(tint) {
                *channel = blend(*channel, overlay, alpha);
            }
        }
    }
}

fn blend(base: u8, overlay: u8, alpha: f32) -> u8 {
    let value = f32::from(base) * (1.0 - alpha) + f32::from(overlay) * alpha;
    value.round().clamp(0.0, 255.0) as u8
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, PreviewError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

pub fn write_png(image: &RgbImage, path: &Path) -> Result<(), PreviewError> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::{PALETTE, derive_segments};
    use crate::split_lines::SplitLineRegistry;

    const WHITE: [u8; 3] = [255, 255, 255];

    #[test]
    fn segments_are_tinted_with_palette_colors() {
        let raster = RasterImage::filled(10, 100, WHITE);
        let segments = derive_segments(&[0.5]).unwrap();
        let image = render_preview(&raster, &segments, &[]).unwrap();

        let expected = |color: SegmentColor| {
            Rgb([
                blend(255, color.r, 0.2),
                blend(255, color.g, 0.2),
                blend(255, color.b, 0.2),
            ])
        };
        assert_eq!(*image.get_pixel(3, 10), expected(PALETTE[0]));
        assert_eq!(*image.get_pixel(3, 90), expected(PALETTE[1]));
    }

    #[test]
    fn split_lines_are_drawn_over_tint() {
        let mut registry = SplitLineRegistry::new();
        registry.add_line(0.5);
        let segments = derive_segments(&registry.positions()).unwrap();

        let raster = RasterImage::filled(10, 100, WHITE);
        let image = render_preview(&raster, &segments, registry.lines()).unwrap();

        assert_eq!(*image.get_pixel(0, 49), SPLIT_LINE_COLOR);
        assert_eq!(*image.get_pixel(9, 50), SPLIT_LINE_COLOR);
        assert_ne!(*image.get_pixel(0, 47), SPLIT_LINE_COLOR);
    }

    #[test]
    fn inconsistent_raster_is_rejected() {
        let raster = RasterImage {
            width: 4,
            height: 4,
            pixels: vec![0; 5],
        };
        assert!(matches!(
            render_preview(&raster, &[], &[]),
            Err(PreviewError::InconsistentRaster { len: 5, .. })
        ));
    }

    #[test]
    fn png_encoding_has_signature() {
        let raster = RasterImage::filled(2, 2, WHITE);
        let image = render_preview(&raster, &[], &[]).unwrap();
        let bytes = encode_png(&image).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn png_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let image = render_preview(&RasterImage::filled(3, 3, WHITE), &[], &[]).unwrap();
        write_png(&image, &path).unwrap();
        assert_eq!(image::open(&path).unwrap().to_rgb8(), image);
    }
}
