use log::debug;
use mupdf::{Colorspace, Document, Matrix, Pixmap};
use thiserror::Error;

use super::{PageRenderer, RasterImage};

#[derive(Debug, Error)]
pub enum MupdfRenderError {
    #[error("MuPDF: {0}")]
    Engine(#[from] mupdf::Error),

    #[error("unsupported pixmap format: {0} channels")]
    UnsupportedFormat(usize),

    #[error("pixmap buffer size mismatch")]
    BufferMismatch,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfRenderer;

impl MupdfRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PageRenderer for MupdfRenderer {
    type Document = Document;
    type Error = MupdfRenderError;

    fn decode(&self, bytes: &[u8]) -> Result<Document, MupdfRenderError> {
        Ok(Document::from_bytes(bytes, "application/pdf")?)
    }

    fn page_size(
        &self,
        document: &Document,
        page_index: usize,
        scale: f64,
    ) -> Result<(f64, f64), MupdfRenderError> {
        let bounds = document.load_page(page_index as i32)?.bounds()?;
        let width = f64::from(bounds.x1 - bounds.x0) * scale;
        let height = f64::from(bounds.y1 - bounds.y0) * scale;
        Ok((width, height))
    }

    fn render(
        &self,
        document: &Document,
        page_index: usize,
        scale: f64,
    ) -> Result<RasterImage, MupdfRenderError> {
        let page = document.load_page(page_index as i32)?;
        let transform = Matrix::new_scale(scale as f32, scale as f32);
        let pixmap = page.to_pixmap(&transform, &Colorspace::device_rgb(), false, false)?;
        debug!(
            "Rendered page {page_index} at {scale}x to {}x{}",
            pixmap.width(),
            pixmap.height()
        );

        Ok(RasterImage {
            width: pixmap.width(),
            height: pixmap.height(),
            pixels: pixmap_to_rgb(&pixmap)?,
        })
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, MupdfRenderError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(MupdfRenderError::UnsupportedFormat(n));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(MupdfRenderError::BufferMismatch);
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for row in samples.chunks(stride).take(height) {
        let row = &row[..row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }
    Ok(out)
}
