//! Page rasterization for previews

#[cfg(feature = "render")]
mod mupdf_renderer;

#[cfg(feature = "render")]
pub use mupdf_renderer::{MupdfRenderError, MupdfRenderer};

/// Tightly packed RGB8 pixels, row-major, top row first
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// A uniformly filled image
    #[must_use]
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 3);
        for _ in 0..count {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize * 3
    }
}

/// Rendering collaborator. Only used to show the page; crop math never
/// depends on it.
pub trait PageRenderer {
    type Document;
    type Error: std::error::Error;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Document, Self::Error>;

    /// Size of the rendered page in pixels at `scale` pixels per point
    fn page_size(
        &self,
        document: &Self::Document,
        page_index: usize,
        scale: f64,
    ) -> Result<(f64, f64), Self::Error>;

    fn render(
        &self,
        document: &Self::Document,
        page_index: usize,
        scale: f64,
    ) -> Result<RasterImage, Self::Error>;
}
