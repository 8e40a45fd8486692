mod font;
mod render;
mod tesseract;

use anyhow::Result;
use image::RgbImage;

pub use font::{OverlayFont, load_overlay_font};
pub use render::{
    OverlayStyle, encode_image, image_format_from_path, render_annotation_svg, render_svg_image,
};
pub use tesseract::{TesseractEngine, list_tesseract_languages};

/// Turns a cropped field image into text.
///
/// The returned string may span several lines or be empty. Engines are shared
/// across worker threads when OCR runs in parallel.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<String>;
}
