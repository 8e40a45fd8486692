use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;
use tracing::info;

use crate::aggregate::{FieldMap, aggregate, parse_lines};
use crate::catalog::RegionCatalog;
use crate::extract::recognize_regions;
use crate::ocr::{self, OcrEngine, OverlayStyle};

/// The decoded input: one copy kept untouched for display, one that gets annotated.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pristine: DynamicImage,
    pub working: DynamicImage,
}

impl LoadedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            working: image.clone(),
            pristine: image,
        }
    }
}

pub fn load_image(path: &Path) -> Result<LoadedImage> {
    info!("loading image {}", path.display());
    let image =
        image::open(path).with_context(|| format!("failed to load image: {}", path.display()))?;
    let (width, height) = image.dimensions();
    info!("image: {}x{}", width, height);
    Ok(LoadedImage::new(image))
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub jobs: usize,
    pub style: OverlayStyle,
    pub font_data: Option<Vec<u8>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            style: OverlayStyle::default(),
            font_data: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Raw joined OCR text per field id.
    pub fields: FieldMap,
    /// ASCII-only, trimmed text per field id.
    pub cleaned: FieldMap,
    pub annotation_svg: String,
    pub annotated: DynamicImage,
}

/// Crops every catalog region, OCRs it, merges lines per id, sanitizes and
/// draws the result onto the working copy.
pub fn run_pipeline(
    image: &LoadedImage,
    catalog: &RegionCatalog,
    engine: &dyn OcrEngine,
    options: &PipelineOptions,
) -> Result<PipelineOutput> {
    info!("OCR'ing document");
    let outputs = recognize_regions(&image.working, catalog, engine, options.jobs)?;
    let lines = parse_lines(outputs.iter().map(|(region, text)| (*region, text.as_str())));
    let fields = aggregate(&lines);
    info!(
        "aggregated {} line(s) into {} field(s)",
        lines.len(),
        fields.len()
    );
    let cleaned = fields.cleaned();

    let (width, height) = image.working.dimensions();
    let png = ocr::encode_image(&image.working, ImageFormat::Png)?;
    let annotation_svg =
        ocr::render_annotation_svg(&png, "image/png", width, height, &cleaned, &options.style);
    let annotated = ocr::render_svg_image(&annotation_svg, options.font_data.as_deref())
        .with_context(|| "failed to render annotated image")?;
    info!("annotated {} field(s)", cleaned.len());

    Ok(PipelineOutput {
        fields,
        cleaned,
        annotation_svg,
        annotated: DynamicImage::ImageRgba8(annotated),
    })
}
