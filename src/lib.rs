use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod aggregate;
pub mod catalog;
pub mod display;
pub mod extract;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod sanitize;
pub mod settings;
mod test_util;

pub use aggregate::{FieldMap, FieldText, ParsedLine, aggregate, parse_lines};
pub use catalog::{BBoxPx, Region, RegionCatalog};
pub use ocr::{OcrEngine, OverlayStyle, TesseractEngine};
pub use pipeline::{LoadedImage, PipelineOptions, PipelineOutput, load_image, run_pipeline};
pub use sanitize::sanitize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub settings_path: Option<PathBuf>,
    pub no_display: bool,
    pub show_languages: bool,
}

/// Runs the whole tool: prints the cleaned fields to stdout, optionally saves
/// the annotated image, then shows both images until dismissed.
pub fn run(config: Config) -> Result<()> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;

    if config.show_languages {
        let languages = ocr::list_tesseract_languages(&settings.ocr.binary)?;
        println!("{}", languages.join("\n"));
        return Ok(());
    }

    let image_path = config
        .image
        .as_deref()
        .ok_or_else(|| anyhow!("--image is required"))?;
    let catalog = match config.catalog_path.as_deref() {
        Some(path) => RegionCatalog::load(path)?,
        None => RegionCatalog::default_template(),
    };
    info!("catalog: {} region(s)", catalog.len());

    let font = settings
        .overlay
        .font_path
        .as_deref()
        .map(|path| ocr::load_overlay_font(Path::new(path)))
        .transpose()?;
    let options = PipelineOptions {
        jobs: settings.ocr.jobs,
        style: OverlayStyle::from_settings(&settings.overlay, font.as_ref()),
        font_data: font.as_ref().map(|font| font.data().to_vec()),
    };

    let engine = TesseractEngine::from_settings(&settings.ocr)?;
    let image = load_image(image_path)?;
    let output = run_pipeline(&image, &catalog, &engine, &options)?;

    println!("{}", format_fields(&output.cleaned, config.format)?);

    if let Some(path) = config.output.as_deref() {
        save_annotated(&output.annotated, path)?;
    }
    if settings.display.enabled && !config.no_display {
        display::show(&image.pristine, &output.annotated, &settings.display)?;
    }
    Ok(())
}

fn save_annotated(image: &image::DynamicImage, path: &Path) -> Result<()> {
    let format = ocr::image_format_from_path(path)
        .ok_or_else(|| anyhow!("unsupported output image extension: {}", path.display()))?;
    let bytes = ocr::encode_image(image, format)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("failed to write annotated image: {}", path.display()))?;
    info!("wrote annotated image {}", path.display());
    Ok(())
}

/// Renders the field map for stdout.
///
/// `Text` prints `id: text` per field with continuation lines indented two
/// spaces; `Json` prints an array of `{id, text, bbox}` objects in field order.
pub fn format_fields(fields: &FieldMap, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<&FieldText> = fields.iter().collect();
            Ok(serde_json::to_string_pretty(&entries)?)
        }
        OutputFormat::Text => {
            let mut out = Vec::with_capacity(fields.len());
            for field in fields {
                let mut lines = field.text.lines();
                let first = lines.next().unwrap_or_default();
                out.push(format!("{}: {}", field.id, first).trim_end().to_string());
                for line in lines {
                    out.push(format!("  {}", line));
                }
            }
            Ok(out.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;
    use tempfile::tempdir;

    fn sample() -> FieldMap {
        let name = Region::new("name", 1, 2, 3, 4);
        let notes = Region::new("notes", 5, 6, 7, 8);
        let empty = Region::new("empty", 0, 0, 1, 1);
        aggregate(&parse_lines([
            (&name, "Ada Lovelace"),
            (&notes, "first\nsecond"),
            (&empty, "\u{e9}"),
        ]))
        .cleaned()
    }

    #[test]
    fn text_format_indents_continuation_lines() {
        let text = format_fields(&sample(), OutputFormat::Text).expect("format");
        assert_eq!(text, "name: Ada Lovelace\nnotes: first\n  second\nempty:");
    }

    #[test]
    fn json_format_keeps_field_order() {
        let json = format_fields(&sample(), OutputFormat::Json).expect("format");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(parsed[0]["id"], "name");
        assert_eq!(parsed[1]["text"], "first\nsecond");
        assert_eq!(parsed[1]["bbox"]["w"], 7);
        assert_eq!(parsed[2]["text"], "");
    }

    #[test]
    fn save_rejects_unknown_extension() {
        let dir = tempdir().expect("tempdir");
        let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2));
        assert!(save_annotated(&image, &dir.path().join("out.xyz")).is_err());
        let png = dir.path().join("out.png");
        save_annotated(&image, &png).expect("save png");
        assert!(png.exists());
    }

    #[test]
    fn run_without_image_fails() {
        with_temp_home(|_| {
            let err = run(Config::default()).unwrap_err();
            assert!(err.to_string().contains("--image is required"));
        });
    }
}
