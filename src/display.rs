use anyhow::{Context, Result, anyhow};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::ffi::OsString;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::ocr::encode_image;
use crate::settings::DisplaySettings;

/// Scales to `width` pixels wide, keeping the aspect ratio.
pub fn resize_to_width(image: &DynamicImage, width: u32) -> DynamicImage {
    let (src_w, src_h) = image.dimensions();
    if width == 0 || src_w == 0 || src_w == width {
        return image.clone();
    }
    let height = ((src_h as f64 * width as f64 / src_w as f64).round() as u32).max(1);
    image.resize_exact(width, height, FilterType::Triangle)
}

#[cfg(target_os = "macos")]
fn default_viewer() -> &'static [&'static str] {
    &["open"]
}

#[cfg(target_os = "windows")]
fn default_viewer() -> &'static [&'static str] {
    &["cmd", "/C", "start", ""]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_viewer() -> &'static [&'static str] {
    &["xdg-open"]
}

/// Program and arguments used to open `path`. A configured viewer is split on whitespace.
pub fn viewer_argv(viewer: Option<&str>, path: &Path) -> Vec<OsString> {
    let mut argv: Vec<OsString> = match viewer.map(str::trim).filter(|v| !v.is_empty()) {
        Some(viewer) => viewer.split_whitespace().map(OsString::from).collect(),
        None => default_viewer().iter().map(OsString::from).collect(),
    };
    argv.push(path.as_os_str().to_os_string());
    argv
}

/// Shows the input and the annotated image, then waits for Enter.
pub fn show(
    original: &DynamicImage,
    annotated: &DynamicImage,
    settings: &DisplaySettings,
) -> Result<()> {
    let views = [
        ("input", resize_to_width(original, settings.input_width)),
        ("output", resize_to_width(annotated, settings.output_width)),
    ];

    let mut files = Vec::with_capacity(views.len());
    for (label, view) in &views {
        let file = write_view(label, view)?;
        open_in_viewer(settings.viewer.as_deref(), file.path())?;
        info!("display: {} -> {}", label, file.path().display());
        files.push(file);
    }

    eprint!("Press Enter to close the preview...");
    io::stderr().flush().ok();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        warn!("display: stdin closed, not waiting for dismissal");
    }
    drop(files);
    Ok(())
}

/// Writes `view` as PNG to a temp file that lives as long as the handle.
fn write_view(label: &str, view: &DynamicImage) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("form-ocr-{}-", label))
        .suffix(".png")
        .tempfile()
        .with_context(|| format!("failed to create temp file for {} view", label))?;
    let bytes = encode_image(view, ImageFormat::Png)?;
    file.write_all(&bytes)
        .with_context(|| format!("failed to write {} view", label))?;
    file.flush()
        .with_context(|| format!("failed to flush {} view", label))?;
    Ok(file)
}

fn open_in_viewer(viewer: Option<&str>, path: &Path) -> Result<()> {
    let argv = viewer_argv(viewer, path);
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("viewer command is empty"))?;
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("failed to run viewer {}", program.to_string_lossy()))?;
    if !status.success() {
        return Err(anyhow!(
            "viewer {} exited with {}",
            program.to_string_lossy(),
            status
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_keeps_aspect_ratio() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(2600, 1300));
        let resized = resize_to_width(&image, 1000);
        assert_eq!(resized.dimensions(), (1000, 500));

        let tall = DynamicImage::ImageRgb8(image::RgbImage::new(3, 1000));
        assert_eq!(resize_to_width(&tall, 1).dimensions(), (1, 333));
    }

    #[test]
    fn resize_to_same_or_zero_width_is_a_copy() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(70, 30));
        assert_eq!(resize_to_width(&image, 70).dimensions(), (70, 30));
        assert_eq!(resize_to_width(&image, 0).dimensions(), (70, 30));
    }

    #[test]
    fn configured_viewer_is_split_on_whitespace() {
        let argv = viewer_argv(Some(" feh  --scale-down "), Path::new("/tmp/view.png"));
        assert_eq!(argv, vec!["feh", "--scale-down", "/tmp/view.png"]);
    }

    #[test]
    fn blank_viewer_falls_back_to_platform_default() {
        let argv = viewer_argv(Some("   "), Path::new("view.png"));
        assert_eq!(argv.last().map(|arg| arg.as_os_str()), Some(std::ffi::OsStr::new("view.png")));
        assert_eq!(argv.len(), default_viewer().len() + 1);
    }

    #[test]
    fn view_file_holds_the_full_png() {
        let view = DynamicImage::ImageRgb8(image::RgbImage::new(12, 7));
        let file = write_view("input", &view).expect("write view");
        let name = file.path().file_name().and_then(|name| name.to_str()).unwrap_or_default();
        assert!(name.starts_with("form-ocr-input-") && name.ends_with(".png"), "{name}");
        let decoded = image::open(file.path()).expect("decode view");
        assert_eq!(decoded.dimensions(), (12, 7));
    }

    #[test]
    fn failing_viewer_is_reported() {
        let err = open_in_viewer(Some("form-ocr-no-such-viewer"), Path::new("x.png")).unwrap_err();
        assert!(err.to_string().contains("form-ocr-no-such-viewer"));
    }
}
