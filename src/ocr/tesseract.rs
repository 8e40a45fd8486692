use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use super::OcrEngine;
use crate::settings::OcrSettings;

/// Runs the `tesseract` executable on each crop in plain-text mode.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    languages: String,
    psm: u32,
    oem: Option<u32>,
    dpi: Option<u32>,
}

impl TesseractEngine {
    pub fn from_settings(settings: &OcrSettings) -> Result<Self> {
        let languages = normalize_ocr_languages(&settings.binary, &settings.languages)?;
        Ok(Self {
            binary: settings.binary.clone(),
            languages,
            psm: settings.psm,
            oem: settings.oem,
            dpi: settings.dpi,
        })
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(self.psm.to_string());
        if let Some(oem) = self.oem {
            command.arg("--oem").arg(oem.to_string());
        }
        if let Some(dpi) = self.dpi {
            command.arg("--dpi").arg(dpi.to_string());
        }
        command
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &RgbImage) -> Result<String> {
        let mut tmp = tempfile::Builder::new()
            .prefix("form-ocr-")
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush()
            .with_context(|| "failed to flush temp image for OCR")?;

        let output = self
            .command(tmp.path())
            .output()
            .with_context(|| format!("failed to run {} (is it installed?)", self.binary))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("{} failed: {}", self.binary, stderr.trim()));
        }
        let text = String::from_utf8_lossy(&output.stdout).to_string();
        debug!(
            "tesseract: {}x{} crop -> {} chars",
            image.width(),
            image.height(),
            text.chars().count()
        );
        Ok(text)
    }
}

pub fn list_tesseract_languages(binary: &str) -> Result<Vec<String>> {
    let output = Command::new(binary)
        .arg("--list-langs")
        .output()
        .with_context(|| format!("failed to run {} --list-langs", binary))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} --list-langs failed: {}", binary, stderr.trim()));
    }
    Ok(parse_language_list(&String::from_utf8_lossy(&output.stdout)))
}

// First line is a header such as `List of available languages in "/usr/share/tessdata/" (3):`.
fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_ocr_languages(binary: &str, requested: &str) -> Result<String> {
    match list_tesseract_languages(binary) {
        Ok(available) => choose_languages(requested, &available),
        Err(err) => {
            debug!("tesseract: language list unavailable ({err:#})");
            let trimmed = requested.trim();
            if trimmed.is_empty() {
                return Err(anyhow!("ocr languages is empty"));
            }
            Ok(trimmed.to_string())
        }
    }
}

fn choose_languages(requested: &str, available: &[String]) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }

    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in trimmed.split(['+', ',', ' ']) {
        let lang = raw.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }

    Ok(chosen.join("+"))
}
