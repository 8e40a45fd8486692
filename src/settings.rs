use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub ocr: OcrSettings,
    pub overlay: OverlaySettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub binary: String,
    pub languages: String,
    pub psm: u32,
    pub oem: Option<u32>,
    pub dpi: Option<u32>,
    pub jobs: usize,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            languages: "eng".to_string(),
            psm: 3,
            oem: None,
            dpi: None,
            jobs: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub box_color: String,
    pub text_color: String,
    pub stroke_width: f32,
    pub font_size: f32,
    pub font_family: Option<String>,
    pub font_path: Option<String>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            box_color: "#00ff00".to_string(),
            text_color: "#ff0000".to_string(),
            stroke_width: 2.0,
            font_size: 30.0,
            font_family: None,
            font_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub enabled: bool,
    pub viewer: Option<String>,
    pub input_width: u32,
    pub output_width: u32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            viewer: None,
            input_width: 700,
            output_width: 1000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSection>,
    overlay: Option<OverlaySection>,
    display: Option<DisplaySection>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSection {
    binary: Option<String>,
    languages: Option<String>,
    psm: Option<u32>,
    oem: Option<u32>,
    dpi: Option<u32>,
    jobs: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySection {
    box_color: Option<String>,
    text_color: Option<String>,
    stroke_width: Option<f32>,
    font_size: Option<f32>,
    font_family: Option<String>,
    font_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplaySection {
    enabled: Option<bool>,
    viewer: Option<String>,
    input_width: Option<u32>,
    output_width: Option<u32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            tracing::debug!("settings: merged {}", path.display());
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            if let Some(binary) = non_empty(ocr.binary) {
                self.ocr.binary = binary;
            }
            if let Some(languages) = non_empty(ocr.languages) {
                self.ocr.languages = languages;
            }
            if let Some(psm) = ocr.psm {
                self.ocr.psm = psm;
            }
            if ocr.oem.is_some() {
                self.ocr.oem = ocr.oem;
            }
            if let Some(dpi) = ocr.dpi.filter(|dpi| *dpi > 0) {
                self.ocr.dpi = Some(dpi);
            }
            if let Some(jobs) = ocr.jobs {
                self.ocr.jobs = jobs;
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(color) = non_empty(overlay.box_color) {
                self.overlay.box_color = color;
            }
            if let Some(color) = non_empty(overlay.text_color) {
                self.overlay.text_color = color;
            }
            if let Some(width) = overlay.stroke_width.filter(|w| *w > 0.0) {
                self.overlay.stroke_width = width;
            }
            if let Some(size) = overlay.font_size.filter(|s| *s > 0.0) {
                self.overlay.font_size = size;
            }
            if let Some(family) = non_empty(overlay.font_family) {
                self.overlay.font_family = Some(family);
            }
            if let Some(path) = non_empty(overlay.font_path) {
                self.overlay.font_path = Some(path);
            }
        }
        if let Some(display) = incoming.display {
            if let Some(enabled) = display.enabled {
                self.display.enabled = enabled;
            }
            if let Some(viewer) = non_empty(display.viewer) {
                self.display.viewer = Some(viewer);
            }
            if let Some(width) = display.input_width.filter(|w| *w > 0) {
                self.display.input_width = width;
            }
            if let Some(width) = display.output_width.filter(|w| *w > 0) {
                self.display.output_width = width;
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".form-ocr"))
        }
    })
}
