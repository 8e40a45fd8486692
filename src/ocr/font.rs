use anyhow::{Context, Result, anyhow};
use std::path::Path;
use ttf_parser::{Face, name_id};

/// Font file handed to the rasterizer in addition to system fonts.
#[derive(Clone)]
pub struct OverlayFont {
    data: Vec<u8>,
    family: Option<String>,
}

impl OverlayFont {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for OverlayFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayFont")
            .field("family", &self.family)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub fn load_overlay_font(path: &Path) -> Result<OverlayFont> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    let family = family_from_data(&data)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))?;
    Ok(OverlayFont { data, family })
}

fn family_from_data(data: &[u8]) -> Result<Option<String>> {
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            return Ok(extract_family_name(&face));
        }
    }
    Err(anyhow!("no readable face in font data"))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rejects_files_that_are_not_fonts() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("fake.ttf");
        std::fs::write(&path, b"definitely not a font").expect("write");
        let err = load_overlay_font(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse font"));
    }

    #[test]
    fn missing_font_reports_path() {
        let err = load_overlay_font(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/font.ttf"));
    }
}
