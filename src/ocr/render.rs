use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::render;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::OverlayFont;
use crate::aggregate::FieldMap;
use crate::catalog::BBoxPx;
use crate::settings::OverlaySettings;

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub box_color: String,
    pub text_color: String,
    pub stroke_width: f32,
    pub font_size: f32,
    pub font_family: Option<String>,
}

impl OverlayStyle {
    pub fn from_settings(settings: &OverlaySettings, font: Option<&OverlayFont>) -> Self {
        let font_family = settings
            .font_family
            .clone()
            .or_else(|| font.and_then(|font| font.family().map(str::to_string)));
        Self {
            box_color: settings.box_color.clone(),
            text_color: settings.text_color.clone(),
            stroke_width: settings.stroke_width,
            font_size: settings.font_size,
            font_family,
        }
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self::from_settings(&OverlaySettings::default(), None)
    }
}

/// Builds an SVG that shows the source image with one box and one label per field.
///
/// Labels sit on the top edge of their box; multi-line text stacks upward so
/// the last line touches the box.
pub fn render_annotation_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    fields: &FieldMap,
    style: &OverlayStyle,
) -> String {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    let line_height = style.font_size * 1.2;
    for field in fields {
        let BBoxPx { x, y, w, h } = field.bbox;
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{stroke}" stroke-width="{sw}"/>"#,
            stroke = escape_xml(&style.box_color),
            sw = style.stroke_width
        ));

        let lines = label_lines(&field.text);
        if lines.is_empty() {
            continue;
        }
        let first_baseline = y as f32 - (lines.len() - 1) as f32 * line_height;
        let mut text_block = format!(
            r#"<text x="{x}" y="{ty}" font-size="{size}" fill="{color}" xml:space="preserve""#,
            ty = first_baseline,
            size = style.font_size,
            color = escape_xml(&style.text_color)
        );
        if let Some(family) = style.font_family.as_deref() {
            text_block.push_str(&format!(r#" font-family="{}""#, escape_xml(family)));
        }
        text_block.push('>');
        for (idx, line) in lines.iter().enumerate() {
            let escaped = escape_xml(line);
            if idx == 0 {
                text_block.push_str(&escaped);
            } else {
                text_block.push_str(&format!(
                    r#"<tspan x="{x}" dy="{dy}">{escaped}</tspan>"#,
                    dy = line_height
                ));
            }
        }
        text_block.push_str("</text>");
        svg.push_str(&text_block);
    }

    svg.push_str("</svg>");
    svg
}

pub fn render_svg_image(svg: &str, font_data: Option<&[u8]>) -> Result<RgbaImage> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
}

pub fn encode_image(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let flattened;
    let image = if format == ImageFormat::Jpeg {
        flattened = DynamicImage::ImageRgb8(image.to_rgb8());
        &flattened
    } else {
        image
    };
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .with_context(|| format!("failed to encode {:?} image", format))?;
    Ok(bytes)
}

pub fn image_format_from_path(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "gif" => Some(ImageFormat::Gif),
        "webp" => Some(ImageFormat::WebP),
        "bmp" => Some(ImageFormat::Bmp),
        "tif" | "tiff" => Some(ImageFormat::Tiff),
        _ => None,
    }
}

/// Splits a label into lines without the control characters XML 1.0 rejects.
/// Lines left empty after that are dropped.
fn label_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.chars()
                .filter(|ch| !ch.is_control() || *ch == '\t')
                .collect::<String>()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, parse_lines};
    use crate::catalog::Region;
    use crate::test_util::painted_canvas;

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        encode_image(image, ImageFormat::Png).expect("encode png")
    }

    #[test]
    fn svg_has_one_rect_per_field_and_escapes_labels() {
        let a = Region::new("a", 10, 40, 30, 20);
        let b = Region::new("b", 50, 60, 20, 10);
        let fields = aggregate(&parse_lines([(&a, "x < y\nz"), (&b, "")])).cleaned();
        let svg = render_annotation_svg(b"png", "image/png", 100, 80, &fields, &OverlayStyle::default());

        assert_eq!(svg.matches("<rect ").count(), 1);
        assert!(svg.contains(r#"<rect x="10" y="40" width="30" height="20""#));
        assert!(svg.contains("x &lt; y"));
        assert!(svg.contains(r#"<tspan x="10" dy="36">z</tspan>"#));
        // two lines at 30px with 1.2 spacing: first baseline sits 36px above the box
        assert!(svg.contains(r#"y="4" font-size="30""#));
    }

    #[test]
    fn empty_text_still_gets_a_box() {
        let a = Region::new("a", 5, 5, 10, 10);
        let fields = aggregate(&parse_lines([(&a, "\u{e9}")])).cleaned();
        let svg = render_annotation_svg(b"png", "image/png", 20, 20, &fields, &OverlayStyle::default());
        assert_eq!(svg.matches("<rect ").count(), 1);
        assert!(!svg.contains("<text"));
    }

    #[test]
    fn control_characters_are_left_out_of_labels() {
        let a = Region::new("a", 0, 40, 10, 10);
        let fields = aggregate(&parse_lines([(&a, "x\n\u{c}\ny\u{7}z\n\u{1b}")]));
        let svg = render_annotation_svg(b"png", "image/png", 20, 60, &fields, &OverlayStyle::default());

        assert!(!svg.chars().any(|ch| ch.is_control()));
        assert!(svg.contains(r#"<tspan x="0" dy="36">yz</tspan>"#));

        let only_controls = aggregate(&parse_lines([(&a, "\u{c}")]));
        let svg = render_annotation_svg(b"png", "image/png", 20, 60, &only_controls, &OverlayStyle::default());
        assert_eq!(svg.matches("<rect ").count(), 1);
        assert!(!svg.contains("<text"));
    }

    #[test]
    fn rasterized_boxes_are_stroked_but_not_filled() {
        let source = painted_canvas(64, 48, &[]);
        let region = Region::new("field", 10, 10, 30, 20);
        let fields = aggregate(&parse_lines([(&region, "   ")])).cleaned();
        let svg = render_annotation_svg(
            &png_bytes(&source),
            "image/png",
            64,
            48,
            &fields,
            &OverlayStyle::default(),
        );
        let rendered = render_svg_image(&svg, None).expect("render");

        assert_eq!(rendered.dimensions(), (64, 48));
        let edge = rendered.get_pixel(10, 20).0;
        assert!(edge[1] > 200 && edge[0] < 60 && edge[2] < 60, "{edge:?}");
        let inside = rendered.get_pixel(25, 20).0;
        assert!(inside.iter().all(|channel| *channel > 240), "{inside:?}");
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(image_format_from_path(Path::new("out.PNG")), Some(ImageFormat::Png));
        assert_eq!(image_format_from_path(Path::new("out.jpeg")), Some(ImageFormat::Jpeg));
        assert_eq!(image_format_from_path(Path::new("out.txt")), None);
        assert_eq!(image_format_from_path(Path::new("out")), None);
    }

    #[test]
    fn jpeg_encoding_drops_alpha() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        let bytes = encode_image(&image, ImageFormat::Jpeg).expect("encode jpeg");
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }
}
