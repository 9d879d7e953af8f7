//! SVG rasterization with resvg

use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg::{fontdb, Options, Tree};
use std::sync::Arc;

use crate::error::{SiteError, SiteResult};

/// Render `svg` to PNG bytes, scaled so the output is `fit_width` pixels wide
pub fn rasterize(
    svg: &str,
    fonts: Arc<fontdb::Database>,
    font_family: &str,
    fit_width: u32,
    background: Color,
) -> SiteResult<Vec<u8>> {
    let mut options = Options::default();
    options.fontdb = fonts;
    options.font_family = font_family.to_string();

    let tree = Tree::from_str(svg, &options)
        .map_err(|e| SiteError::RenderFailure(format!("invalid svg: {}", e)))?;

    let size = tree.size();
    let scale = fit_width as f32 / size.width();
    let height = (size.height() * scale).round() as u32;

    let mut pixmap = Pixmap::new(fit_width, height).ok_or_else(|| {
        SiteError::RenderFailure(format!("cannot allocate {}x{} pixmap", fit_width, height))
    })?;
    pixmap.fill(background);

    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| SiteError::RenderFailure(format!("png encoding failed: {}", e)))
}

/// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`
pub fn parse_color(s: &str) -> Option<Color> {
    let hex = s.strip_prefix('#')?;
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => {
            let mut rgb = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            Some(Color::from_rgba8(rgb.next()??, rgb.next()??, rgb.next()??, 255))
        }
        6 => Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, 255)),
        8 => Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

    #[test]
    fn test_rasterize_scales_to_fit_width() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="120" height="63"><rect width="120" height="63" fill="#4338ca"/></svg>"##;
        let png = rasterize(
            svg,
            Arc::new(fontdb::Database::new()),
            "Inter",
            240,
            Color::WHITE,
        )
        .unwrap();
        assert_eq!(&png[..4], &PNG_MAGIC);

        // IHDR width and height follow the 8-byte signature and chunk header
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        assert_eq!((width, height), (240, 126));
    }

    #[test]
    fn test_invalid_svg_is_render_failure() {
        let err = rasterize(
            "<not-svg",
            Arc::new(fontdb::Database::new()),
            "Inter",
            100,
            Color::WHITE,
        )
        .unwrap_err();
        assert!(matches!(err, SiteError::RenderFailure(_)));
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#fff"), Some(Color::WHITE));
        assert_eq!(parse_color("#ffffff"), Some(Color::WHITE));
        assert_eq!(
            parse_color("#00000080"),
            Some(Color::from_rgba8(0, 0, 0, 0x80))
        );
        assert_eq!(parse_color("white"), None);
        assert_eq!(parse_color("#12"), None);
    }
}
