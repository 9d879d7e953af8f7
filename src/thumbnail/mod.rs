//! Open Graph thumbnail rendering
//!
//! A card is described as a small layout tree, serialized to SVG and
//! rasterized to PNG. Output depends only on the request and the
//! renderer's configuration.

mod layout;
mod raster;

pub use layout::{wrap, Justify, Node, PlacedText, TextStyle};
pub use raster::{parse_color, rasterize};

use resvg::tiny_skia::Color;
use resvg::usvg::fontdb;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::config::{SiteConfig, ThumbnailConfig};
use crate::error::{SiteError, SiteResult};

const TITLE_SIZE: f32 = 65.0;
const DESCRIPTION_SIZE: f32 = 30.0;
const TAGLINE_SIZE: f32 = 20.0;
const TITLE_MAX_LINES: usize = 4;

const BUNDLED_FAMILY: &str = "DejaVu Sans";
const BUNDLED_FONTS: [&[u8]; 2] = [
    include_bytes!("../../assets/fonts/DejaVuSans.ttf"),
    include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf"),
];

/// What to draw on a card
#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ThumbnailRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn validate(&self) -> SiteResult<()> {
        if self.title.trim().is_empty() {
            return Err(SiteError::BadRequest("missing `title` parameter".to_string()));
        }
        Ok(())
    }
}

/// Footer line: "<host> · <description> · @<twitter>"
pub fn default_tagline(site: &SiteConfig) -> String {
    let host = site
        .base_url()
        .split("://")
        .last()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_string();

    let mut parts = vec![host];
    if !site.description.is_empty() {
        parts.push(site.description.clone());
    }
    if let Some(twitter) = &site.author.twitter {
        parts.push(format!("@{}", twitter.trim_start_matches('@')));
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" · ")
}

/// Renders thumbnail PNGs with a fixed font set
#[derive(Clone)]
pub struct ThumbnailRenderer {
    config: ThumbnailConfig,
    tagline: String,
    fonts: Arc<fontdb::Database>,
    background: Color,
}

impl ThumbnailRenderer {
    /// Load configured fonts, fetching URLs and resolving paths against `base_dir`
    pub async fn load(
        config: &ThumbnailConfig,
        tagline: impl Into<String>,
        base_dir: &Path,
    ) -> SiteResult<Self> {
        let mut data = Vec::with_capacity(config.fonts.len());
        for font in &config.fonts {
            data.push(load_font(font, base_dir).await?);
        }
        Self::with_fonts(config, tagline, data)
    }

    /// Build a renderer from font file contents
    pub fn with_fonts(
        config: &ThumbnailConfig,
        tagline: impl Into<String>,
        fonts: Vec<Vec<u8>>,
    ) -> SiteResult<Self> {
        let mut db = fontdb::Database::new();
        for font in fonts {
            let before = db.len();
            db.load_font_data(font);
            if db.len() == before {
                return Err(SiteError::RenderFailure(
                    "font data contains no usable faces".to_string(),
                ));
            }
        }
        if config.bundled_fonts {
            for font in BUNDLED_FONTS {
                db.load_font_data(font.to_vec());
            }
            // Unmatched families resolve through the generic ones
            db.set_serif_family(BUNDLED_FAMILY);
            db.set_sans_serif_family(BUNDLED_FAMILY);
        }
        if config.system_fonts {
            db.load_system_fonts();
        }
        if db.is_empty() {
            return Err(SiteError::RenderFailure(
                "no fonts available for thumbnails".to_string(),
            ));
        }
        tracing::debug!("Loaded {} font faces for thumbnails", db.len());

        let background = parse_color(&config.background).ok_or_else(|| {
            SiteError::Config(format!("invalid thumbnail background {:?}", config.background))
        })?;

        Ok(Self {
            config: config.clone(),
            tagline: tagline.into(),
            fonts: Arc::new(db),
            background,
        })
    }

    /// The layout tree for a request
    pub fn card(&self, request: &ThumbnailRequest) -> Node {
        let mut heading = vec![Node::Text {
            content: request.title.trim().to_string(),
            style: TextStyle::new(TITLE_SIZE, 700, &self.config.title_color)
                .max_lines(TITLE_MAX_LINES),
        }];
        if let Some(description) = &request.description {
            heading.push(Node::Text {
                content: description.clone(),
                style: TextStyle::new(DESCRIPTION_SIZE, 400, &self.config.text_color)
                    .max_lines(2),
            });
        }

        let tagline = self
            .config
            .tagline
            .clone()
            .unwrap_or_else(|| self.tagline.clone());

        Node::Column {
            padding: (40.0, 70.0),
            gap: 0.0,
            justify: Justify::SpaceBetween,
            children: vec![
                Node::Column {
                    padding: (0.0, 0.0),
                    gap: 20.0,
                    justify: Justify::Start,
                    children: heading,
                },
                Node::Text {
                    content: tagline,
                    style: TextStyle::new(TAGLINE_SIZE, 400, &self.config.text_color).max_lines(1),
                },
            ],
        }
    }

    pub fn svg(&self, request: &ThumbnailRequest) -> String {
        let (width, height) = (self.config.width, self.config.height);
        let texts = self
            .card(request)
            .layout(0.0, 0.0, width as f32, height as f32);
        let family = format!("'{}', sans-serif", self.config.font_family);
        layout::to_svg(width, height, &self.config.gradient, &family, &texts)
    }

    /// Render a request to PNG bytes. CPU bound; run it off the async runtime.
    pub fn render(&self, request: &ThumbnailRequest) -> SiteResult<Vec<u8>> {
        request.validate()?;
        let svg = self.svg(request);
        rasterize(
            &svg,
            self.fonts.clone(),
            &self.config.font_family,
            self.config.fit_width,
            self.background,
        )
    }
}

async fn load_font(source: &str, base_dir: &Path) -> SiteResult<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let failure = |e: reqwest::Error| {
            SiteError::RenderFailure(format!("failed to fetch font {}: {}", source, e))
        };
        let response = reqwest::get(source)
            .await
            .map_err(failure)?
            .error_for_status()
            .map_err(failure)?;
        let bytes = response.bytes().await.map_err(failure)?;
        return Ok(bytes.to_vec());
    }

    let path = base_dir.join(source);
    tokio::fs::read(&path).await.map_err(|e| {
        SiteError::RenderFailure(format!("failed to read font {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

    fn renderer() -> ThumbnailRenderer {
        ThumbnailRenderer::with_fonts(
            &ThumbnailConfig::default(),
            "polpiella.dev · Swift",
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_render_produces_png() {
        let png = renderer()
            .render(&ThumbnailRequest::new("Building a blog in Rust"))
            .unwrap();
        assert_eq!(&png[..4], &PNG_MAGIC);
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = renderer();
        let request = ThumbnailRequest::new("Same input")
            .with_description(Some("Same description".to_string()));
        assert_eq!(
            renderer.render(&request).unwrap(),
            renderer.render(&request).unwrap()
        );
    }

    #[test]
    fn test_title_is_drawn() {
        let renderer = renderer();
        let hello = renderer.render(&ThumbnailRequest::new("Hello World")).unwrap();
        let other = renderer.render(&ThumbnailRequest::new("Another title")).unwrap();
        assert_ne!(hello, other);
    }

    #[test]
    fn test_unknown_family_falls_back_to_bundled_font() {
        let config = ThumbnailConfig {
            font_family: "Satoshi".to_string(),
            ..Default::default()
        };
        let renderer = ThumbnailRenderer::with_fonts(&config, "", Vec::new()).unwrap();
        assert!(renderer
            .svg(&ThumbnailRequest::new("Hello"))
            .contains("font-family=\"&apos;Satoshi&apos;, sans-serif\""));
        assert_ne!(
            renderer.render(&ThumbnailRequest::new("Hello World")).unwrap(),
            renderer.render(&ThumbnailRequest::new("Another title")).unwrap()
        );
    }

    #[test]
    fn test_no_fonts_fails() {
        let config = ThumbnailConfig {
            bundled_fonts: false,
            system_fonts: false,
            ..Default::default()
        };
        let result = ThumbnailRenderer::with_fonts(&config, "", Vec::new());
        assert!(matches!(result, Err(SiteError::RenderFailure(_))));
    }

    #[test]
    fn test_empty_title_is_bad_request() {
        let err = renderer()
            .render(&ThumbnailRequest::new("   "))
            .unwrap_err();
        assert!(matches!(err, SiteError::BadRequest(_)));
    }

    #[test]
    fn test_svg_contains_title_and_tagline() {
        let svg = renderer().svg(&ThumbnailRequest::new("Hello & welcome"));
        assert!(svg.contains("Hello &amp; welcome"));
        assert!(svg.contains("polpiella.dev · Swift"));
        assert!(svg.contains(r#"width="1200" height="630""#));
    }

    #[test]
    fn test_long_titles_are_clamped() {
        let title = "word ".repeat(200);
        let svg = renderer().svg(&ThumbnailRequest::new(title));
        assert!(svg.contains('…'));
    }

    #[test]
    fn test_invalid_font_data_fails() {
        let result = ThumbnailRenderer::with_fonts(
            &ThumbnailConfig::default(),
            "",
            vec![b"not a font".to_vec()],
        );
        assert!(matches!(result, Err(SiteError::RenderFailure(_))));
    }

    #[tokio::test]
    async fn test_missing_font_file_fails() {
        let dir = TempDir::new().unwrap();
        let config = ThumbnailConfig {
            fonts: vec!["fonts/Missing.ttf".to_string()],
            ..Default::default()
        };
        let result = ThumbnailRenderer::load(&config, "", dir.path()).await;
        assert!(matches!(result, Err(SiteError::RenderFailure(_))));
    }

    #[test]
    fn test_default_tagline() {
        let mut site = SiteConfig::default();
        site.url = "https://www.polpiella.dev".to_string();
        site.description = "A blog about Swift".to_string();
        site.author.twitter = Some("polpielladev".to_string());
        assert_eq!(
            default_tagline(&site),
            "polpiella.dev · A blog about Swift · @polpielladev"
        );
    }
}
