//! A tiny box layout for thumbnail cards, serialized to SVG

use crate::helpers::escape_xml;

/// Average advance of a Latin glyph, as a fraction of the font size
const LATIN_ADVANCE: f32 = 0.56;
/// Bold faces run a little wider
const BOLD_ADVANCE: f32 = 0.6;
/// Full-width glyphs (CJK, kana, hangul)
const WIDE_ADVANCE: f32 = 1.0;

const ELLIPSIS: char = '…';

/// Main-axis distribution of a column's children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Start,
    SpaceBetween,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub weight: u16,
    pub color: String,
    /// Line box height as a multiple of `size`
    pub line_height: f32,
    pub max_lines: Option<usize>,
}

impl TextStyle {
    pub fn new(size: f32, weight: u16, color: &str) -> Self {
        Self {
            size,
            weight,
            color: color.to_string(),
            line_height: 1.2,
            max_lines: None,
        }
    }

    pub fn max_lines(mut self, lines: usize) -> Self {
        self.max_lines = Some(lines);
        self
    }

    fn line_box(&self) -> f32 {
        self.size * self.line_height
    }

    fn char_width(&self, c: char) -> f32 {
        if is_wide(c) {
            self.size * WIDE_ADVANCE
        } else if self.weight >= 600 {
            self.size * BOLD_ADVANCE
        } else {
            self.size * LATIN_ADVANCE
        }
    }

    fn text_width(&self, s: &str) -> f32 {
        s.chars().map(|c| self.char_width(c)).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Column {
        /// Vertical and horizontal padding
        padding: (f32, f32),
        gap: f32,
        justify: Justify,
        children: Vec<Node>,
    },
    Text {
        content: String,
        style: TextStyle,
    },
}

/// One line of text at its final position
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub x: f32,
    pub baseline: f32,
    pub text: String,
    pub size: f32,
    pub weight: u16,
    pub color: String,
}

impl Node {
    /// Height the node takes when given `width`
    pub fn measure(&self, width: f32) -> f32 {
        match self {
            Node::Text { content, style } => {
                wrap(content, width, style).len() as f32 * style.line_box()
            }
            Node::Column {
                padding,
                gap,
                children,
                ..
            } => {
                let inner = width - padding.1 * 2.0;
                let content: f32 = children.iter().map(|c| c.measure(inner)).sum();
                let gaps = gap * children.len().saturating_sub(1) as f32;
                content + gaps + padding.0 * 2.0
            }
        }
    }

    /// Place every text line inside the box at (`x`, `y`)
    pub fn layout(&self, x: f32, y: f32, width: f32, height: f32) -> Vec<PlacedText> {
        let mut placed = Vec::new();
        self.layout_into(x, y, width, height, &mut placed);
        placed
    }

    fn layout_into(&self, x: f32, y: f32, width: f32, height: f32, out: &mut Vec<PlacedText>) {
        match self {
            Node::Text { content, style } => {
                let line_box = style.line_box();
                // Half-leading above, then roughly the ascent
                let first_baseline = y + (line_box - style.size) / 2.0 + style.size * 0.8;
                for (i, line) in wrap(content, width, style).into_iter().enumerate() {
                    out.push(PlacedText {
                        x,
                        baseline: first_baseline + i as f32 * line_box,
                        text: line,
                        size: style.size,
                        weight: style.weight,
                        color: style.color.clone(),
                    });
                }
            }
            Node::Column {
                padding,
                gap,
                justify,
                children,
            } => {
                let inner_x = x + padding.1;
                let inner_y = y + padding.0;
                let inner_w = (width - padding.1 * 2.0).max(0.0);
                let inner_h = (height - padding.0 * 2.0).max(0.0);

                let heights: Vec<f32> = children.iter().map(|c| c.measure(inner_w)).collect();
                let total: f32 = heights.iter().sum();

                let spacing = match justify {
                    Justify::SpaceBetween if children.len() > 1 => {
                        ((inner_h - total) / (children.len() - 1) as f32).max(*gap)
                    }
                    _ => *gap,
                };

                let mut cursor = inner_y;
                for (child, h) in children.iter().zip(heights) {
                    child.layout_into(inner_x, cursor, inner_w, h, out);
                    cursor += h + spacing;
                }
            }
        }
    }
}

/// Greedy word wrap with estimated glyph advances
pub fn wrap(text: &str, width: f32, style: &TextStyle) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if style.text_width(&candidate) <= width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        // Break words that cannot fit on a line of their own
        for c in word.chars() {
            if !current.is_empty() && style.text_width(&current) + style.char_width(c) > width {
                lines.push(std::mem::take(&mut current));
            }
            current.push(c);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if let Some(max) = style.max_lines {
        if lines.len() > max {
            lines.truncate(max);
            if let Some(last) = lines.last_mut() {
                *last = with_ellipsis(last, width, style);
            }
        }
    }

    lines
}

fn with_ellipsis(line: &str, width: f32, style: &TextStyle) -> String {
    let mut out: String = line.to_string();
    while !out.is_empty() && style.text_width(&out) + style.char_width(ELLIPSIS) > width {
        out.pop();
    }
    let mut out = out.trim_end().to_string();
    out.push(ELLIPSIS);
    out
}

fn is_wide(c: char) -> bool {
    matches!(c,
        '\u{1100}'..='\u{115F}'
        | '\u{2E80}'..='\u{A4CF}'
        | '\u{AC00}'..='\u{D7A3}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FF60}')
}

/// Split `#RRGGBBAA` into an SVG colour and an opacity
fn paint(color: &str) -> (String, Option<f32>) {
    let hex = color.trim_start_matches('#');
    if color.starts_with('#') && hex.len() == 8 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let alpha = u8::from_str_radix(&hex[6..], 16).unwrap_or(255);
        return (format!("#{}", &hex[..6]), Some(alpha as f32 / 255.0));
    }
    (color.to_string(), None)
}

fn fill_attrs(color: &str) -> String {
    match paint(color) {
        (fill, Some(opacity)) => format!(r#"fill="{}" fill-opacity="{:.3}""#, escape_xml(&fill), opacity),
        (fill, None) => format!(r#"fill="{}""#, escape_xml(&fill)),
    }
}

/// Serialize placed text over a gradient background
pub fn to_svg(
    width: u32,
    height: u32,
    gradient: &[String],
    font_family: &str,
    texts: &[PlacedText],
) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push('\n');

    match gradient {
        [] => {}
        [single] => {
            svg.push_str(&format!(
                "  <rect width=\"{}\" height=\"{}\" {}/>\n",
                width,
                height,
                fill_attrs(single)
            ));
        }
        stops => {
            svg.push_str("  <defs>\n");
            svg.push_str(r#"    <linearGradient id="bg" x1="0" y1="0" x2="1" y2="1">"#);
            svg.push('\n');
            let last = (stops.len() - 1) as f32;
            for (i, stop) in stops.iter().enumerate() {
                let (color, opacity) = paint(stop);
                svg.push_str(&format!(
                    "      <stop offset=\"{:.3}\" stop-color=\"{}\" stop-opacity=\"{:.3}\"/>\n",
                    i as f32 / last,
                    escape_xml(&color),
                    opacity.unwrap_or(1.0)
                ));
            }
            svg.push_str("    </linearGradient>\n");
            svg.push_str("  </defs>\n");
            svg.push_str(&format!(
                "  <rect width=\"{}\" height=\"{}\" fill=\"url(#bg)\"/>\n",
                width, height
            ));
        }
    }

    for text in texts {
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" font-family=\"{}\" font-size=\"{}\" font-weight=\"{}\" {} xml:space=\"preserve\">{}</text>\n",
            text.x,
            text.baseline,
            escape_xml(font_family),
            text.size,
            text.weight,
            fill_attrs(&text.color),
            escape_xml(&text.text)
        ));
    }

    svg.push_str("</svg>\n");
    svg
}
