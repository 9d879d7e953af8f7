//! Markdown rendering through an explicit, ordered pipeline of stages
//!
//! The markdown source is parsed once into a pulldown-cmark event list, each
//! stage rewrites or inspects that list in order, and the result is
//! serialized to HTML. Stages declare which other stages must run before
//! them; the builder rejects a pipeline that violates those constraints.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use super::post::{ReadingTime, TocEntry};
use crate::config::{AutolinkBehavior, MarkdownConfig};
use crate::error::{SiteError, SiteResult};
use crate::helpers::{count_words, html_escape, strip_html};

/// Marker separating the excerpt from the rest of a post
pub const MORE_MARKER: &str = "<!-- more -->";

/// One step of the markdown pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Give every heading a unique `id`
    HeadingSlugs,
    /// Replace fenced code blocks with syntect-highlighted HTML
    SyntaxHighlight,
    /// Link each heading to its own anchor
    AutolinkHeadings(AutolinkBehavior),
    /// Collect headings up to `max_depth`
    TableOfContents { max_depth: usize },
    /// Count words and estimate reading time
    ReadingTime { words_per_minute: usize },
}

/// Stage identity, without parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    HeadingSlugs,
    SyntaxHighlight,
    AutolinkHeadings,
    TableOfContents,
    ReadingTime,
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::HeadingSlugs => StageKind::HeadingSlugs,
            Stage::SyntaxHighlight => StageKind::SyntaxHighlight,
            Stage::AutolinkHeadings(_) => StageKind::AutolinkHeadings,
            Stage::TableOfContents { .. } => StageKind::TableOfContents,
            Stage::ReadingTime { .. } => StageKind::ReadingTime,
        }
    }

    /// Stages that must appear earlier in the pipeline
    pub fn requires(&self) -> &'static [StageKind] {
        match self {
            Stage::AutolinkHeadings(_) | Stage::TableOfContents { .. } => {
                &[StageKind::HeadingSlugs]
            }
            _ => &[],
        }
    }
}

/// Output of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMarkdown {
    pub html: String,
    pub toc: Vec<TocEntry>,
    /// Present when the pipeline has a reading-time stage
    pub reading_time: Option<ReadingTime>,
}

/// Builder for [`MarkdownPipeline`]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
    theme_name: String,
    line_numbers: bool,
}

impl PipelineBuilder {
    /// Append a stage; stages run in the order they are added
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn highlight_theme(mut self, theme: &str) -> Self {
        self.theme_name = theme.to_string();
        self
    }

    pub fn line_numbers(mut self, enabled: bool) -> Self {
        self.line_numbers = enabled;
        self
    }

    /// Validate stage ordering and load highlighting assets
    pub fn build(self) -> SiteResult<MarkdownPipeline> {
        for (i, stage) in self.stages.iter().enumerate() {
            let earlier = &self.stages[..i];
            if earlier.iter().any(|s| s.kind() == stage.kind()) {
                return Err(SiteError::Pipeline(format!(
                    "stage {:?} appears more than once",
                    stage.kind()
                )));
            }
            for required in stage.requires() {
                if !earlier.iter().any(|s| s.kind() == *required) {
                    return Err(SiteError::Pipeline(format!(
                        "stage {:?} must run after {:?}",
                        stage.kind(),
                        required
                    )));
                }
            }
        }

        let theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .get(&self.theme_name)
            .cloned()
            .ok_or_else(|| {
                SiteError::Pipeline(format!("unknown highlight theme: {}", self.theme_name))
            })?;

        Ok(MarkdownPipeline {
            stages: self.stages,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
            line_numbers: self.line_numbers,
        })
    }
}

/// Markdown renderer with an ordered list of transform stages
pub struct MarkdownPipeline {
    stages: Vec<Stage>,
    syntax_set: SyntaxSet,
    theme: Theme,
    line_numbers: bool,
}

/// Scratch state shared by the stages of a single render
#[derive(Default)]
struct RenderState {
    toc: Vec<TocEntry>,
    reading_time: Option<ReadingTime>,
}

impl MarkdownPipeline {
    /// Start an empty pipeline
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder {
            stages: Vec::new(),
            theme_name: "base16-ocean.dark".to_string(),
            line_numbers: false,
        }
    }

    /// The standard blog pipeline:
    /// slugs, highlighting, heading links, table of contents, reading time
    pub fn from_config(config: &MarkdownConfig) -> SiteResult<Self> {
        let mut builder = Self::builder()
            .highlight_theme(&config.highlight_theme)
            .line_numbers(config.line_numbers)
            .stage(Stage::HeadingSlugs)
            .stage(Stage::SyntaxHighlight);
        if config.autolink != AutolinkBehavior::None {
            builder = builder.stage(Stage::AutolinkHeadings(config.autolink));
        }
        builder
            .stage(Stage::TableOfContents {
                max_depth: config.toc_depth,
            })
            .stage(Stage::ReadingTime {
                words_per_minute: config.words_per_minute,
            })
            .build()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> SiteResult<RenderedMarkdown> {
        let parser = Parser::new_ext(markdown, parser_options());
        let mut events: Vec<Event> = parser.collect();
        let mut state = RenderState::default();

        for stage in &self.stages {
            events = match stage {
                Stage::HeadingSlugs => assign_heading_ids(events),
                Stage::SyntaxHighlight => self.highlight_code_blocks(events),
                Stage::AutolinkHeadings(behavior) => autolink_headings(events, *behavior),
                Stage::TableOfContents { max_depth } => {
                    state.toc = collect_toc(&events, *max_depth);
                    events
                }
                Stage::ReadingTime { words_per_minute } => {
                    let words = count_event_words(&events);
                    state.reading_time = Some(ReadingTime::from_words(words, *words_per_minute));
                    events
                }
            };
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        Ok(RenderedMarkdown {
            html: html_output,
            toc: state.toc,
            reading_time: state.reading_time,
        })
    }

    fn highlight_code_blocks<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut output = Vec::with_capacity(events.len());
        let mut code_block: Option<(Option<String>, String)> = None;

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some((lang, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = code_block.take() {
                        let highlighted = self.highlight_code(&code, lang.as_deref());
                        output.push(Event::Html(CowStr::from(highlighted)));
                    }
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                other => output.push(other),
            }
        }

        output
    }

    /// Highlight a code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        let mut lines = Vec::new();
        for line in LinesWithEndings::from(code) {
            let highlighted = highlighter
                .highlight_line(line, &self.syntax_set)
                .and_then(|regions| {
                    styled_line_to_highlighted_html(&regions[..], IncludeBackground::No)
                });
            match highlighted {
                Ok(html) => lines.push(html),
                Err(e) => {
                    tracing::debug!("Highlighting failed for {}: {}", lang, e);
                    lines = LinesWithEndings::from(code).map(html_escape).collect();
                    break;
                }
            }
        }

        let background = self
            .theme
            .settings
            .background
            .map(|c| format!(" style=\"background-color:#{:02x}{:02x}{:02x};\"", c.r, c.g, c.b))
            .unwrap_or_default();

        if self.line_numbers {
            add_line_numbers(&lines, lang, &background)
        } else {
            format!(
                r#"<pre{}><code class="language-{}">{}</code></pre>"#,
                background,
                html_escape(lang),
                lines.concat()
            )
        }
    }

    /// Parse excerpt from content (split by `<!-- more -->`)
    pub fn split_excerpt(content: &str) -> (Option<String>, String) {
        if let Some(pos) = content.find(MORE_MARKER) {
            let excerpt = content[..pos].trim().to_string();
            let remaining = content[pos + MORE_MARKER.len()..].trim().to_string();
            let full = format!("{}\n\n{}", excerpt, remaining);
            (Some(excerpt), full)
        } else {
            (None, content.to_string())
        }
    }
}

fn parser_options() -> Options {
    // Front-matter is stripped before rendering, so no metadata blocks here
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_GFM
}

/// Plain text of a markdown fragment, whitespace collapsed
pub fn plain_text(markdown: &str) -> String {
    let mut text = String::new();
    for event in Parser::new_ext(markdown, parser_options()) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak | Event::End(_) => text.push(' '),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text inside the heading starting at `start`, and the index of its end tag
fn heading_text(events: &[Event], start: usize) -> (String, usize) {
    let mut text = String::new();
    let mut i = start + 1;
    while i < events.len() {
        match &events[i] {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
        i += 1;
    }
    (text.trim().to_string(), i)
}

fn assign_heading_ids(mut events: Vec<Event>) -> Vec<Event> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for i in 0..events.len() {
        let needs_id = match &events[i] {
            Event::Start(Tag::Heading { id: Some(id), .. }) => {
                seen.entry(id.to_string()).or_insert(0);
                false
            }
            Event::Start(Tag::Heading { id: None, .. }) => true,
            _ => false,
        };
        if !needs_id {
            continue;
        }

        let (text, _) = heading_text(&events, i);
        let base = match slug::slugify(&text) {
            s if s.is_empty() => "section".to_string(),
            s => s,
        };
        let unique = match seen.get_mut(&base) {
            Some(count) => {
                *count += 1;
                format!("{}-{}", base, count)
            }
            None => base.clone(),
        };
        seen.entry(unique.clone()).or_insert(0);

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(unique));
        }
    }

    events
}

fn autolink_headings(events: Vec<Event>, behavior: AutolinkBehavior) -> Vec<Event> {
    if behavior == AutolinkBehavior::None {
        return events;
    }

    let mut output = Vec::with_capacity(events.len() + 8);
    let mut open_anchor: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { ref id, .. }) => {
                let id = id.as_ref().map(|s| s.to_string());
                output.push(event);
                if let Some(id) = id {
                    match behavior {
                        AutolinkBehavior::Prepend => output.push(anchor_event(&id)),
                        AutolinkBehavior::Wrap => output.push(Event::InlineHtml(CowStr::from(
                            format!(r##"<a class="anchor" href="#{}">"##, id),
                        ))),
                        _ => {}
                    }
                    open_anchor = Some(id);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(id) = open_anchor.take() {
                    match behavior {
                        AutolinkBehavior::Append => output.push(anchor_event(&id)),
                        AutolinkBehavior::Wrap => {
                            output.push(Event::InlineHtml(CowStr::from("</a>")))
                        }
                        _ => {}
                    }
                }
                output.push(event);
            }
            other => output.push(other),
        }
    }

    output
}

fn anchor_event(id: &str) -> Event<'static> {
    Event::InlineHtml(CowStr::from(format!(
        r##"<a class="anchor" aria-hidden="true" tabindex="-1" href="#{}">#</a>"##,
        id
    )))
}

fn collect_toc(events: &[Event], max_depth: usize) -> Vec<TocEntry> {
    let mut toc = Vec::new();
    for (i, event) in events.iter().enumerate() {
        if let Event::Start(Tag::Heading {
            level,
            id: Some(id),
            ..
        }) = event
        {
            let level = heading_level(*level);
            if level as usize > max_depth {
                continue;
            }
            let (text, _) = heading_text(events, i);
            toc.push(TocEntry {
                level,
                id: id.to_string(),
                text,
            });
        }
    }
    toc
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn count_event_words(events: &[Event]) -> usize {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            // Highlighted code blocks are already HTML by now
            Event::Html(h) => {
                text.push_str(&strip_html(h));
                text.push(' ');
            }
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            // Inline markup never splits a word; block ends always do
            Event::End(end)
                if !matches!(
                    end,
                    TagEnd::Emphasis
                        | TagEnd::Strong
                        | TagEnd::Strikethrough
                        | TagEnd::Link
                        | TagEnd::Image
                ) =>
            {
                text.push(' ')
            }
            _ => {}
        }
    }
    count_words(&text)
}

/// Add line numbers to highlighted code
fn add_line_numbers(lines: &[String], lang: &str, background: &str) -> String {
    let gutter = (1..=lines.len())
        .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code"><pre{}>{}</pre></td></tr></table></figure>"#,
        html_escape(lang),
        gutter,
        background,
        lines.concat()
    )
}

/// Render a table of contents as nested ordered lists
pub fn toc_html(toc: &[TocEntry]) -> String {
    let mut html = r#"<ol class="toc">"#.to_string();
    let base = toc.iter().map(|e| e.level).min().unwrap_or(1);
    let mut current_level = base;

    for entry in toc {
        while current_level < entry.level {
            html.push_str("<ol>");
            current_level += 1;
        }
        while current_level > entry.level {
            html.push_str("</ol>");
            current_level -= 1;
        }
        html.push_str(&format!(
            r##"<li class="toc-item toc-level-{}"><a class="toc-link" href="#{}">{}</a></li>"##,
            entry.level,
            entry.id,
            html_escape(&entry.text)
        ));
    }

    while current_level > base {
        html.push_str("</ol>");
        current_level -= 1;
    }

    html.push_str("</ol>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> MarkdownPipeline {
        MarkdownPipeline::from_config(&MarkdownConfig::default()).unwrap()
    }

    #[test]
    fn test_render_basic_markdown() {
        let rendered = pipeline().render("Intro\n\nThis is a test.").unwrap();
        assert!(rendered.html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_heading_ids_and_prepended_anchor() {
        let rendered = pipeline().render("## Getting Started\n\ntext").unwrap();
        assert!(rendered.html.contains(r#"<h2 id="getting-started">"#));
        assert!(rendered.html.contains(r##"href="#getting-started">#</a>Getting Started</h2>"##));
    }

    #[test]
    fn test_duplicate_headings_get_unique_ids() {
        let rendered = pipeline().render("## Setup\n\n## Setup\n\n## Setup").unwrap();
        let ids: Vec<&str> = rendered.toc.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["setup", "setup-1", "setup-2"]);
    }

    #[test]
    fn test_explicit_heading_id_is_kept() {
        let rendered = pipeline().render("## Install {#install-steps}").unwrap();
        assert_eq!(rendered.toc[0].id, "install-steps");
    }

    #[test]
    fn test_render_code_block() {
        let rendered = pipeline()
            .render("```rust\nfn main() {}\n```")
            .unwrap();
        assert!(rendered.html.contains(r#"class="language-rust""#));
        assert!(rendered.html.contains("main"));
        assert!(!rendered.html.contains("```"));
    }

    #[test]
    fn test_line_numbers() {
        let pipeline = MarkdownPipeline::builder()
            .line_numbers(true)
            .stage(Stage::SyntaxHighlight)
            .build()
            .unwrap();
        let rendered = pipeline.render("```swift\nlet a = 1\nlet b = 2\n```").unwrap();
        assert!(rendered.html.contains(r#"<span class="line-number">2</span>"#));
        assert!(rendered.html.contains("highlight swift"));
    }

    #[test]
    fn test_toc_respects_depth() {
        let rendered = pipeline()
            .render("# Title\n\n## Part\n\n### Detail\n\n#### Too deep")
            .unwrap();
        let levels: Vec<u8> = rendered.toc.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![1, 2, 3]);
        assert_eq!(rendered.toc[1].text, "Part");

        let html = toc_html(&rendered.toc);
        assert!(html.starts_with(r#"<ol class="toc">"#));
        assert!(html.contains(r##"href="#detail""##));
    }

    #[test]
    fn test_reading_time() {
        let words = vec!["word"; 400].join(" ");
        let rendered = pipeline().render(&words).unwrap();
        let reading_time = rendered.reading_time.unwrap();
        assert_eq!(reading_time.words, 400);
        assert!((reading_time.minutes - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reading_time_counts_split_text_once() {
        let count = |md: &str| pipeline().render(md).unwrap().reading_time.unwrap().words;
        assert_eq!(count("don't stop"), 2);
        assert_eq!(count("**Rust**acean and *un*believable"), 3);
        assert_eq!(count("# Title\n\nfirst\nsecond\n\n- one\n- two"), 5);
    }

    #[test]
    fn test_autolink_before_slugs_is_rejected() {
        let result = MarkdownPipeline::builder()
            .stage(Stage::AutolinkHeadings(AutolinkBehavior::Prepend))
            .stage(Stage::HeadingSlugs)
            .build();
        assert!(matches!(result, Err(SiteError::Pipeline(_))));
    }

    #[test]
    fn test_duplicate_stage_is_rejected() {
        let result = MarkdownPipeline::builder()
            .stage(Stage::HeadingSlugs)
            .stage(Stage::HeadingSlugs)
            .build();
        assert!(matches!(result, Err(SiteError::Pipeline(_))));
    }

    #[test]
    fn test_unknown_theme_is_rejected() {
        let result = MarkdownPipeline::builder()
            .highlight_theme("no-such-theme")
            .build();
        assert!(matches!(result, Err(SiteError::Pipeline(_))));
    }

    #[test]
    fn test_wrap_behavior() {
        let pipeline = MarkdownPipeline::builder()
            .stage(Stage::HeadingSlugs)
            .stage(Stage::AutolinkHeadings(AutolinkBehavior::Wrap))
            .build()
            .unwrap();
        let rendered = pipeline.render("## Wrapped").unwrap();
        assert!(rendered
            .html
            .contains(r##"<a class="anchor" href="#wrapped">Wrapped</a></h2>"##));
    }

    #[test]
    fn test_render_is_idempotent() {
        let source = "# Hello\n\n## Hello\n\n```rust\nlet x = 1;\n```\n\nSome *text*.";
        let pipeline = pipeline();
        let first = pipeline.render(source).unwrap();
        let second = pipeline.render(source).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_split_excerpt() {
        let content = "This is excerpt.\n<!-- more -->\nThis is more content.";
        let (excerpt, full) = MarkdownPipeline::split_excerpt(content);
        assert_eq!(excerpt, Some("This is excerpt.".to_string()));
        assert!(full.contains("This is more content."));
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            plain_text("Some **bold** and `code`\nacross lines."),
            "Some bold and code across lines."
        );
    }
}
