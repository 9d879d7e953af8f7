//! HTML and XML text helpers

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref RELATIVE_LINK: Regex =
        Regex::new(r#"(?P<attr>\b(?:href|src))=(?P<q>["'])(?P<url>/[^/"'][^"']*|/)["']"#).unwrap();
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape text for XML element content and attributes
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

/// Drop characters that are not allowed anywhere in an XML 1.0 document
pub fn strip_invalid_xml_chars(s: &str) -> String {
    s.chars().filter(|&c| is_xml_char(c)).collect()
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Strip HTML tags from a string
pub fn strip_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

/// Truncate to `length` characters, ending with an ellipsis
pub fn truncate(s: &str, length: usize) -> String {
    if s.chars().count() <= length {
        return s.to_string();
    }
    let truncated: String = s.chars().take(length.saturating_sub(1)).collect();
    format!("{}…", truncated.trim_end())
}

/// Count words; every CJK character counts as one word
pub fn count_words(s: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;

    for c in s.chars() {
        if is_cjk(c) {
            count += 1;
            in_word = false;
        } else if c.is_alphanumeric() || matches!(c, '\'' | '\u{2019}' | '-' | '_') {
            if !in_word {
                count += 1;
                in_word = true;
            }
        } else {
            in_word = false;
        }
    }

    count
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}')
}

/// Rewrite root-relative `href`/`src` attributes against `base_url`
pub fn absolutize_urls(html: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    RELATIVE_LINK
        .replace_all(html, |caps: &Captures| {
            format!(
                "{}={}{}{}{}",
                &caps["attr"], &caps["q"], base, &caps["url"], &caps["q"]
            )
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>World</b></p>"), "Hello World");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"Tom & "Jerry" <cat's>"#),
            "Tom &amp; &quot;Jerry&quot; &lt;cat&apos;s&gt;"
        );
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello World", 6), "Hello…");
        assert_eq!(truncate("Hi", 10), "Hi");
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("Hello, world! It's a well-known test."), 6);
        assert_eq!(count_words("你好世界"), 4);
        assert_eq!(count_words("Rust 很好"), 3);
        assert_eq!(count_words("don\u{2019}t stop"), 2);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn test_absolutize_urls() {
        let html = r#"<a href="/posts/a/">a</a><img src='/img/x.png'><a href="//cdn.io/y">y</a><a href="https://z.dev">z</a>"#;
        let out = absolutize_urls(html, "https://example.com/");
        assert!(out.contains(r#"href="https://example.com/posts/a/""#));
        assert!(out.contains("src='https://example.com/img/x.png'"));
        assert!(out.contains(r#"href="//cdn.io/y""#));
        assert!(out.contains(r#"href="https://z.dev""#));
    }
}
