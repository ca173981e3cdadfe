//! Markup cleaning for item bodies.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</?p(\s[^>]*)?>").unwrap());
static SUBMITTED_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)\s*submitted by\s*/u/\S+.*$").unwrap());
static LINK_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[link\]|\[comments\]").unwrap());
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Turn an HTML fragment into plain text.
///
/// Line-breaking tags become newlines, every other tag is dropped, and
/// entities are decoded.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let text = COMMENT.replace_all(html, "");
    let text = LINE_BREAK.replace_all(&text, "\n");

    let fragment = Html::parse_fragment(&text);
    let text: String = fragment.root_element().text().collect();

    let text = SUBMITTED_BY.replace_all(&text, "");
    let text = LINK_MARKERS.replace_all(&text, "");
    let text = normalize_lines(&text);
    BLANK_RUN.replace_all(&text, "\n\n").trim().to_string()
}

/// Clean a post body and drop boilerplate phrases.
pub fn clean_post(html: &str, strip_phrases: &[String]) -> String {
    let mut text = clean_html(html);
    for phrase in strip_phrases {
        if !phrase.is_empty() {
            text = text.replace(phrase.as_str(), "");
        }
    }
    BLANK_RUN.replace_all(text.trim(), "\n\n").to_string()
}

/// Decode entities in a single-line string such as a title.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.trim().to_string();
    }
    let fragment = Html::parse_fragment(text);
    let decoded: String = fragment.root_element().text().collect();
    decoded.trim().to_string()
}

fn normalize_lines(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}
