use std::sync::LazyLock;

use regex::Regex;

/// A line starting with 1-6 `#` markers, whitespace other than a line break
/// (Unicode aware), then content.
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[^\S\r\n]+(.+)$").expect("heading pattern is valid"));

/// Represents a markdown heading for the outline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heading {
    /// Anchor id shared by the outline entry and the rendered heading element
    pub id: String,
    pub text: String,
    /// Number of leading `#` markers, 1..=6
    pub level: u8,
}

impl Heading {
    pub fn new(level: u8, text: &str) -> Self {
        Self {
            id: heading_id(level, text),
            text: text.to_string(),
            level,
        }
    }
}

/// Anchor id for a heading: `h<level>-` followed by the lowercased text with
/// every whitespace run collapsed into a single `-`.
pub fn heading_id(level: u8, text: &str) -> String {
    let mut id = format!("h{}-", level);
    let mut in_whitespace = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                id.push('-');
            }
            in_whitespace = true;
        } else {
            id.extend(c.to_lowercase());
            in_whitespace = false;
        }
    }
    id
}

/// Match a single source line against the heading pattern.
/// Returns the level and trimmed text, or `None` for non-headings.
pub fn parse_heading_line(line: &str) -> Option<(u8, &str)> {
    let caps = HEADING_RE.captures(line)?;
    let text = caps.get(2)?.as_str().trim();
    if text.is_empty() {
        return None;
    }
    Some((caps[1].len() as u8, text))
}

/// Extract every heading from the raw markdown, in document order.
///
/// Operates on raw text only: `#` lines inside fenced code blocks are matched
/// like any other line.
pub fn extract_headings(content: &str) -> Vec<Heading> {
    content
        .lines()
        .filter_map(parse_heading_line)
        .map(|(level, text)| Heading::new(level, text))
        .collect()
}
