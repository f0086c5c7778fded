use crate::outline::{heading_id, parse_heading_line};
use crate::render::Renderer;

/// A slice of the document painted as its own block, so the heading element
/// at its start can be measured on screen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Section {
    /// Anchor id of the heading opening this section
    pub anchor: Option<String>,
    /// The heading line itself, rendered separately from the body
    pub heading: Option<String>,
    pub body: String,
}

impl Section {
    fn is_blank(&self) -> bool {
        self.heading.is_none() && self.body.trim().is_empty()
    }
}

/// Splits markdown into heading-anchored [`Section`]s for the egui view.
///
/// Headings inside fenced code stay part of the surrounding body.
#[derive(Clone, Copy, Debug, Default)]
pub struct SectionLayout;

impl Renderer for SectionLayout {
    type Output = Vec<Section>;

    fn render(&self, markdown: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current = Section::default();
        let mut fence: Option<Fence> = None;

        for line in markdown.lines() {
            if let Some(open) = fence {
                if open.closed_by(line) {
                    fence = None;
                }
                push_line(&mut current.body, line);
                continue;
            }
            if let Some(open) = Fence::opened_by(line) {
                fence = Some(open);
                push_line(&mut current.body, line);
                continue;
            }

            if let Some((level, text)) = parse_heading_line(line) {
                let finished = std::mem::replace(
                    &mut current,
                    Section {
                        anchor: Some(heading_id(level, text)),
                        heading: Some(line.trim_end().to_string()),
                        body: String::new(),
                    },
                );
                if !finished.is_blank() {
                    sections.push(finished);
                }
            } else {
                push_line(&mut current.body, line);
            }
        }

        if !current.is_blank() {
            sections.push(current);
        }
        sections
    }
}

fn push_line(body: &mut String, line: &str) {
    body.push_str(line);
    body.push('\n');
}

/// An open code fence: marker character and length
#[derive(Clone, Copy, Debug)]
struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    fn opened_by(line: &str) -> Option<Self> {
        let trimmed = line.trim_start_matches(' ');
        if line.len() - trimmed.len() > 3 {
            return None;
        }
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = trimmed.chars().take_while(|c| *c == marker).count();
        (len >= 3).then_some(Self { marker, len })
    }

    fn closed_by(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let len = trimmed.chars().take_while(|c| *c == self.marker).count();
        len >= self.len && len == trimmed.chars().count()
    }
}
