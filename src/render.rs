//! Rendering capabilities.
//!
//! The controller only knows the [`Renderer`] trait: it hands over the full
//! markdown text once per content change and stores whatever comes back. The
//! egui view uses [`crate::layout::SectionLayout`]; HTML export uses
//! [`HtmlRenderer`].

use std::fs;
use std::path::Path;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::error::ExportError;
use crate::file;
use crate::outline::{extract_headings, heading_id, parse_heading_line, Heading};

const EXPORT_THEME: &str = "base16-ocean.light";

/// Turns a complete markdown document into displayable content
pub trait Renderer {
    type Output;

    fn render(&self, markdown: &str) -> Self::Output;
}

/// Sanitized HTML with anchored headings and class-highlighted code blocks
pub struct HtmlRenderer {
    options: Options,
    syntax_set: SyntaxSet,
    sanitizer: ammonia::Builder<'static>,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut sanitizer = ammonia::Builder::default();
        sanitizer
            .add_tags(["input"])
            .add_tag_attributes("input", ["type", "checked", "disabled"])
            .add_tag_attributes("pre", ["class"])
            .add_tag_attributes("code", ["class"])
            .add_tag_attributes("span", ["class"]);
        for tag in ["h1", "h2", "h3", "h4", "h5", "h6"] {
            sanitizer.add_tag_attributes(tag, ["id"]);
        }

        Self {
            options,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            sanitizer,
        }
    }

    /// Highlight a fenced code block into `<pre><code>` markup
    fn highlight(&self, lang: Option<&str>, code: &str) -> String {
        let syntax = lang
            .and_then(|token| self.syntax_set.find_syntax_by_token(token))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, ClassStyle::Spaced);
        let mut highlighted = true;
        for line in LinesWithEndings::from(code) {
            if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
                log::warn!("Syntax highlighting failed, falling back to plain text: {}", e);
                highlighted = false;
                break;
            }
        }
        let body = if highlighted {
            generator.finalize()
        } else {
            ammonia::clean_text(code)
        };

        match lang {
            Some(lang) => format!(
                "<pre class=\"code\"><code class=\"language-{}\">{}</code></pre>\n",
                ammonia::clean_text(lang),
                body
            ),
            None => format!("<pre class=\"code\"><code>{}</code></pre>\n", body),
        }
    }
}

/// Heading currently being collected from the event stream
struct PendingHeading<'a> {
    index: usize,
    level: u8,
    source_id: Option<String>,
    text: String,
    classes: Vec<CowStr<'a>>,
    attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
}

/// Fenced or indented code block being collected
struct PendingCode {
    lang: Option<String>,
    code: String,
}

impl Renderer for HtmlRenderer {
    type Output = String;

    fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options).into_offset_iter();

        let mut events: Vec<Event> = Vec::new();
        let mut heading: Option<PendingHeading> = None;
        let mut code: Option<PendingCode> = None;

        for (event, range) in parser {
            match event {
                Event::Start(Tag::Heading {
                    level,
                    classes,
                    attrs,
                    ..
                }) => {
                    // ATX headings take their id from the source line so it
                    // equals the outline's id; setext headings fall back to
                    // their rendered text.
                    let level = level as u8;
                    let line = markdown[range].lines().next().unwrap_or_default();
                    let source_id = parse_heading_line(line)
                        .filter(|(line_level, _)| *line_level == level)
                        .map(|(level, text)| heading_id(level, text));
                    heading = Some(PendingHeading {
                        index: events.len(),
                        level,
                        source_id,
                        text: String::new(),
                        classes,
                        attrs,
                    });
                    events.push(Event::Text(CowStr::Borrowed("")));
                }
                Event::End(TagEnd::Heading(level)) => {
                    if let Some(pending) = heading.take() {
                        let id = pending
                            .source_id
                            .unwrap_or_else(|| heading_id(pending.level, pending.text.trim()));
                        events[pending.index] = Event::Start(Tag::Heading {
                            level,
                            id: Some(CowStr::from(id)),
                            classes: pending.classes,
                            attrs: pending.attrs,
                        });
                    }
                    events.push(Event::End(TagEnd::Heading(level)));
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(|token| token.to_string()),
                        CodeBlockKind::Indented => None,
                    };
                    code = Some(PendingCode {
                        lang,
                        code: String::new(),
                    });
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(block) = code.take() {
                        let html = self.highlight(block.lang.as_deref(), &block.code);
                        events.push(Event::Html(CowStr::from(html)));
                    }
                }
                Event::Text(text) if code.is_some() => {
                    if let Some(block) = code.as_mut() {
                        block.code.push_str(&text);
                    }
                }
                Event::Text(ref text) | Event::Code(ref text) if heading.is_some() => {
                    if let Some(pending) = heading.as_mut() {
                        pending.text.push_str(text);
                    }
                    events.push(event);
                }
                other => events.push(other),
            }
        }

        let mut html_output = String::new();
        pulldown_cmark::html::push_html(&mut html_output, events.into_iter());
        self.sanitizer.clean(&html_output).to_string()
    }
}

/// Wrap rendered HTML into a standalone page with a table of contents
pub fn export_page(title: &str, headings: &[Heading], body: &str, theme_css: &str) -> String {
    let mut toc = String::from("<nav class=\"toc\">\n<h2>Table of Contents</h2>\n");
    if headings.is_empty() {
        toc.push_str("<p class=\"empty\">No headings found</p>\n");
    } else {
        toc.push_str("<ul>\n");
        for heading in headings {
            toc.push_str(&format!(
                "<li style=\"padding-left: {}px\"><a href=\"#{}\">{}</a></li>\n",
                heading.level as u32 * 12 + 16,
                ammonia::clean_text(&heading.id),
                ammonia::clean_text(&heading.text),
            ));
        }
        toc.push_str("</ul>\n");
    }
    toc.push_str("</nav>\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>
html {{ scroll-behavior: smooth; }}
body {{ display: flex; margin: 0; font-family: sans-serif; line-height: 1.5; }}
nav.toc {{ position: sticky; top: 0; align-self: flex-start; width: 16rem; max-height: 100vh; overflow-y: auto; border-right: 1px solid #ddd; }}
nav.toc ul {{ list-style: none; margin: 0; padding: 0; }}
nav.toc a {{ display: block; padding: 0.4rem 0; color: inherit; text-decoration: none; }}
main {{ flex: 1; max-width: 56rem; padding: 2rem; }}
h1, h2, h3, h4, h5, h6 {{ scroll-margin-top: 1rem; }}
pre.code {{ padding: 1rem; overflow-x: auto; background: #f6f8fa; }}
{theme_css}
</style>
</head>
<body>
{toc}<main>
{body}
</main>
</body>
</html>
"#,
        title = ammonia::clean_text(title),
        theme_css = theme_css,
        toc = toc,
        body = body,
    )
}

/// CSS for the class-based highlighting spans produced by [`HtmlRenderer`]
pub fn theme_css() -> Result<String, ExportError> {
    let themes = ThemeSet::load_defaults();
    let theme = themes
        .themes
        .get(EXPORT_THEME)
        .ok_or_else(|| ExportError::Theme(format!("missing theme {}", EXPORT_THEME)))?;
    css_for_theme_with_class_style(theme, ClassStyle::Spaced)
        .map_err(|e| ExportError::Theme(e.to_string()))
}

/// Render `markdown` into a standalone HTML page
pub fn export_html(renderer: &HtmlRenderer, title: &str, markdown: &str) -> Result<String, ExportError> {
    let headings = extract_headings(markdown);
    let body = renderer.render(markdown);
    Ok(export_page(title, &headings, &body, &theme_css()?))
}

/// Write an HTML export of `markdown` to `output`
pub fn export_to_file(title: &str, markdown: &str, output: &Path) -> Result<(), ExportError> {
    let page = export_html(&HtmlRenderer::new(), title, markdown)?;
    fs::write(output, page).map_err(|source| ExportError::Write {
        path: output.to_path_buf(),
        source,
    })?;
    log::info!("Exported HTML to {:?}", output);
    Ok(())
}

/// Headless export of a markdown file on disk
pub fn export_file(input: &Path, output: &Path) -> Result<(), ExportError> {
    if !file::is_markdown_path(input) {
        return Err(crate::error::LoadError::UnsupportedFileType {
            name: file::display_name(input),
        }
        .into());
    }
    let decoded = file::decode(&file::read_bytes(input)?);
    if decoded.lossy {
        log::warn!("File {:?} contains invalid UTF-8", input);
    }
    export_to_file(&file::display_name(input), &decoded.text, output)
}

/// Suggested export path next to the source file
pub fn suggest_export_path(input: &Path) -> std::path::PathBuf {
    input.with_extension("html")
}
