use std::path::Path;

use crate::error::LoadError;
use crate::file;
use crate::outline::{extract_headings, Heading};
use crate::render::Renderer;
use crate::scroll::{reveal_offset, HeadingPositions, HeadingSpan, ScrollTracker};

/// What a successful open reports back to the view
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Opened {
    /// Invalid UTF-8 was replaced while decoding
    pub lossy: bool,
}

/// Owns the previewed document and everything derived from it.
///
/// Views read snapshots through the accessors and report user actions and
/// scroll offsets back through the methods; nothing else mutates this state.
pub struct Previewer<R: Renderer> {
    renderer: R,
    activation_offset: f32,
    file_name: Option<String>,
    content: String,
    headings: Vec<Heading>,
    rendered: Option<R::Output>,
    tracker: Option<ScrollTracker>,
    show_outline: bool,
}

impl<R: Renderer> Previewer<R> {
    pub fn new(renderer: R, activation_offset: f32) -> Self {
        Self {
            renderer,
            activation_offset,
            file_name: None,
            content: String::new(),
            headings: Vec::new(),
            rendered: None,
            tracker: None,
            show_outline: true,
        }
    }

    /// Accept a file given as name, MIME type and raw bytes (drag-and-drop).
    ///
    /// Non-markdown files are rejected without touching the current document.
    pub fn open(&mut self, name: &str, mime: &str, bytes: &[u8]) -> Result<Opened, LoadError> {
        if !file::is_accepted(name, mime) {
            log::warn!("Rejected non-markdown file: {} ({})", name, mime);
            return Err(LoadError::UnsupportedFileType {
                name: name.to_string(),
            });
        }

        let decoded = file::decode(bytes);
        if decoded.lossy {
            log::warn!("File {} contains invalid UTF-8", name);
        }
        self.file_name = Some(name.to_string());
        self.set_content(decoded.text);
        Ok(Opened {
            lossy: decoded.lossy,
        })
    }

    /// Accept a file from disk.
    ///
    /// An unreadable file still replaces the document, as an empty one.
    pub fn open_path(&mut self, path: &Path) -> Result<Opened, LoadError> {
        let name = file::display_name(path);
        if !file::is_markdown_path(path) {
            log::warn!("Rejected non-markdown file: {:?}", path);
            return Err(LoadError::UnsupportedFileType { name });
        }

        match file::read_bytes(path) {
            Ok(bytes) => {
                log::info!("Loaded file: {:?}", path);
                self.open(&name, "", &bytes)
            }
            Err(e) => {
                log::error!("Failed to load file {:?}: {}", path, e);
                self.file_name = Some(name);
                self.set_content(String::new());
                Err(e)
            }
        }
    }

    /// Replace the document text, recomputing headings and rendered output.
    pub fn set_content(&mut self, text: String) {
        // Drop the old tracker before anything else so it never sees the new layout.
        self.tracker = None;

        if text.trim().is_empty() {
            self.content = String::new();
            self.headings = Vec::new();
            self.rendered = None;
            return;
        }

        self.headings = extract_headings(&text);
        self.rendered = Some(self.renderer.render(&text));
        self.tracker = ScrollTracker::attach(&self.headings, self.activation_offset);
        self.content = text;
        log::debug!(
            "Document updated: {} lines, {} headings",
            self.content.lines().count(),
            self.headings.len()
        );
    }

    /// Back to the empty-document baseline
    pub fn reset(&mut self) {
        log::info!("Resetting previewer");
        self.file_name = None;
        self.set_content(String::new());
    }

    /// Viewport offset observed for this frame. Returns `true` when the active
    /// heading changed.
    pub fn on_scroll(&mut self, scroll_offset: f32, positions: &HeadingPositions) -> bool {
        match self.tracker.as_mut() {
            Some(tracker) => tracker.on_scroll(scroll_offset, &self.headings, positions),
            None => false,
        }
    }

    /// Outline click: mark the heading active and return the scroll offset
    /// that reveals it. The highlight stays on `id` while the viewport moves
    /// there.
    ///
    /// Unknown or not-yet-rendered headings give `None` and change nothing.
    pub fn select(&mut self, id: &str, positions: &HeadingPositions) -> Option<f32> {
        let span = self.scroll_target(id, positions)?;
        let offset = reveal_offset(span, self.activation_offset);
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.focus(id, offset);
        }
        Some(offset)
    }

    /// An outline-driven scroll is still on its way
    pub fn is_settling(&self) -> bool {
        self.tracker.as_ref().is_some_and(|t| t.is_settling())
    }

    pub fn scroll_target(&self, id: &str, positions: &HeadingPositions) -> Option<HeadingSpan> {
        if !self.headings.iter().any(|h| h.id == id) {
            return None;
        }
        positions.get(id)
    }

    pub fn toggle_outline(&mut self) {
        self.show_outline = !self.show_outline;
    }

    pub fn set_show_outline(&mut self, show: bool) {
        self.show_outline = show;
    }

    pub fn show_outline(&self) -> bool {
        self.show_outline
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_none()
    }

    pub fn headings(&self) -> &[Heading] {
        &self.headings
    }

    pub fn rendered(&self) -> Option<&R::Output> {
        self.rendered.as_ref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn active_heading(&self) -> Option<&str> {
        self.tracker.as_ref().and_then(|t| t.active())
    }

    pub fn is_tracking(&self) -> bool {
        self.tracker.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::scroll::ACTIVATION_OFFSET;

    /// Counts calls and echoes the text back
    #[derive(Default)]
    struct EchoRenderer {
        calls: Cell<usize>,
    }

    impl Renderer for EchoRenderer {
        type Output = String;

        fn render(&self, markdown: &str) -> String {
            self.calls.set(self.calls.get() + 1);
            markdown.to_uppercase()
        }
    }

    fn previewer() -> Previewer<EchoRenderer> {
        Previewer::new(EchoRenderer::default(), ACTIVATION_OFFSET)
    }

    fn positions() -> HeadingPositions {
        let mut positions = HeadingPositions::new();
        positions.record("h1-title", HeadingSpan::new(0.0, 40.0));
        positions.record("h2-sub", HeadingSpan::new(300.0, 30.0));
        positions
    }

    const DOC: &str = "# Title\n\nSome text\n\n## Sub\n\nMore text";

    #[test]
    fn open_markdown_extracts_and_renders_once() {
        let mut preview = previewer();
        let opened = preview.open("doc.md", "", DOC.as_bytes()).unwrap();
        assert!(!opened.lossy);

        let ids: Vec<_> = preview.headings().iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["h1-title", "h2-sub"]);
        assert_eq!(preview.rendered().map(String::as_str), Some(DOC.to_uppercase().as_str()));
        assert_eq!(preview.renderer.calls.get(), 1);
        assert_eq!(preview.file_name(), Some("doc.md"));
        assert!(preview.is_tracking());
    }

    #[test]
    fn rejected_file_leaves_state_unchanged() {
        let mut preview = previewer();
        preview.open("doc.md", "", DOC.as_bytes()).unwrap();

        let err = preview.open("notes.txt", "text/plain", b"# Other\n").unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(preview.file_name(), Some("doc.md"));
        assert_eq!(preview.content(), DOC);
        assert_eq!(preview.headings().len(), 2);
        assert_eq!(preview.renderer.calls.get(), 1);
    }

    #[test]
    fn markdown_mime_is_accepted_without_extension() {
        let mut preview = previewer();
        assert!(preview.open("pasted", "text/markdown", b"# A\n").is_ok());
        assert_eq!(preview.headings().len(), 1);
    }

    #[test]
    fn document_without_headings_is_not_tracked() {
        let mut preview = previewer();
        preview.open("plain.md", "", b"just a paragraph\n").unwrap();
        assert!(!preview.is_empty());
        assert!(preview.headings().is_empty());
        assert!(!preview.is_tracking());
        assert!(!preview.on_scroll(10.0, &positions()));
    }

    #[test]
    fn empty_file_becomes_empty_document() {
        let mut preview = previewer();
        preview.open("doc.md", "", DOC.as_bytes()).unwrap();
        preview.open("blank.md", "", b"  \n\n").unwrap();
        assert!(preview.is_empty());
        assert!(preview.headings().is_empty());
        assert_eq!(preview.active_heading(), None);
        assert_eq!(preview.renderer.calls.get(), 1);
    }

    #[test]
    fn lossy_decode_is_reported() {
        let mut preview = previewer();
        let opened = preview.open("doc.md", "", b"# Caf\xE9\n").unwrap();
        assert!(opened.lossy);
        assert_eq!(preview.headings().len(), 1);
    }

    #[test]
    fn scrolling_updates_active_heading() {
        let mut preview = previewer();
        preview.open("doc.md", "", DOC.as_bytes()).unwrap();
        let positions = positions();

        assert!(preview.on_scroll(-100.0, &positions));
        assert_eq!(preview.active_heading(), Some("h1-title"));

        assert!(preview.on_scroll(210.0, &positions));
        assert_eq!(preview.active_heading(), Some("h2-sub"));

        // Between headings nothing matches, the previous one stays active.
        assert!(!preview.on_scroll(100.0, &positions));
        assert_eq!(preview.active_heading(), Some("h2-sub"));
    }

    #[test]
    fn reset_clears_everything() {
        let mut preview = previewer();
        preview.open("doc.md", "", DOC.as_bytes()).unwrap();
        preview.on_scroll(210.0, &positions());
        preview.reset();

        assert!(preview.is_empty());
        assert_eq!(preview.file_name(), None);
        assert_eq!(preview.content(), "");
        assert!(preview.headings().is_empty());
        assert_eq!(preview.active_heading(), None);
        assert!(!preview.is_tracking());
    }

    #[test]
    fn new_content_starts_without_active_heading() {
        let mut preview = previewer();
        preview.open("doc.md", "", DOC.as_bytes()).unwrap();
        preview.on_scroll(210.0, &positions());
        preview.set_content("# Title\n\nchanged".to_string());
        assert_eq!(preview.active_heading(), None);
        assert_eq!(preview.headings().len(), 1);
    }

    #[test]
    fn select_returns_offset_and_marks_active() {
        let mut preview = previewer();
        preview.open("doc.md", "", DOC.as_bytes()).unwrap();
        let positions = positions();

        // Comparison point lands 15 points into the 30 point heading.
        assert_eq!(preview.select("h2-sub", &positions), Some(215.0));
        assert_eq!(preview.active_heading(), Some("h2-sub"));
        assert_eq!(preview.select("h1-title", &positions), Some(0.0));

        assert_eq!(preview.select("h3-missing", &positions), None);
        assert_eq!(preview.active_heading(), Some("h1-title"));
    }

    #[test]
    fn selected_heading_stays_active_while_scrolling_back_up() {
        let mut preview = previewer();
        preview.open("doc.md", "", DOC.as_bytes()).unwrap();
        let positions = positions();

        preview.on_scroll(600.0, &positions);
        assert_eq!(preview.select("h1-title", &positions), Some(0.0));

        // Animated scroll from 600 to 0 crosses "Sub" on the way.
        for offset in [600.0, 500.0, 400.0, 300.0, 210.0, 100.0, 20.0, 0.0] {
            assert!(!preview.on_scroll(offset, &positions));
            assert_eq!(preview.active_heading(), Some("h1-title"));
        }
        assert!(!preview.is_settling());

        // Manual scrolling is tracked again.
        assert!(preview.on_scroll(220.0, &positions));
        assert_eq!(preview.active_heading(), Some("h2-sub"));
    }

    #[test]
    fn scroll_stopping_short_of_target_resumes_tracking() {
        let mut preview = previewer();
        preview.open("doc.md", "", DOC.as_bytes()).unwrap();
        let positions = positions();

        preview.select("h2-sub", &positions);
        preview.on_scroll(0.0, &positions);
        preview.on_scroll(150.0, &positions);
        assert!(preview.is_settling());
        // Clamped by the end of the document: the offset stops moving.
        preview.on_scroll(150.0, &positions);
        assert!(!preview.is_settling());
        assert_eq!(preview.active_heading(), Some("h2-sub"));

        assert!(preview.on_scroll(-100.0, &positions));
        assert_eq!(preview.active_heading(), Some("h1-title"));
    }

    #[test]
    fn unrendered_heading_has_no_target() {
        let mut preview = previewer();
        preview.open("doc.md", "", b"# Title\n```\n# in code\n```\n").unwrap();
        assert_eq!(preview.headings().len(), 2);
        assert_eq!(preview.scroll_target("h1-in-code", &positions()), None);
    }

    #[test]
    fn open_path_reads_and_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("guide.md");
        std::fs::write(&md, DOC).unwrap();
        let txt = dir.path().join("guide.txt");
        std::fs::write(&txt, DOC).unwrap();

        let mut preview = previewer();
        preview.open_path(&md).unwrap();
        assert_eq!(preview.file_name(), Some("guide.md"));

        assert!(preview.open_path(&txt).unwrap_err().is_rejection());
        assert_eq!(preview.file_name(), Some("guide.md"));
        assert_eq!(preview.headings().len(), 2);
    }

    #[test]
    fn unreadable_path_degrades_to_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut preview = previewer();
        preview.open("doc.md", "", DOC.as_bytes()).unwrap();

        let err = preview.open_path(&dir.path().join("gone.md")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
        assert!(preview.is_empty());
        assert!(preview.headings().is_empty());
        assert_eq!(preview.file_name(), Some("gone.md"));
    }
}
