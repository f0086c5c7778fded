use std::fs;
use std::path::Path;

use crate::error::LoadError;

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];
const MARKDOWN_MIME_TYPES: [&str; 2] = ["text/markdown", "text/x-markdown"];

/// Check if a file name points to a markdown file
pub fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            MARKDOWN_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn is_markdown_mime(mime: &str) -> bool {
    // Ignore parameters such as "; charset=UTF-8"
    let essence = mime.split(';').next().unwrap_or(mime).trim().to_lowercase();
    MARKDOWN_MIME_TYPES.contains(&essence.as_str())
}

/// A file is accepted when either its name or its MIME type says markdown.
pub fn is_accepted(name: &str, mime: &str) -> bool {
    is_markdown_path(Path::new(name)) || is_markdown_mime(mime)
}

/// Decoded file text
#[derive(Debug)]
pub struct Decoded {
    pub text: String,
    /// Invalid UTF-8 sequences were replaced with U+FFFD
    pub lossy: bool,
}

/// Decode bytes as UTF-8, replacing invalid sequences instead of failing.
pub fn decode(bytes: &[u8]) -> Decoded {
    match String::from_utf8_lossy(bytes) {
        std::borrow::Cow::Borrowed(text) => Decoded {
            text: text.to_string(),
            lossy: false,
        },
        std::borrow::Cow::Owned(text) => Decoded { text, lossy: true },
    }
}

/// Read raw bytes of a file chosen by path
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|e| LoadError::from_io(path.to_path_buf(), e))
}

/// Display name of a path (its file name, falling back to the full path)
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
