use std::path::PathBuf;

use thiserror::Error;

/// Failures while accepting a file into the previewer
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file type: {name}. Please choose a markdown file (.md, .markdown)")]
    UnsupportedFileType { name: String },

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Failed to load file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(path),
            std::io::ErrorKind::PermissionDenied => LoadError::PermissionDenied(path),
            _ => LoadError::Read { path, source },
        }
    }

    /// Rejections leave the current document alone; read failures replace it
    /// with an empty one.
    pub fn is_rejection(&self) -> bool {
        matches!(self, LoadError::UnsupportedFileType { .. })
    }
}

/// Failures while writing an HTML export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing to export: no document is open")]
    NoDocument,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Syntax theme error: {0}")]
    Theme(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_specific_variants() {
        let path = PathBuf::from("notes.md");
        let err = LoadError::from_io(path.clone(), std::io::ErrorKind::NotFound.into());
        assert!(matches!(err, LoadError::NotFound(_)));
        assert_eq!(err.to_string(), "File not found: notes.md");

        let err = LoadError::from_io(path.clone(), std::io::ErrorKind::PermissionDenied.into());
        assert!(matches!(err, LoadError::PermissionDenied(_)));

        let err = LoadError::from_io(path, std::io::ErrorKind::InvalidData.into());
        assert!(matches!(err, LoadError::Read { .. }));
        assert!(!err.is_rejection());
    }

    #[test]
    fn unsupported_type_is_a_rejection() {
        let err = LoadError::UnsupportedFileType {
            name: "notes.txt".to_string(),
        };
        assert!(err.is_rejection());
        assert!(err.to_string().contains("notes.txt"));
    }
}
