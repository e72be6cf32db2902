use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning a template into a timetable.
#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid document container {}: {source}", .path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Malformed XML in part '{part}': {message}")]
    Xml { part: String, message: String },

    #[error("Document {} has no '{part}'", .path.display())]
    MissingPart { path: PathBuf, part: String },

    /// No block of the template contains the marker at all.
    #[error("Placeholder '{placeholder}' not found in template")]
    MissingPlaceholder { placeholder: String },

    /// The marker is present but no single text run holds exactly the marker.
    #[error("Placeholder '{placeholder}' is not held exactly by any single text run")]
    PlaceholderSplit { placeholder: String },

    #[error("Invalid template path '{}': {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Blank path at position {index} in the input list")]
    BlankPath { index: usize },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output {} already exists", .path.display())]
    OutputExists { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Wraps a per-file failure so the report always names the template.
    #[error("{}: {source}", .path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: Box<TimetableError>,
    },
}

impl TimetableError {
    pub fn for_template(self, path: impl Into<PathBuf>) -> Self {
        match self {
            // already names its file
            TimetableError::Template { .. } => self,
            other => TimetableError::Template {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping `Template` wrappers.
    pub fn root(&self) -> &TimetableError {
        match self {
            TimetableError::Template { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T, E = TimetableError> = std::result::Result<T, E>;
