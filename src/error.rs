use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while loading, decoding or extracting.
#[derive(Debug, Error)]
pub enum Error {
    /// Mutually exclusive inputs were supplied together.
    #[error("conflicting inputs: {0}")]
    InputConflict(String),

    /// Merging every save file in a directory is not supported.
    #[error("directory mode is not supported: {}", .0.display())]
    UnsupportedMode(PathBuf),

    #[error("path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line asked to be written below a level that has no open section.
    #[error("line {line}: no open section at nesting level {level}")]
    Nesting { line: usize, level: usize },

    /// A populated top-level section uses the name reserved for metadata.
    #[error("top-level section '{key}' clashes with the reserved metadata key")]
    ReservedKey { key: String },

    /// A `P_<n>` entry could not be read as a `power , frequency unit` pair.
    #[error("malformed spectrum entry {key}='{value}': {reason}")]
    MalformedValue {
        key: String,
        value: String,
        reason: String,
    },

    /// No `P_<n>` section exists. Metadata-only files end up here.
    #[error("no spectrum found")]
    SpectrumNotFound,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// `true` for the one outcome callers are expected to shrug off.
    pub fn is_spectrum_not_found(&self) -> bool {
        matches!(self, Error::SpectrumNotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
