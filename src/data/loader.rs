use std::path::{Path, PathBuf};

use log::{info, warn};

use super::decoder::{Decoder, DecoderConfig};
use super::extract::extract;
use super::model::{metadata, Record, SpectrumSeries};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Load options
// ---------------------------------------------------------------------------

/// How a save file should be loaded.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Merge every file of a directory. Not supported yet: merging traces
    /// by frequency has no defined semantics.
    pub parse_all: bool,
    pub decoder: DecoderConfig,
}

// ---------------------------------------------------------------------------
// SpectrumData – one decoded save file
// ---------------------------------------------------------------------------

/// A decoded save file together with where it came from.
#[derive(Debug, Clone)]
pub struct SpectrumData {
    path: Option<PathBuf>,
    record: Record,
}

impl SpectrumData {
    /// Load from either raw text or a path, never both.
    ///
    /// * text and path together → [`Error::InputConflict`]
    /// * text with `parse_all` → [`Error::InputConflict`]
    /// * path that does not exist → [`Error::NotFound`]
    /// * directory with `parse_all` → [`Error::UnsupportedMode`]
    /// * file without `parse_all` → decoded
    /// * file with `parse_all`, or directory without it → [`Error::InputConflict`]
    pub fn load(text: Option<&str>, path: Option<&Path>, options: &LoadOptions) -> Result<Self> {
        let decoder = Decoder::with_config(options.decoder.clone());

        match (text, path) {
            (Some(_), Some(_)) => Err(Error::InputConflict(
                "both text and path supplied, choose one".into(),
            )),
            (Some(_), None) if options.parse_all => Err(Error::InputConflict(
                "parse_all only applies to a directory path".into(),
            )),
            (Some(text), None) => Ok(Self {
                path: None,
                record: decoder.decode(text)?,
            }),
            (None, Some(path)) => Self::load_path(&decoder, path, options.parse_all),
            (None, None) => Err(Error::InputConflict("neither text nor path supplied".into())),
        }
    }

    fn load_path(decoder: &Decoder, path: &Path, parse_all: bool) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }

        if parse_all && path.is_dir() {
            warn!("refusing to merge directory {}", path.display());
            return Err(Error::UnsupportedMode(path.to_path_buf()));
        }
        if parse_all || !path.is_file() {
            return Err(Error::InputConflict(format!(
                "{} must be a file unless parse_all is set, and a directory if it is",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let record = decoder.decode(&text)?;
        info!("decoded {} ({} top-level keys)", path.display(), record.len());

        Ok(Self {
            path: Some(path.to_path_buf()),
            record,
        })
    }

    /// Decode raw text with default options.
    pub fn from_text(text: &str) -> Result<Self> {
        Self::load(Some(text), None, &LoadOptions::default())
    }

    /// Decode a single file with default options.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(None, Some(path.as_ref()), &LoadOptions::default())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    /// The `METADATA` map, if the file had any content.
    pub fn metadata(&self) -> Option<&Record> {
        metadata(&self.record)
    }

    /// The trace, or [`Error::SpectrumNotFound`] for metadata-only files.
    pub fn spectrum(&self) -> Result<SpectrumSeries> {
        extract(&self.record)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.record)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.record)?)
    }
}
