//! File-type classification.
//!
//! Media types are guessed from the file extension. The `mime_guess` database
//! is consulted first; extensions it does not know fall back to the system
//! `mime.types` tables, loaded once per process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{LabError, Result};
use crate::models::MediaKind;

/// System tables in the `type/subtype ext ext ...` format
const SYSTEM_TABLES: &[&str] = &[
    "/etc/mime.types",
    "/etc/httpd/mime.types",
    "/etc/apache2/mime.types",
    "/usr/share/mime/mime.types",
    "/usr/local/etc/mime.types",
];

static GLOBAL: OnceLock<MediaTypes> = OnceLock::new();

/// Extension to media-type lookup service
#[derive(Debug, Clone, Default)]
pub struct MediaTypes {
    // Extension (lowercase, no dot) -> media type, from mime.types tables
    extra: HashMap<String, String>,
}

impl MediaTypes {
    /// Process-wide registry, initialized from the system tables on first use
    pub fn global() -> &'static MediaTypes {
        GLOBAL.get_or_init(MediaTypes::system)
    }

    /// Registry backed by the built-in `mime_guess` database only
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Registry with whichever system tables exist on this machine
    pub fn system() -> Self {
        let mut types = Self::builtin();
        for table in SYSTEM_TABLES {
            if let Ok(contents) = std::fs::read_to_string(table) {
                debug!("Loaded media types from {}", table);
                types.merge_table(&contents);
            }
        }
        types
    }

    /// Registry extended with the given `mime.types`-formatted tables
    pub fn from_tables(tables: &[&str]) -> Self {
        let mut types = Self::builtin();
        for contents in tables {
            types.merge_table(contents);
        }
        types
    }

    fn merge_table(&mut self, contents: &str) {
        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let mut fields = line.split_whitespace();
            let Some(media_type) = fields.next() else {
                continue;
            };
            for ext in fields {
                // First table to mention an extension wins
                self.extra
                    .entry(ext.to_ascii_lowercase())
                    .or_insert_with(|| media_type.to_string());
            }
        }
    }

    /// Guess the media type string of a path from its extension
    pub fn guess_type(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        mime_guess::from_ext(&ext)
            .first_raw()
            .map(str::to_string)
            .or_else(|| self.extra.get(&ext).cloned())
    }

    /// Classify an existing file as image or video.
    ///
    /// Returns `Ok(None)` when the type is unknown or neither image nor video.
    pub fn classify(&self, path: &Path) -> Result<Option<MediaKind>> {
        if !path.is_file() {
            return Err(LabError::NotFound(path.to_path_buf()));
        }

        let kind = match self.guess_type(path) {
            Some(guess) if guess.contains("video") => Some(MediaKind::Video),
            Some(guess) if guess.contains("image") => Some(MediaKind::Image),
            _ => None,
        };

        Ok(kind)
    }
}

/// Classify a file using the process-wide registry
pub fn classify(path: &Path) -> Result<Option<MediaKind>> {
    MediaTypes::global().classify(path)
}
