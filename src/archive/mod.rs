//! Closure-package archive codec
//!
//! Packages are zip-compatible containers with one required `manifest` entry
//! listing the closure's parts, an optional `languages.config` entry and
//! arbitrary opaque payload entries at relative paths. The builder writes
//! packages from a source directory or an explicit entry list; the reader
//! recovers the part list, pulls single entries, extracts to a durable
//! directory and drives the host load system with a resolution hook scoped
//! to the closure being loaded.

mod builder;
mod config;
mod entry;
mod manifest;
mod reader;

pub use builder::ArchiveBuilder;
pub use config::{ArchiveConfig, LanguageInfo};
pub use entry::ArchiveEntry;
pub use manifest::{
    parse_parts, ConfigManifestTemplate, ManifestGenerator, PartsManifestTemplate,
    LANGUAGES_ENTRY_NAME, MANIFEST_ENTRY_NAME,
};
pub use reader::PackageArchive;

use thiserror::Error;

/// Errors of the package archive codec.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("package manifest entry not found")]
    ManifestMissing,

    #[error("invalid package manifest: {0}")]
    InvalidManifest(String),

    #[error("module listed in manifest not found: {0}")]
    MissingModule(String),

    #[error("archive error: {0}")]
    Zip(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        ArchiveError::Io(e.to_string())
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(e: zip::result::ZipError) -> Self {
        ArchiveError::Zip(e.to_string())
    }
}

impl From<quick_xml::Error> for ArchiveError {
    fn from(e: quick_xml::Error) -> Self {
        ArchiveError::InvalidManifest(e.to_string())
    }
}
