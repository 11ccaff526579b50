//! Archive entry sources
//!
//! An entry names one file inside a package and knows how to open its
//! content stream. Opening is deferred until the builder actually writes the
//! entry, so building from a large file set does not hold every file open at
//! once.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;

type EntryOpener = Box<dyn FnOnce() -> io::Result<Box<dyn Read + Send>> + Send>;

/// One file to be written into a package archive.
pub struct ArchiveEntry {
    name: String,
    opener: EntryOpener,
}

impl ArchiveEntry {
    /// Entry with a custom content source.
    pub fn new(
        name: impl Into<String>,
        opener: impl FnOnce() -> io::Result<Box<dyn Read + Send>> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            opener: Box::new(opener),
        }
    }

    /// Entry backed by a file on disk, opened lazily.
    pub fn from_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(name, move || {
            File::open(&path).map(|f| Box::new(f) as Box<dyn Read + Send>)
        })
    }

    /// Entry backed by an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, move || {
            Ok(Box::new(Cursor::new(bytes)) as Box<dyn Read + Send>)
        })
    }

    /// Entry name, the relative path inside the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consume the entry and open its content stream.
    pub fn open(self) -> io::Result<Box<dyn Read + Send>> {
        (self.opener)()
    }
}
