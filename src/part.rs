//! Module part identity
//!
//! A part names one compiled module inside a package closure by its source
//! locator (a relative path). Comparisons are case-insensitive and path
//! separators are normalized, so parts written on different platforms still
//! match.

use std::fmt;
use std::hash::{Hash, Hasher};

/// File extension of compiled module binaries (without the leading dot).
pub const MODULE_FILE_EXTENSION: &str = "bin";

/// Identifier of one compiled module within a closure.
#[derive(Debug, Clone, Eq)]
pub struct ModulePart {
    source: String,
}

impl ModulePart {
    /// Create a part from its source locator. Backslash separators are
    /// normalized to forward slashes.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into().replace('\\', "/");
        Self { source }
    }

    /// Create a part for a bare module name, appending the module file
    /// extension.
    pub fn from_module_name(name: &str) -> Self {
        Self::new(format!("{name}.{MODULE_FILE_EXTENSION}"))
    }

    /// The source locator string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Final path component of the source locator.
    pub fn file_name(&self) -> &str {
        self.source
            .rsplit('/')
            .next()
            .unwrap_or(self.source.as_str())
    }

    /// Module name, the file name without its extension.
    pub fn module_name(&self) -> &str {
        let file_name = self.file_name();
        match file_name.rfind('.') {
            Some(idx) => &file_name[..idx],
            None => file_name,
        }
    }

    /// Whether the given on-disk file name belongs to this part.
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        self.file_name().eq_ignore_ascii_case(file_name)
    }
}

impl PartialEq for ModulePart {
    fn eq(&self, other: &Self) -> bool {
        self.source.eq_ignore_ascii_case(&other.source)
    }
}

impl Hash for ModulePart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.source.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for ModulePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
