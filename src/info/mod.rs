//! Persistent module metadata
//!
//! Tracks, per module binary, its declared name, on-disk write time and the
//! ordered list of modules it references. The cache is reseeded lazily from
//! a persisted manifest and refreshed incrementally against directory
//! timestamps so the expensive analyzer only runs for files that actually
//! changed.

mod cache;

pub use cache::ModuleInfoCache;

use std::time::SystemTime;

/// Metadata of one module binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module name (file name without extension).
    pub name: String,
    /// Last write time of the backing file when the entry was recorded.
    pub last_write_time: SystemTime,
    /// Names of referenced modules, in declaration order.
    pub references: Vec<String>,
}

/// Progress notifications of the module-info cache.
///
/// `loaded` fires exactly once, on first successful initialization.
pub trait ModuleInfoObserver: Send + Sync {
    fn loaded(&self) {}

    fn loading_files(&self) {}

    fn analysis_progress(&self, _message: &str, _percent: u8) {}
}
