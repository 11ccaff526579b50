//! Cache entries of the package repository
//!
//! An entry binds one resolved package, or the pending part-set of an
//! unresolved request, to an optional backing file. The entry owns that
//! file's lifetime: eviction deletes the file and its extraction directory.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::package::Package;
use crate::part::ModulePart;

pub(crate) struct PackageCacheEntry {
    package: Option<Arc<Package>>,
    pending_parts: Option<Vec<ModulePart>>,
    file_path: Option<PathBuf>,
}

impl PackageCacheEntry {
    pub fn resolved(package: Arc<Package>, file_path: Option<PathBuf>) -> Self {
        Self {
            package: Some(package),
            pending_parts: None,
            file_path,
        }
    }

    /// Entry remembering a part-set nothing could resolve, so repeated
    /// requests do not re-run the build path.
    pub fn pending(parts: Vec<ModulePart>) -> Self {
        Self {
            package: None,
            pending_parts: Some(parts),
            file_path: None,
        }
    }

    pub fn package(&self) -> Option<&Arc<Package>> {
        self.package.as_ref()
    }

    pub fn file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }

    pub fn contains(&self, part: &ModulePart) -> bool {
        match &self.pending_parts {
            Some(parts) => parts.iter().any(|p| p == part),
            None => self
                .package
                .as_ref()
                .map(|p| p.contains(part))
                .unwrap_or(false),
        }
    }

    pub fn parts(&self) -> Vec<ModulePart> {
        match &self.pending_parts {
            Some(parts) => parts.clone(),
            None => self
                .package
                .as_ref()
                .map(|p| p.parts())
                .unwrap_or_default(),
        }
    }

    /// Freshness check performed at the time of use: the backing file, when
    /// present, must still exist, and no part's source file in the module
    /// directories may be newer than the package's creation time.
    pub fn is_fresh(&self, module_directories: &[PathBuf]) -> bool {
        if let Some(file_path) = &self.file_path {
            if !file_path.is_file() {
                return false;
            }
        }

        let directories: Vec<&PathBuf> = module_directories
            .iter()
            .filter(|d| d.is_dir())
            .collect();

        if self.file_path.is_none() || directories.is_empty() {
            return self.package.is_some();
        }

        let create_time = self
            .package
            .as_ref()
            .map(|p| p.create_time())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        for part in self.parts() {
            for directory in &directories {
                let candidate = directory.join(part.file_name());
                if let Ok(mtime) = fs::metadata(&candidate).and_then(|m| m.modified()) {
                    if mtime > create_time {
                        return false;
                    }
                    break;
                }
            }
        }
        true
    }

    /// Delete the backing file and its extraction directory, best effort.
    pub fn destroy(&self) {
        if let Some(file_path) = &self.file_path {
            if let Err(err) = fs::remove_file(file_path) {
                debug!("failed to delete package file '{}': {err}", file_path.display());
            }
            let extraction_directory = file_path.with_extension("");
            if extraction_directory.is_dir() {
                if let Err(err) = fs::remove_dir_all(&extraction_directory) {
                    debug!(
                        "failed to delete extraction directory '{}': {err}",
                        extraction_directory.display()
                    );
                }
            }
        }
    }
}
