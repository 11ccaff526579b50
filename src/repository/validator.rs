//! Batch package validation
//!
//! The validator collaborator answers, per package, whether a cached package
//! may still be served. The default implementation compares every part's
//! source file against the package's creation time over one directory
//! listing snapshot per batch.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::package::Package;
use super::RepositoryError;

/// Batch package validation contract; verdicts align with the input by
/// index.
pub trait PackageValidator: Send + Sync {
    fn validate(&self, packages: &[Arc<Package>]) -> Vec<bool>;
}

/// Validates packages against the source files in a set of module
/// directories: every part must be present and not newer than the package.
pub struct FreshnessValidator {
    module_directories: Vec<PathBuf>,
}

impl FreshnessValidator {
    pub fn new(module_directories: Vec<PathBuf>) -> Result<Self, RepositoryError> {
        for directory in &module_directories {
            if directory.as_os_str().is_empty() || !directory.is_dir() {
                return Err(RepositoryError::Configuration {
                    directory: directory.display().to_string(),
                    message: "module files directory does not exist".to_string(),
                });
            }
        }
        Ok(Self { module_directories })
    }

    /// Snapshot of file names across the directories; first directory wins
    /// on duplicates. Write times are stat'ed lazily per file.
    fn directory_files(&self) -> HashMap<String, FileStamp> {
        let mut files = HashMap::new();
        for directory in &self.module_directories {
            let Ok(entries) = fs::read_dir(directory) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files
                        .entry(name.to_ascii_lowercase())
                        .or_insert_with(|| FileStamp::new(path.clone()));
                }
            }
        }
        files
    }

    fn validate_one(&self, package: &Package, files: &mut HashMap<String, FileStamp>) -> bool {
        for part in package.parts() {
            let Some(stamp) = files.get_mut(&part.file_name().to_ascii_lowercase()) else {
                return false;
            };
            match stamp.last_write_time() {
                Some(mtime) if mtime > package.create_time() => return false,
                Some(_) => {}
                None => return false,
            }
        }
        true
    }
}

impl PackageValidator for FreshnessValidator {
    fn validate(&self, packages: &[Arc<Package>]) -> Vec<bool> {
        if packages.is_empty() {
            return Vec::new();
        }
        let mut files = self.directory_files();
        packages
            .iter()
            .map(|package| self.validate_one(package, &mut files))
            .collect()
    }
}

struct FileStamp {
    path: PathBuf,
    last_write_time: Option<Option<SystemTime>>,
}

impl FileStamp {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_write_time: None,
        }
    }

    fn last_write_time(&mut self) -> Option<SystemTime> {
        if self.last_write_time.is_none() {
            let mtime = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
            self.last_write_time = Some(mtime);
        }
        self.last_write_time.unwrap_or(None)
    }
}
