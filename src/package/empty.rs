//! Empty package, used when nothing could be resolved.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::part::ModulePart;
use crate::traits::{LoadedModule, PackageError};

/// Zero-part closure.
pub struct EmptyPackage {
    uid: Uuid,
}

impl EmptyPackage {
    pub fn new() -> Self {
        Self {
            uid: Uuid::new_v4(),
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn create_time(&self) -> SystemTime {
        UNIX_EPOCH
    }

    pub fn len(&self) -> usize {
        0
    }

    pub fn is_empty(&self) -> bool {
        true
    }

    pub fn part_at(&self, _index: usize) -> Option<ModulePart> {
        None
    }

    pub fn parts(&self) -> Vec<ModulePart> {
        Vec::new()
    }

    pub fn contains(&self, _part: &ModulePart) -> bool {
        false
    }

    pub fn load_module(&self, part: &ModulePart) -> Result<LoadedModule, PackageError> {
        Err(PackageError::PartNotFound(part.source().to_string()))
    }

    pub fn module_bytes(&self, _part: &ModulePart) -> Result<Option<Vec<u8>>, PackageError> {
        Ok(None)
    }

    pub fn extract_files(&self, _directory: &Path, _allow_overwrite: bool) -> Result<(), PackageError> {
        Ok(())
    }
}

impl Default for EmptyPackage {
    fn default() -> Self {
        Self::new()
    }
}
