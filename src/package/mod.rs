//! Package abstraction
//!
//! A package is an ordered closure of module parts with provenance (unique
//! id, creation time) and lazy module loading. Three variants exist: archive
//! packages backed by a `.xap` file, directory packages resolving straight
//! from module files on disk, and the empty package used when nothing could
//! be resolved.

mod archive;
mod directory;
mod empty;

pub use archive::ArchivePackage;
pub use directory::DirectoryPackage;
pub use empty::EmptyPackage;

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use uuid::Uuid;

use crate::part::ModulePart;
use crate::traits::{LoadedModule, PackageError};

/// A closure of module parts with lazy module loading.
pub enum Package {
    Archive(ArchivePackage),
    Directory(DirectoryPackage),
    Empty(EmptyPackage),
}

impl Package {
    /// Unique id of the package.
    pub fn uid(&self) -> Uuid {
        match self {
            Package::Archive(p) => p.uid(),
            Package::Directory(p) => p.uid(),
            Package::Empty(p) => p.uid(),
        }
    }

    /// Creation time of the package contents.
    pub fn create_time(&self) -> SystemTime {
        match self {
            Package::Archive(p) => p.create_time(),
            Package::Directory(p) => p.create_time(),
            Package::Empty(p) => p.create_time(),
        }
    }

    /// Number of parts in the closure.
    pub fn len(&self) -> usize {
        match self {
            Package::Archive(p) => p.len(),
            Package::Directory(p) => p.len(),
            Package::Empty(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Part at the given closure position.
    pub fn part_at(&self, index: usize) -> Option<ModulePart> {
        match self {
            Package::Archive(p) => p.part_at(index),
            Package::Directory(p) => p.part_at(index),
            Package::Empty(p) => p.part_at(index),
        }
    }

    /// Ordered parts of the closure.
    pub fn parts(&self) -> Vec<ModulePart> {
        match self {
            Package::Archive(p) => p.parts(),
            Package::Directory(p) => p.parts(),
            Package::Empty(p) => p.parts(),
        }
    }

    /// Whether the closure contains the given part.
    pub fn contains(&self, part: &ModulePart) -> bool {
        match self {
            Package::Archive(p) => p.contains(part),
            Package::Directory(p) => p.contains(part),
            Package::Empty(p) => p.contains(part),
        }
    }

    /// Load one module of the closure, running the package's load pass on
    /// first access.
    pub fn load_module(&self, part: &ModulePart) -> Result<LoadedModule, PackageError> {
        match self {
            Package::Archive(p) => p.load_module(part),
            Package::Directory(p) => p.load_module(part),
            Package::Empty(p) => p.load_module(part),
        }
    }

    /// Like [`Package::load_module`], but hands back the module and the
    /// failure as a pair instead of a result.
    pub fn load_module_guarded(
        &self,
        part: &ModulePart,
    ) -> (Option<LoadedModule>, Option<PackageError>) {
        match self.load_module(part) {
            Ok(module) => (Some(module), None),
            Err(err) => (None, Some(err)),
        }
    }

    /// Raw bytes of one part, when the package has a byte-level backing.
    pub fn module_bytes(&self, part: &ModulePart) -> Result<Option<Vec<u8>>, PackageError> {
        match self {
            Package::Archive(p) => p.module_bytes(part),
            Package::Directory(p) => p.module_bytes(part),
            Package::Empty(p) => p.module_bytes(part),
        }
    }

    /// Extract the package's files into a directory.
    pub fn extract_files(&self, directory: &Path, allow_overwrite: bool) -> Result<(), PackageError> {
        match self {
            Package::Archive(p) => p.extract_files(directory, allow_overwrite),
            Package::Directory(p) => p.extract_files(directory, allow_overwrite),
            Package::Empty(p) => p.extract_files(directory, allow_overwrite),
        }
    }
}

/// Ordered, deduplicated set of packages answering one retrieval.
#[derive(Default, Clone)]
pub struct PackageContainer {
    packages: Vec<Arc<Package>>,
}

impl PackageContainer {
    /// Build a container, dropping duplicate package uids while preserving
    /// order.
    pub fn new(packages: impl IntoIterator<Item = Arc<Package>>) -> Self {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for package in packages {
            let uid = package.uid();
            if !seen.contains(&uid) {
                seen.push(uid);
                out.push(package);
            }
        }
        Self { packages: out }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Package>> {
        self.packages.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Package>> {
        self.packages.iter()
    }

    /// First package whose closure contains the given part.
    pub fn find_for_part(&self, part: &ModulePart) -> Option<&Arc<Package>> {
        self.packages.iter().find(|p| p.contains(part))
    }
}

impl<'a> IntoIterator for &'a PackageContainer {
    type Item = &'a Arc<Package>;
    type IntoIter = std::slice::Iter<'a, Arc<Package>>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}

impl IntoIterator for PackageContainer {
    type Item = Arc<Package>;
    type IntoIter = std::vec::IntoIter<Arc<Package>>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.into_iter()
    }
}
