//! Archive-backed package
//!
//! Wraps one `.xap` file. The part list and creation time are read at open
//! time; modules are resolved lazily by a single load pass whose outcome is
//! cached. A failed pass is remembered and re-returned on later calls
//! instead of retried, so a broken package does not pay the extraction cost
//! on every access; only a fresh instance resets that state.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use uuid::Uuid;

use crate::archive::{ArchiveError, PackageArchive};
use crate::part::ModulePart;
use crate::resolver::ResolverManager;
use crate::traits::{LoadPackageModulesError, LoadedModule, PackageError};

enum LoadState {
    Unloaded,
    Loaded(HashMap<String, LoadedModule>),
    Failed(Arc<LoadPackageModulesError>),
}

/// Package backed by a closure archive file.
pub struct ArchivePackage {
    uid: Uuid,
    create_time: SystemTime,
    parts: Vec<ModulePart>,
    package_path: PathBuf,
    repository_directory: Option<PathBuf>,
    resolver_manager: Arc<ResolverManager>,
    state: Mutex<LoadState>,
}

impl ArchivePackage {
    /// Open an archive file and recover its closure. A missing file yields
    /// an empty closure stamped with the current time.
    pub fn open(
        resolver_manager: Arc<ResolverManager>,
        uid: Uuid,
        package_path: impl Into<PathBuf>,
        repository_directory: Option<PathBuf>,
    ) -> Result<Self, ArchiveError> {
        let package_path = package_path.into();

        let (parts, create_time) = match std::fs::metadata(&package_path) {
            Ok(metadata) => {
                let file = File::open(&package_path)?;
                let parts = PackageArchive::deployment_parts(file)?;
                let create_time = metadata.modified().unwrap_or_else(|_| SystemTime::now());
                (parts, create_time)
            }
            Err(_) => (Vec::new(), SystemTime::now()),
        };

        Ok(Self {
            uid,
            create_time,
            parts,
            package_path,
            repository_directory,
            resolver_manager,
            state: Mutex::new(LoadState::Unloaded),
        })
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn create_time(&self) -> SystemTime {
        self.create_time
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn part_at(&self, index: usize) -> Option<ModulePart> {
        self.parts.get(index).cloned()
    }

    pub fn parts(&self) -> Vec<ModulePart> {
        self.parts.clone()
    }

    pub fn contains(&self, part: &ModulePart) -> bool {
        self.parts.iter().any(|p| p == part)
    }

    /// Path of the backing archive file.
    pub fn package_path(&self) -> &Path {
        &self.package_path
    }

    pub fn load_module(&self, part: &ModulePart) -> Result<LoadedModule, PackageError> {
        let mut state = self.state.lock().expect("package state poisoned");

        if matches!(*state, LoadState::Unloaded) {
            match PackageArchive::load_packaged_modules(
                &self.resolver_manager,
                self.repository_directory.as_deref(),
                self.uid,
                &self.package_path,
            ) {
                Ok((loaded, None)) => {
                    let map = loaded
                        .into_iter()
                        .map(|(part, module)| (part.source().to_ascii_lowercase(), module))
                        .collect();
                    *state = LoadState::Loaded(map);
                }
                Ok((_, Some(aggregate))) => {
                    *state = LoadState::Failed(Arc::new(aggregate));
                }
                Err(err) => return Err(PackageError::Archive(err.to_string())),
            }
        }

        match &*state {
            LoadState::Loaded(map) => map
                .get(&part.source().to_ascii_lowercase())
                .cloned()
                .ok_or_else(|| PackageError::PartNotFound(part.source().to_string())),
            LoadState::Failed(aggregate) => Err(PackageError::LoadAggregate(Arc::clone(aggregate))),
            LoadState::Unloaded => Err(PackageError::Archive(
                "package module load did not run".to_string(),
            )),
        }
    }

    pub fn module_bytes(&self, part: &ModulePart) -> Result<Option<Vec<u8>>, PackageError> {
        let metadata = match std::fs::metadata(&self.package_path) {
            Ok(metadata) => metadata,
            Err(_) => return Ok(None),
        };
        if metadata.len() == 0 {
            return Ok(None);
        }
        let file = File::open(&self.package_path)?;
        PackageArchive::entry_bytes(file, part).map_err(|e| PackageError::Archive(e.to_string()))
    }

    pub fn extract_files(&self, directory: &Path, allow_overwrite: bool) -> Result<(), PackageError> {
        if !self.package_path.is_file() {
            return Ok(());
        }
        let file = File::open(&self.package_path)?;
        PackageArchive::extract_files(file, directory, allow_overwrite)
            .map_err(|e| PackageError::Archive(e.to_string()))
    }
}
