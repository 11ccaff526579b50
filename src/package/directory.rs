//! Directory-backed package
//!
//! Resolves modules straight from files on disk instead of an archive.
//! Candidate files are discovered from the directories containing the
//! explicit path set, top level only; the load pass installs a resolver
//! serving cross-references within that discovered set. Selected by
//! repository configuration for file-resident deployments.
//!
//! Unlike the archive package, a failed load pass is not remembered; the
//! next access retries against the live files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;
use uuid::Uuid;

use crate::part::{ModulePart, MODULE_FILE_EXTENSION};
use crate::resolver::{ModuleResolver, ResolverManager};
use crate::traits::{LoadPackageModulesError, LoadedModule, ModuleLoadError, PackageError};

/// Package resolving modules directly from module files on disk.
pub struct DirectoryPackage {
    uid: Uuid,
    explicit_paths: Vec<PathBuf>,
    discovered: Vec<PathBuf>,
    resolver_manager: Arc<ResolverManager>,
    state: Mutex<Option<HashMap<String, LoadedModule>>>,
}

impl DirectoryPackage {
    pub fn new(resolver_manager: Arc<ResolverManager>, module_paths: Vec<PathBuf>) -> Self {
        let mut directories: Vec<PathBuf> = Vec::new();
        for path in &module_paths {
            if let Some(parent) = path.parent() {
                if parent.is_dir() && !directories.iter().any(|d| d == parent) {
                    directories.push(parent.to_path_buf());
                }
            }
        }

        let mut discovered = Vec::new();
        for directory in &directories {
            if let Ok(entries) = fs::read_dir(directory) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let is_module = path.is_file()
                        && path
                            .extension()
                            .and_then(|e| e.to_str())
                            .map(|e| e.eq_ignore_ascii_case(MODULE_FILE_EXTENSION))
                            .unwrap_or(false);
                    if is_module {
                        discovered.push(path);
                    }
                }
            }
        }

        Self {
            uid: Uuid::new_v4(),
            explicit_paths: module_paths,
            discovered,
            resolver_manager,
            state: Mutex::new(None),
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn create_time(&self) -> SystemTime {
        UNIX_EPOCH
    }

    pub fn len(&self) -> usize {
        self.explicit_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.explicit_paths.is_empty()
    }

    pub fn part_at(&self, index: usize) -> Option<ModulePart> {
        self.explicit_paths.get(index).map(|p| part_for_path(p))
    }

    pub fn parts(&self) -> Vec<ModulePart> {
        self.explicit_paths.iter().map(|p| part_for_path(p)).collect()
    }

    pub fn contains(&self, part: &ModulePart) -> bool {
        self.explicit_paths
            .iter()
            .any(|p| file_name_of(p).map(|n| part.matches_file_name(n)).unwrap_or(false))
    }

    pub fn load_module(&self, part: &ModulePart) -> Result<LoadedModule, PackageError> {
        let mut state = self.state.lock().expect("package state poisoned");

        if state.is_none() {
            *state = Some(self.run_load_pass()?);
        }

        state
            .as_ref()
            .and_then(|map| map.get(&part.file_name().to_ascii_lowercase()).cloned())
            .ok_or_else(|| PackageError::PartNotFound(part.source().to_string()))
    }

    fn run_load_pass(&self) -> Result<HashMap<String, LoadedModule>, PackageError> {
        let resolver = Arc::new(DirectoryResolver {
            manager: Arc::clone(&self.resolver_manager),
            files: self.discovered.clone(),
            loaded: Mutex::new(HashMap::new()),
        });
        let _guard = self.resolver_manager.install(resolver.clone());

        let mut map = HashMap::new();
        let mut errors = Vec::new();

        for path in &self.explicit_paths {
            let part = part_for_path(path);
            match resolver.load_file(&part, path) {
                Ok(module) => {
                    map.insert(part.file_name().to_ascii_lowercase(), module);
                }
                Err(err) => {
                    debug!("failed to load module file '{}': {err}", path.display());
                    errors.push(ModuleLoadError {
                        part,
                        message: err.to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(map)
        } else {
            Err(PackageError::LoadAggregate(Arc::new(
                LoadPackageModulesError::new(errors),
            )))
        }
    }

    pub fn module_bytes(&self, part: &ModulePart) -> Result<Option<Vec<u8>>, PackageError> {
        let path = self.discovered.iter().find(|p| {
            file_name_of(p)
                .map(|n| part.matches_file_name(n))
                .unwrap_or(false)
        });
        match path {
            Some(path) => Ok(Some(fs::read(path)?)),
            None => Ok(None),
        }
    }

    pub fn extract_files(&self, _directory: &Path, _allow_overwrite: bool) -> Result<(), PackageError> {
        // File-resident packages have nothing to extract.
        Ok(())
    }
}

fn part_for_path(path: &Path) -> ModulePart {
    ModulePart::new(file_name_of(path).unwrap_or_default())
}

fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Resolver serving cross-references within the discovered file set for the
/// duration of one load pass.
struct DirectoryResolver {
    manager: Arc<ResolverManager>,
    files: Vec<PathBuf>,
    loaded: Mutex<HashMap<String, LoadedModule>>,
}

impl DirectoryResolver {
    fn load_file(&self, part: &ModulePart, path: &Path) -> Result<LoadedModule, PackageError> {
        let key = part.file_name().to_ascii_lowercase();
        if let Some(module) = self.loaded.lock().expect("load cache poisoned").get(&key) {
            return Ok(module.clone());
        }

        let host = self.manager.host();
        let module = host.load_from_path(part, path)?;
        host.verify(&module)?;

        self.loaded
            .lock()
            .expect("load cache poisoned")
            .insert(key, module.clone());
        Ok(module)
    }
}

impl ModuleResolver for DirectoryResolver {
    fn resolve(&self, name: &str) -> Option<Result<LoadedModule, PackageError>> {
        let mut file_name = name.to_string();
        let suffix = format!(".{MODULE_FILE_EXTENSION}");
        if !file_name.to_ascii_lowercase().ends_with(&suffix) {
            file_name.push_str(&suffix);
        }
        let part = ModulePart::new(file_name);

        let path = self.files.iter().find(|p| {
            file_name_of(p)
                .map(|n| part.matches_file_name(n))
                .unwrap_or(false)
        })?;
        Some(self.load_file(&part, &path.clone()))
    }
}
