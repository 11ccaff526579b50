//! Package archive reading and module loading
//!
//! The read side of the codec recovers a package's part list from its
//! `manifest` entry, pulls single entries into memory, extracts whole
//! packages to a durable directory and drives the host load system over a
//! closure. During a load a resolver scoped to that closure is installed in
//! the [`ResolverManager`]; it answers only names belonging to the closure
//! and is removed on every exit path.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;
use zip::ZipArchive;

use super::manifest::{parse_parts, MANIFEST_ENTRY_NAME};
use super::ArchiveError;
use crate::part::{ModulePart, MODULE_FILE_EXTENSION};
use crate::resolver::{ModuleResolver, ResolverManager};
use crate::traits::{
    LoadPackageModulesError, LoadedModule, ModuleLoadError, PackageError,
};

/// Read-side operations over closure package archives.
pub struct PackageArchive;

impl PackageArchive {
    /// Ordered part list declared by the package's manifest entry.
    pub fn deployment_parts<R: Read + Seek>(reader: R) -> Result<Vec<ModulePart>, ArchiveError> {
        let mut archive = ZipArchive::new(reader)?;
        Self::parts_from_archive(&mut archive)
    }

    fn parts_from_archive<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<Vec<ModulePart>, ArchiveError> {
        let index = archive
            .index_for_name(MANIFEST_ENTRY_NAME)
            .ok_or(ArchiveError::ManifestMissing)?;
        let mut entry = archive.by_index(index)?;
        let mut manifest = Vec::new();
        entry.read_to_end(&mut manifest)?;
        drop(entry);
        parse_parts(&manifest)
    }

    /// Bytes of the entry matching the part's source name exactly, or `None`
    /// when the package has no such entry.
    pub fn entry_bytes<R: Read + Seek>(
        reader: R,
        part: &ModulePart,
    ) -> Result<Option<Vec<u8>>, ArchiveError> {
        let mut archive = ZipArchive::new(reader)?;
        let index = (0..archive.len()).find(|&i| {
            archive
                .name_for_index(i)
                .map(|name| name == part.source())
                .unwrap_or(false)
        });
        match index {
            Some(index) => {
                let mut entry = archive.by_index(index)?;
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    /// Extract every entry to the output directory. Existing files are
    /// reused when `allow_overwrite` is off, so a durable extraction
    /// directory survives across loads.
    pub fn extract_files<R: Read + Seek>(
        reader: R,
        output_directory: &Path,
        allow_overwrite: bool,
    ) -> Result<(), ArchiveError> {
        let mut archive = ZipArchive::new(reader)?;
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let Some(relative) = entry.enclosed_name() else {
                warn!("skipping archive entry with unsafe path: {}", entry.name());
                continue;
            };
            let target = output_directory.join(relative);
            if target.exists() && !allow_overwrite {
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;
        }
        Ok(())
    }

    /// Load every part of the package through the host.
    ///
    /// With a repository directory configured the package is extracted to
    /// `<repository>/<uid>/` and modules load from files; otherwise each
    /// part's bytes are pulled into memory. A resolver scoped to the closure
    /// is installed for the duration of the call. Per-part failures are
    /// collected and loading continues; the result carries the successfully
    /// loaded modules plus one aggregated error for the failures.
    pub fn load_packaged_modules(
        resolver_manager: &Arc<ResolverManager>,
        repository_directory: Option<&Path>,
        uid: Uuid,
        package_path: &Path,
    ) -> Result<
        (
            Vec<(ModulePart, LoadedModule)>,
            Option<LoadPackageModulesError>,
        ),
        ArchiveError,
    > {
        let file = File::open(package_path)?;
        let mut archive = ZipArchive::new(file)?;
        let parts = Self::parts_from_archive(&mut archive)?;

        let extraction_directory = match repository_directory {
            Some(root) => {
                let dir = root.join(uid.to_string());
                fs::create_dir_all(&dir)?;
                drop(archive);
                let file = File::open(package_path)?;
                Self::extract_files(file, &dir, false)?;
                Some(dir)
            }
            None => None,
        };

        let sources = match &extraction_directory {
            Some(dir) => ClosureSources::Extracted(dir.clone()),
            None => {
                // Memory mode: pull every closure entry up front so the
                // archive handle does not outlive this call.
                let file = File::open(package_path)?;
                let mut archive = ZipArchive::new(file)?;
                let mut bytes_by_source = HashMap::new();
                for part in &parts {
                    if let Some(index) = (0..archive.len()).find(|&i| {
                        archive
                            .name_for_index(i)
                            .map(|name| name == part.source())
                            .unwrap_or(false)
                    }) {
                        let mut entry = archive.by_index(index)?;
                        let mut bytes = Vec::new();
                        entry.read_to_end(&mut bytes)?;
                        bytes_by_source.insert(part.source().to_ascii_lowercase(), bytes);
                    }
                }
                ClosureSources::Memory(bytes_by_source)
            }
        };

        let resolver = Arc::new(ClosureResolver {
            manager: Arc::clone(resolver_manager),
            parts: parts.clone(),
            sources: sources.clone(),
            loaded: Mutex::new(HashMap::new()),
        });
        let _guard = resolver_manager.install(resolver.clone());

        let mut modules = Vec::new();
        let mut errors = Vec::new();

        for part in &parts {
            match resolver.load_part(part) {
                Ok(module) => modules.push((part.clone(), module)),
                Err(err) => {
                    debug!("failed to load package module '{part}': {err}");
                    errors.push(ModuleLoadError {
                        part: part.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let aggregate = if errors.is_empty() {
            None
        } else {
            Some(LoadPackageModulesError::new(errors))
        };

        Ok((modules, aggregate))
    }
}

#[derive(Clone)]
enum ClosureSources {
    Extracted(PathBuf),
    Memory(HashMap<String, Vec<u8>>),
}

/// Resolver scoped to one load operation's closure. Answers only names in
/// the closure; everything else is declined so the host's normal resolution
/// continues.
struct ClosureResolver {
    manager: Arc<ResolverManager>,
    parts: Vec<ModulePart>,
    sources: ClosureSources,
    loaded: Mutex<HashMap<String, LoadedModule>>,
}

impl ClosureResolver {
    fn load_part(&self, part: &ModulePart) -> Result<LoadedModule, PackageError> {
        let key = part.source().to_ascii_lowercase();
        if let Some(module) = self.loaded.lock().expect("closure cache poisoned").get(&key) {
            return Ok(module.clone());
        }

        let host = self.manager.host();
        let module = match &self.sources {
            ClosureSources::Extracted(dir) => {
                let module = host.load_from_path(part, &dir.join(part.source()))?;
                host.verify(&module)?;
                module
            }
            ClosureSources::Memory(bytes_by_source) => {
                let bytes = bytes_by_source
                    .get(&key)
                    .ok_or_else(|| PackageError::PartNotFound(part.source().to_string()))?;
                let module = host.load_from_bytes(part, bytes)?;
                host.verify(&module)?;
                module
            }
        };

        self.loaded
            .lock()
            .expect("closure cache poisoned")
            .insert(key, module.clone());
        Ok(module)
    }
}

impl ModuleResolver for ClosureResolver {
    fn resolve(&self, name: &str) -> Option<Result<LoadedModule, PackageError>> {
        let mut source = name.to_string();
        let suffix = format!(".{MODULE_FILE_EXTENSION}");
        if !source.to_ascii_lowercase().ends_with(&suffix) {
            source.push_str(&suffix);
        }
        let candidate = ModulePart::new(source);

        let part = self.parts.iter().find(|p| **p == candidate)?;
        Some(self.load_part(part))
    }
}
