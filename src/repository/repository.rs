//! Package repository orchestration
//!
//! One repository instance exclusively owns its on-disk directory of
//! `<uid>.xap` package files. Bootstrap runs on a background task and
//! recovers the cache from disk; retrieval matches requested parts against
//! cached entries, re-validates them at time of use, evicts stale ones and
//! satisfies unresolved parts by building locally or delegating to the
//! downloader. All cache-list mutation happens inside one mutex; the
//! downloader is serialized separately so at most one batch download is
//! outstanding.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::entry::PackageCacheEntry;
use super::maintenance::{
    MaintenanceEntryKind, RepositoryMaintenance, ValidateEntry, ValidateEntryKind, ValidateResult,
};
use super::validator::PackageValidator;
use super::{RepositoryError, RepositoryState};
use crate::archive::{
    ArchiveBuilder, ArchiveConfig, ArchiveEntry, LanguageInfo, PartsManifestTemplate,
};
use crate::info::ModuleInfoCache;
use crate::package::{ArchivePackage, DirectoryPackage, Package, PackageContainer};
use crate::part::{ModulePart, MODULE_FILE_EXTENSION};
use crate::resolver::ResolverManager;
use crate::traits::{DownloadedPackage, ModuleAnalyzer, ModuleData, PackageDownloader};

/// File extension of cached package archives.
pub const PACKAGE_FILE_EXTENSION: &str = "xap";

const STARTING_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DOWNLOADER_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Static configuration of a repository instance.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Directory owning the cached package files. Created if absent.
    pub repository_directory: PathBuf,
    /// Directories holding loose module files; enables local package
    /// construction and freshness checks against source files.
    pub module_file_directories: Vec<PathBuf>,
    /// Serve file-resident deployments through directory packages instead
    /// of building archives.
    pub use_directory_packages: bool,
}

impl RepositoryConfig {
    pub fn new(repository_directory: impl Into<PathBuf>) -> Self {
        Self {
            repository_directory: repository_directory.into(),
            module_file_directories: Vec::new(),
            use_directory_packages: false,
        }
    }
}

/// Builder wiring the repository's collaborators.
pub struct RepositoryBuilder {
    config: RepositoryConfig,
    resolver_manager: Arc<ResolverManager>,
    info_cache: Option<Arc<ModuleInfoCache>>,
    analyzer: Option<Arc<dyn ModuleAnalyzer>>,
    downloader: Option<Arc<dyn PackageDownloader>>,
    validator: Option<Arc<dyn PackageValidator>>,
    maintenance: Vec<Arc<dyn RepositoryMaintenance>>,
}

impl RepositoryBuilder {
    pub fn info_cache(mut self, info_cache: Arc<ModuleInfoCache>) -> Self {
        self.info_cache = Some(info_cache);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn ModuleAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn downloader(mut self, downloader: Arc<dyn PackageDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn PackageValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn maintenance(mut self, instance: Arc<dyn RepositoryMaintenance>) -> Self {
        self.maintenance.push(instance);
        self
    }

    /// Create the repository. Fails fast when the repository directory is
    /// invalid or cannot be created.
    pub fn build(self) -> Result<Arc<PackageRepository>, RepositoryError> {
        let directory = &self.config.repository_directory;
        if directory.as_os_str().is_empty() {
            return Err(RepositoryError::Configuration {
                directory: String::new(),
                message: "repository directory cannot be empty".to_string(),
            });
        }
        fs::create_dir_all(directory).map_err(|e| RepositoryError::Configuration {
            directory: directory.display().to_string(),
            message: e.to_string(),
        })?;

        let (state_tx, _) = watch::channel(RepositoryState::NotStarted);

        Ok(Arc::new(PackageRepository {
            config: self.config,
            resolver_manager: self.resolver_manager,
            info_cache: self.info_cache,
            analyzer: self.analyzer,
            downloader: self.downloader,
            validator: self.validator,
            maintenance: self.maintenance,
            packages: Mutex::new(Vec::new()),
            state_tx,
            downloader_lock: tokio::sync::Mutex::new(()),
            bootstrap_task: Mutex::new(None),
        }))
    }
}

/// On-disk repository of closure packages.
pub struct PackageRepository {
    config: RepositoryConfig,
    resolver_manager: Arc<ResolverManager>,
    info_cache: Option<Arc<ModuleInfoCache>>,
    analyzer: Option<Arc<dyn ModuleAnalyzer>>,
    downloader: Option<Arc<dyn PackageDownloader>>,
    validator: Option<Arc<dyn PackageValidator>>,
    maintenance: Vec<Arc<dyn RepositoryMaintenance>>,
    packages: Mutex<Vec<PackageCacheEntry>>,
    state_tx: watch::Sender<RepositoryState>,
    downloader_lock: tokio::sync::Mutex<()>,
    bootstrap_task: Mutex<Option<JoinHandle<()>>>,
}

impl PackageRepository {
    pub fn builder(
        config: RepositoryConfig,
        resolver_manager: Arc<ResolverManager>,
    ) -> RepositoryBuilder {
        RepositoryBuilder {
            config,
            resolver_manager,
            info_cache: None,
            analyzer: None,
            downloader: None,
            validator: None,
            maintenance: Vec::new(),
        }
    }

    pub fn repository_directory(&self) -> &Path {
        &self.config.repository_directory
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RepositoryState {
        self.state_tx.borrow().clone()
    }

    pub fn is_started(&self) -> bool {
        self.state().is_started()
    }

    /// Watch channel following the lifecycle; the `Started` value fires
    /// exactly once and carries the aggregated bootstrap errors.
    pub fn subscribe_started(&self) -> watch::Receiver<RepositoryState> {
        self.state_tx.subscribe()
    }

    /// Kick off background bootstrap. Idempotent: a second call while
    /// starting or after start is a no-op.
    pub fn start(self: &Arc<Self>) {
        let transitioned = self.state_tx.send_if_modified(|state| {
            if matches!(state, RepositoryState::NotStarted) {
                *state = RepositoryState::Starting;
                true
            } else {
                false
            }
        });
        if !transitioned {
            return;
        }

        let repository = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let errors = Arc::new(repository.bootstrap());
            info!(
                "package repository started, {} package(s) cached, {} bootstrap error(s)",
                repository.cached_count(),
                errors.len()
            );
            repository
                .state_tx
                .send_replace(RepositoryState::Started(errors));
        });
        *self.bootstrap_task.lock().expect("bootstrap task poisoned") = Some(handle);
    }

    /// Abort background work and drop the cache. In-flight downloads are
    /// not guaranteed to stop cleanly.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .bootstrap_task
            .lock()
            .expect("bootstrap task poisoned")
            .take()
        {
            handle.abort();
        }
        self.packages
            .lock()
            .expect("package cache poisoned")
            .clear();
    }

    fn cached_count(&self) -> usize {
        self.packages.lock().expect("package cache poisoned").len()
    }

    fn package_file_path(&self, uid: Uuid) -> PathBuf {
        self.config
            .repository_directory
            .join(format!("{uid}.{PACKAGE_FILE_EXTENSION}"))
    }

    /// Scan the repository directory into cache entries, dropping orphaned
    /// extraction directories and validator-rejected packages. Per-file
    /// failures are collected, never fatal.
    fn bootstrap(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let repository_directory = &self.config.repository_directory;

        let mut package_files: Vec<PathBuf> = Vec::new();
        let mut directories: Vec<PathBuf> = Vec::new();
        match fs::read_dir(repository_directory) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        directories.push(path);
                    } else if has_extension(&path, PACKAGE_FILE_EXTENSION) {
                        package_files.push(path);
                    }
                }
            }
            Err(err) => {
                errors.push(format!("failed to scan repository directory: {err}"));
                return errors;
            }
        }
        package_files.sort();

        for directory in &directories {
            let directory_name = directory
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let has_package = package_files.iter().any(|file| {
                file.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.eq_ignore_ascii_case(directory_name))
                    .unwrap_or(false)
            });
            if !has_package {
                remove_directory_best_effort(directory);
            }
        }

        let mut recovered: Vec<PackageCacheEntry> = Vec::new();
        for file in &package_files {
            let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let uid = match Uuid::parse_str(stem) {
                Ok(uid) => uid,
                Err(err) => {
                    errors.push(format!(
                        "unrecognized package file name '{}': {err}",
                        file.display()
                    ));
                    continue;
                }
            };
            match ArchivePackage::open(
                Arc::clone(&self.resolver_manager),
                uid,
                file,
                Some(repository_directory.clone()),
            ) {
                Ok(package) => recovered.push(PackageCacheEntry::resolved(
                    Arc::new(Package::Archive(package)),
                    Some(file.clone()),
                )),
                Err(err) => errors.push(format!(
                    "failed to recover package '{}': {err}",
                    file.display()
                )),
            }
        }

        let mut entries = self.packages.lock().expect("package cache poisoned");
        if let Some(validator) = &self.validator {
            let packages: Vec<Arc<Package>> = recovered
                .iter()
                .filter_map(|e| e.package().cloned())
                .collect();
            let verdicts = validator.validate(&packages);
            for (entry, valid) in recovered.into_iter().zip(verdicts) {
                if valid {
                    entries.push(entry);
                } else {
                    debug!("evicting package rejected by validator during bootstrap");
                    entry.destroy();
                }
            }
        } else {
            entries.extend(recovered);
        }

        errors
    }

    /// Resolve packages covering the requested parts.
    ///
    /// Matched cache entries are re-validated now; unresolved parts are
    /// built locally when module directories are configured, else handed to
    /// the downloader as one batch. Parts the downloader cannot accept
    /// within the wait window stay unresolved without an error.
    pub async fn get_packages(
        &self,
        requested: &[ModulePart],
    ) -> Result<PackageContainer, RepositoryError> {
        // Bootstrap results are authoritative only once Started is set.
        while matches!(*self.state_tx.borrow(), RepositoryState::Starting) {
            tokio::time::sleep(STARTING_POLL_INTERVAL).await;
        }

        let mut parts: Vec<ModulePart> = Vec::new();
        for part in requested {
            if !parts.contains(part) {
                parts.push(part.clone());
            }
        }

        let (mut result, unresolved) = self.resolve_from_cache(&parts);

        if !unresolved.is_empty() {
            if !self.config.module_file_directories.is_empty() {
                result.extend(self.build_local_packages(&unresolved)?);
            } else if let Some(downloader) = &self.downloader {
                match tokio::time::timeout(DOWNLOADER_WAIT_TIMEOUT, self.downloader_lock.lock())
                    .await
                {
                    Ok(_batch_guard) => {
                        let downloaded = downloader
                            .download(unresolved.clone())
                            .await
                            .map_err(|e| RepositoryError::Download(e.to_string()))?;
                        result.extend(self.register_downloaded(downloaded)?);
                    }
                    Err(_) => {
                        warn!(
                            "downloader busy for {}s, leaving {} part(s) unresolved",
                            DOWNLOADER_WAIT_TIMEOUT.as_secs(),
                            unresolved.len()
                        );
                    }
                }
            }
        }

        Ok(PackageContainer::new(result))
    }

    /// Match parts against cache entries in registration order and
    /// re-validate every distinct matched entry, evicting failures.
    fn resolve_from_cache(
        &self,
        parts: &[ModulePart],
    ) -> (Vec<Arc<Package>>, Vec<ModulePart>) {
        let mut result: Vec<Arc<Package>> = Vec::new();
        let mut unresolved: Vec<ModulePart> = Vec::new();

        let mut entries = self.packages.lock().expect("package cache poisoned");

        let mut assignments: Vec<(ModulePart, Option<usize>)> = parts
            .iter()
            .map(|part| {
                let index = entries.iter().position(|e| e.contains(part));
                (part.clone(), index)
            })
            .collect();

        let mut matched: Vec<usize> = Vec::new();
        for (_, index) in &assignments {
            if let Some(index) = index {
                if !matched.contains(index) {
                    matched.push(*index);
                }
            }
        }

        let mut evicted: Vec<usize> = Vec::new();
        for &index in &matched {
            let entry = &entries[index];
            if entry.package().is_some()
                && !entry.is_fresh(&self.config.module_file_directories)
            {
                evicted.push(index);
            }
        }

        if let Some(validator) = &self.validator {
            let candidates: Vec<usize> = matched
                .iter()
                .copied()
                .filter(|i| !evicted.contains(i) && entries[*i].package().is_some())
                .collect();
            let packages: Vec<Arc<Package>> = candidates
                .iter()
                .filter_map(|i| entries[*i].package().cloned())
                .collect();
            let verdicts = validator.validate(&packages);
            for (index, valid) in candidates.iter().zip(verdicts) {
                if !valid {
                    evicted.push(*index);
                }
            }
        }

        if !evicted.is_empty() {
            evicted.sort_unstable();
            evicted.dedup();
            for (_, assignment) in assignments.iter_mut() {
                let matched_evicted =
                    matches!(assignment, Some(index) if evicted.contains(index));
                if matched_evicted {
                    *assignment = None;
                }
            }
            for &index in evicted.iter().rev() {
                let entry = entries.remove(index);
                debug!("evicting stale package cache entry");
                entry.destroy();
                for (_, assignment) in assignments.iter_mut() {
                    if let Some(i) = assignment {
                        if *i > index {
                            *i -= 1;
                        }
                    }
                }
            }
        }

        for (part, index) in &assignments {
            match index {
                Some(index) => {
                    // Pending entries have no package; the part stays
                    // answered-by-nothing without triggering a rebuild.
                    if let Some(package) = entries[*index].package() {
                        if !result.iter().any(|p| Arc::ptr_eq(p, package)) {
                            result.push(Arc::clone(package));
                        }
                    }
                }
                None => unresolved.push(part.clone()),
            }
        }

        (result, unresolved)
    }

    /// Build a package covering the given parts from the module file
    /// directories, expanding the closure transitively.
    fn build_local_packages(
        &self,
        parts: &[ModulePart],
    ) -> Result<Vec<Arc<Package>>, RepositoryError> {
        let mut files: Vec<String> = Vec::new();
        for directory in &self.config.module_file_directories {
            let entries =
                fs::read_dir(directory).map_err(|e| RepositoryError::ModuleDirectory {
                    directory: directory.display().to_string(),
                    message: e.to_string(),
                })?;
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    let key = name.to_ascii_lowercase();
                    if let Err(position) =
                        files.binary_search_by(|f| f.to_ascii_lowercase().cmp(&key))
                    {
                        files.insert(position, name.to_string());
                    }
                }
            }
        }

        let mut module_names: Vec<String> = Vec::new();
        for part in parts {
            let key = part.file_name().to_ascii_lowercase();
            if let Ok(index) = files.binary_search_by(|f| f.to_ascii_lowercase().cmp(&key)) {
                module_names.push(files[index].clone());
            }
        }

        let (names, module_paths) = self.expand_closure(&module_names);

        let language = LanguageInfo::new(
            vec![format!(".{MODULE_FILE_EXTENSION}")],
            names,
            "",
        );
        let archive_config =
            ArchiveConfig::new(Arc::new(PartsManifestTemplate), vec![language], None);

        if !module_paths.is_empty() && self.config.use_directory_packages {
            let package = Arc::new(Package::Directory(DirectoryPackage::new(
                Arc::clone(&self.resolver_manager),
                module_paths,
            )));
            {
                let mut entries = self.packages.lock().expect("package cache poisoned");
                entries.push(PackageCacheEntry::resolved(Arc::clone(&package), None));
            }
            return Ok(vec![package]);
        }

        if module_paths.is_empty() {
            // Remember the unresolvable part-set so identical requests do
            // not re-run this path.
            let mut entries = self.packages.lock().expect("package cache poisoned");
            entries.push(PackageCacheEntry::pending(parts.to_vec()));
            return Ok(Vec::new());
        }

        let archive_entries: Vec<ArchiveEntry> = module_paths
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string();
                ArchiveEntry::from_file(name, path.clone())
            })
            .collect();

        let uid = Uuid::new_v4();
        let file_path = self.package_file_path(uid);
        if file_path.exists() {
            fs::remove_file(&file_path)?;
        }

        ArchiveBuilder::write_entries_to_file(&archive_config, archive_entries, &file_path)
            .map_err(|e| RepositoryError::Build(e.to_string()))?;

        let package = ArchivePackage::open(
            Arc::clone(&self.resolver_manager),
            uid,
            &file_path,
            Some(self.config.repository_directory.clone()),
        )
        .map_err(|e| RepositoryError::Build(e.to_string()))?;
        let package = Arc::new(Package::Archive(package));

        {
            let mut entries = self.packages.lock().expect("package cache poisoned");
            entries.push(PackageCacheEntry::resolved(
                Arc::clone(&package),
                Some(file_path),
            ));
        }

        info!("built package {uid} covering {} part(s)", package.len());
        Ok(vec![package])
    }

    /// Expand the requested module files into their transitive closure,
    /// ordered by dependency: a module is emitted only after its
    /// references. References resolve through the module-info cache when
    /// one is configured, else by direct per-file analysis; per-file
    /// analysis failures degrade to skipping that module.
    fn expand_closure(&self, module_names: &[String]) -> (Vec<String>, Vec<PathBuf>) {
        let mut names: Vec<String> = Vec::new();
        let mut module_paths: Vec<PathBuf> = Vec::new();
        let mut visited: Vec<String> = Vec::new();

        if let Some(info_cache) = &self.info_cache {
            for file_name in module_names {
                self.visit_cached_references(
                    info_cache,
                    file_name.clone(),
                    &mut visited,
                    &mut names,
                    &mut module_paths,
                );
            }
        } else {
            for file_name in module_names {
                let Some(path) = self.find_module_path(file_name) else {
                    continue;
                };
                let Some(analyzer) = &self.analyzer else {
                    let key = file_name.to_ascii_lowercase();
                    if !visited.contains(&key) {
                        visited.push(key);
                        names.push(file_name.clone());
                        module_paths.push(path);
                    }
                    continue;
                };

                match analyzer.analyze_root(&path) {
                    Ok(data) => visit_analyzed_references(
                        &data,
                        &mut visited,
                        &mut names,
                        &mut module_paths,
                    ),
                    Err(err) => {
                        warn!("module analysis failed, skipping '{file_name}': {err}");
                    }
                }
            }
        }

        (names, module_paths)
    }

    /// Emit a module after its cached references, depth first.
    fn visit_cached_references(
        &self,
        info_cache: &ModuleInfoCache,
        file_name: String,
        visited: &mut Vec<String>,
        names: &mut Vec<String>,
        module_paths: &mut Vec<PathBuf>,
    ) {
        let key = file_name.to_ascii_lowercase();
        if visited.contains(&key) {
            return;
        }
        visited.push(key);

        let Some(module_info) = info_cache.try_get(&file_stem(&file_name)) else {
            return;
        };
        for reference in &module_info.references {
            self.visit_cached_references(
                info_cache,
                format!("{reference}.{MODULE_FILE_EXTENSION}"),
                visited,
                names,
                module_paths,
            );
        }

        if let Some(path) = self.find_module_path(&file_name) {
            names.push(file_name);
            module_paths.push(path);
        }
    }

    /// First module directory containing the given file.
    fn find_module_path(&self, file_name: &str) -> Option<PathBuf> {
        self.config
            .module_file_directories
            .iter()
            .map(|d| d.join(file_name))
            .find(|p| p.is_file())
    }

    /// Persist downloaded packages, register the non-empty ones and hand
    /// back their packages.
    fn register_downloaded(
        &self,
        downloaded: Vec<DownloadedPackage>,
    ) -> Result<Vec<Arc<Package>>, RepositoryError> {
        let mut registered = Vec::new();

        for mut item in downloaded {
            let file_path = self.package_file_path(item.uid);
            if file_path.exists() {
                fs::remove_file(&file_path)?;
            }
            let mut out = File::create(&file_path)?;
            io::copy(&mut item.reader, &mut out)?;
            drop(out);

            let stamp = filetime::FileTime::from_system_time(item.last_write_time);
            if let Err(err) = filetime::set_file_mtime(&file_path, stamp) {
                debug!(
                    "failed to stamp downloaded package '{}': {err}",
                    file_path.display()
                );
            }

            let package = ArchivePackage::open(
                Arc::clone(&self.resolver_manager),
                item.uid,
                &file_path,
                Some(self.config.repository_directory.clone()),
            )
            .map_err(|e| RepositoryError::Download(e.to_string()))?;

            if package.is_empty() {
                // Nothing usable arrived for this uid.
                let _ = fs::remove_file(&file_path);
                continue;
            }

            let package = Arc::new(Package::Archive(package));
            {
                let mut entries = self.packages.lock().expect("package cache poisoned");
                entries.push(PackageCacheEntry::resolved(
                    Arc::clone(&package),
                    Some(file_path),
                ));
            }
            registered.push(package);
        }

        Ok(registered)
    }

    /// Cached package by uid.
    pub fn get_package(&self, uid: Uuid) -> Option<Arc<Package>> {
        let entries = self.packages.lock().expect("package cache poisoned");
        entries
            .iter()
            .filter_map(|e| e.package())
            .find(|p| p.uid() == uid)
            .cloned()
    }

    /// Open the backing archive file of a package, if it exists.
    pub fn package_stream(&self, package: &Package) -> io::Result<Option<File>> {
        let path = self.package_file_path(package.uid());
        if path.is_file() {
            Ok(Some(File::open(path)?))
        } else {
            Ok(None)
        }
    }

    /// Persist a raw package stream under the given uid, unconditionally
    /// overwriting any existing file.
    pub fn add(&self, uid: Uuid, input: &mut dyn Read) -> Result<(), RepositoryError> {
        let path = self.package_file_path(uid);
        let mut out = File::create(&path)?;
        io::copy(input, &mut out)?;
        Ok(())
    }

    /// Run every maintenance instance independently and aggregate their
    /// findings; one instance failing never stops the others.
    pub fn validate(&self) -> ValidateResult {
        let mut entries = Vec::new();

        for instance in &self.maintenance {
            match instance.execute() {
                Ok(result) => {
                    if result.has_error() {
                        entries.push(ValidateEntry::new(
                            format!("maintenance '{}' reported errors", instance.name()),
                            ValidateEntryKind::Error,
                        ));
                        for entry in result
                            .entries
                            .iter()
                            .filter(|e| e.kind == MaintenanceEntryKind::Error)
                        {
                            entries.push(ValidateEntry::new(
                                entry.message.clone(),
                                ValidateEntryKind::Error,
                            ));
                        }
                    }
                }
                Err(err) => entries.push(ValidateEntry::new(
                    format!("maintenance '{}' failed: {err}", instance.name()),
                    ValidateEntryKind::Error,
                )),
            }
        }

        ValidateResult::new(entries)
    }
}

impl Drop for PackageRepository {
    fn drop(&mut self) {
        if let Some(handle) = self
            .bootstrap_task
            .lock()
            .expect("bootstrap task poisoned")
            .take()
        {
            handle.abort();
        }
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn file_stem(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(index) => file_name[..index].to_string(),
        None => file_name.to_string(),
    }
}

/// Post-order walk of an analyzed reference tree: references are emitted
/// before the module that declares them. Reference entries without a
/// located path are skipped.
fn visit_analyzed_references(
    data: &ModuleData,
    visited: &mut Vec<String>,
    names: &mut Vec<String>,
    module_paths: &mut Vec<PathBuf>,
) {
    if data.path.as_os_str().is_empty() {
        return;
    }
    let Some(file_name) = data.path.file_name().and_then(|n| n.to_str()).map(String::from)
    else {
        return;
    };
    let key = file_name.to_ascii_lowercase();
    if visited.contains(&key) {
        return;
    }
    visited.push(key);

    for reference in &data.references {
        visit_analyzed_references(reference, visited, names, module_paths);
    }

    names.push(file_name);
    module_paths.push(data.path.clone());
}

/// Delete a directory tree; on failure fall back to deleting the files it
/// contains, ignoring individual failures.
fn remove_directory_best_effort(directory: &Path) {
    if fs::remove_dir_all(directory).is_err() && directory.is_dir() {
        if let Ok(entries) = fs::read_dir(directory) {
            for entry in entries.flatten() {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}
