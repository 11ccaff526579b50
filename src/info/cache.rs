//! Module-info cache backed by a persisted manifest
//!
//! The cache answers "what does module X reference" without re-analyzing
//! binaries on every request. State lives in `AssembliesManifest.xml` inside
//! the module directory; memory is reseeded whenever that file's write time
//! changes. Refresh diffs the directory listing against the map, drops
//! vanished or out-of-date entries and analyzes only what is missing, inside
//! an isolated temp directory so the analyzer never touches live files.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::info::{ModuleInfo, ModuleInfoObserver};
use crate::part::MODULE_FILE_EXTENSION;
use crate::traits::ModuleAnalyzer;

/// File name of the persisted cache manifest.
pub const INFO_MANIFEST_FILE_NAME: &str = "AssembliesManifest.xml";

#[derive(Debug, Clone)]
struct CacheEntry {
    file_name: String,
    info: ModuleInfo,
}

struct CacheState {
    entries: Option<BTreeMap<String, CacheEntry>>,
    manifest_mtime: Option<SystemTime>,
}

/// Persistent mapping of module name to [`ModuleInfo`], refreshed
/// incrementally against on-disk timestamps.
pub struct ModuleInfoCache {
    modules_directory: PathBuf,
    analyzer: Arc<dyn ModuleAnalyzer>,
    observer: Option<Arc<dyn ModuleInfoObserver>>,
    state: Mutex<CacheState>,
    loaded_fired: AtomicBool,
}

impl ModuleInfoCache {
    pub fn new(modules_directory: impl Into<PathBuf>, analyzer: Arc<dyn ModuleAnalyzer>) -> Self {
        Self {
            modules_directory: modules_directory.into(),
            analyzer,
            observer: None,
            state: Mutex::new(CacheState {
                entries: None,
                manifest_mtime: None,
            }),
            loaded_fired: AtomicBool::new(false),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ModuleInfoObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Directory holding the module binaries and the persisted manifest.
    pub fn modules_directory(&self) -> &Path {
        &self.modules_directory
    }

    fn manifest_path(&self) -> PathBuf {
        self.modules_directory.join(INFO_MANIFEST_FILE_NAME)
    }

    /// Whether the first initialization has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded_fired.load(Ordering::SeqCst)
    }

    /// Whether the persisted manifest changed since it was last read.
    pub fn is_manifest_changed(&self) -> bool {
        let state = self.state.lock().expect("info cache poisoned");
        self.is_manifest_changed_locked(&state)
    }

    fn is_manifest_changed_locked(&self, state: &CacheState) -> bool {
        match fs::metadata(self.manifest_path()).and_then(|m| m.modified()) {
            Ok(mtime) => state.manifest_mtime != Some(mtime),
            Err(_) => true,
        }
    }

    /// Look up metadata for a module name. Refresh failures degrade to
    /// `None`; they are logged, never propagated.
    pub fn try_get(&self, name: &str) -> Option<ModuleInfo> {
        let (result, initialized) = {
            let mut state = self.state.lock().expect("info cache poisoned");
            let initialized = match self.check_initialize_locked(&mut state) {
                Ok(initialized) => initialized,
                Err(err) => {
                    warn!("module info refresh failed: {err}");
                    return None;
                }
            };
            let result = state
                .entries
                .as_ref()
                .and_then(|entries| entries.get(name))
                .map(|entry| entry.info.clone());
            (result, initialized)
        };
        self.notify_loaded(initialized);
        result
    }

    /// Whether the cache knows the given module name.
    pub fn contains(&self, name: &str) -> bool {
        self.try_get(name).is_some()
    }

    /// Number of known modules.
    pub fn len(&self) -> usize {
        let (len, initialized) = {
            let mut state = self.state.lock().expect("info cache poisoned");
            let initialized = self.check_initialize_locked(&mut state).unwrap_or(false);
            let len = state.entries.as_ref().map(BTreeMap::len).unwrap_or(0);
            (len, initialized)
        };
        self.notify_loaded(initialized);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all known module infos.
    pub fn infos(&self) -> Vec<ModuleInfo> {
        let (infos, initialized) = {
            let mut state = self.state.lock().expect("info cache poisoned");
            let initialized = self.check_initialize_locked(&mut state).unwrap_or(false);
            let infos = state
                .entries
                .as_ref()
                .map(|entries| entries.values().map(|e| e.info.clone()).collect())
                .unwrap_or_default();
            (infos, initialized)
        };
        self.notify_loaded(initialized);
        infos
    }

    /// Synchronize the map with the module directory. With `run_analyzer`
    /// set, out-of-date and unknown files are re-analyzed; otherwise they
    /// degrade to zero-reference stubs until an analyzing refresh runs.
    pub fn refresh(&self, run_analyzer: bool) -> io::Result<()> {
        let initialized = {
            let mut state = self.state.lock().expect("info cache poisoned");
            self.refresh_locked(&mut state, run_analyzer)?
        };
        self.notify_loaded(initialized);
        Ok(())
    }

    fn notify_loaded(&self, initialized: bool) {
        if initialized && !self.loaded_fired.swap(true, Ordering::SeqCst) {
            if let Some(observer) = &self.observer {
                observer.loaded();
            }
        }
    }

    fn check_initialize_locked(&self, state: &mut CacheState) -> io::Result<bool> {
        if state.entries.is_none()
            || self.is_manifest_changed_locked(state)
            || !self.manifest_path().exists()
        {
            self.refresh_locked(state, false)
        } else {
            Ok(false)
        }
    }

    fn refresh_locked(&self, state: &mut CacheState, run_analyzer: bool) -> io::Result<bool> {
        if let Some(observer) = &self.observer {
            observer.loading_files();
        }

        let original_files = self.list_module_files();
        let mut files = original_files.clone();

        let manifest_exists = self.manifest_path().exists();
        let initializing = state.entries.is_none() || self.is_manifest_changed_locked(state);

        if initializing {
            let mut map = BTreeMap::new();
            if !manifest_exists && !run_analyzer {
                // Cheap path: seed zero-reference stubs until analysis is
                // actually requested.
                for file in &original_files {
                    let entry = self.stub_entry(file);
                    map.insert(entry.info.name.clone(), entry);
                }
            } else {
                for entry in self.read_manifest_locked(state) {
                    map.insert(entry.info.name.clone(), entry);
                }
            }
            state.entries = Some(map);
        }

        let mut new_entries: Vec<CacheEntry> = Vec::new();
        {
            let entries = state.entries.get_or_insert_with(BTreeMap::new);

            let mut stale: Vec<String> = Vec::new();
            for (name, entry) in entries.iter() {
                match files.binary_search(&entry.file_name) {
                    Ok(idx) => {
                        files.remove(idx);
                    }
                    Err(_) => stale.push(name.clone()),
                }
            }
            for name in stale.drain(..) {
                entries.remove(&name);
            }

            if manifest_exists || run_analyzer {
                for (name, entry) in entries.iter() {
                    let path = self.modules_directory.join(&entry.file_name);
                    match fs::metadata(&path).and_then(|m| m.modified()) {
                        Ok(mtime) if mtime != entry.info.last_write_time => {
                            stale.push(name.clone());
                            if run_analyzer {
                                files.push(entry.file_name.clone());
                            } else {
                                new_entries.push(CacheEntry {
                                    file_name: entry.file_name.clone(),
                                    info: ModuleInfo {
                                        name: entry.info.name.clone(),
                                        last_write_time: mtime,
                                        references: Vec::new(),
                                    },
                                });
                            }
                        }
                        Ok(_) => {}
                        Err(_) => {
                            if run_analyzer {
                                files.push(entry.file_name.clone());
                            }
                            stale.push(name.clone());
                        }
                    }
                }
                for name in stale.drain(..) {
                    entries.remove(&name);
                }
            }

            if !files.is_empty() {
                self.analyze_files(&files, &mut new_entries)?;
            }

            for entry in new_entries.iter() {
                entries.insert(entry.info.name.clone(), entry.clone());
            }
        }

        if !new_entries.is_empty() {
            self.save_manifest_locked(state)?;
        }

        Ok(initializing)
    }

    /// Copy pending files into an isolated temp directory and analyze each.
    /// Per-file analysis failures are dropped; the name degrades to
    /// not-found for callers.
    fn analyze_files(&self, files: &[String], new_entries: &mut Vec<CacheEntry>) -> io::Result<()> {
        let temp = tempfile::Builder::new()
            .prefix("modpack-analyze-")
            .tempdir()?;

        let mut copies: Vec<PathBuf> = Vec::with_capacity(files.len());
        for file in files {
            let dest = temp.path().join(file);
            fs::copy(self.modules_directory.join(file), &dest)?;
            copies.push(dest);
        }

        for (idx, file) in files.iter().enumerate() {
            if let Some(observer) = &self.observer {
                let percent = (100 * idx / files.len()) as u8;
                observer.analysis_progress(&format!("analyzing {file}"), percent);
            }

            match self.analyzer.analyze_root(&copies[idx]) {
                Ok(data) => {
                    let source_path = self.modules_directory.join(file);
                    let mtime = fs::metadata(&source_path)
                        .and_then(|m| m.modified())
                        .unwrap_or(UNIX_EPOCH);
                    new_entries.push(CacheEntry {
                        file_name: file.clone(),
                        info: ModuleInfo {
                            name: file_stem(file),
                            last_write_time: mtime,
                            references: data.references.iter().map(|r| r.name.clone()).collect(),
                        },
                    });
                }
                Err(err) => {
                    debug!("module analysis skipped: {err}");
                }
            }
        }

        // Temp directory removal happens on drop, best effort.
        Ok(())
    }

    fn stub_entry(&self, file: &str) -> CacheEntry {
        let mtime = fs::metadata(self.modules_directory.join(file))
            .and_then(|m| m.modified())
            .unwrap_or(UNIX_EPOCH);
        CacheEntry {
            file_name: file.to_string(),
            info: ModuleInfo {
                name: file_stem(file),
                last_write_time: mtime,
                references: Vec::new(),
            },
        }
    }

    /// Module binaries in the directory, sorted canonically.
    fn list_module_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        let entries = match fs::read_dir(&self.modules_directory) {
            Ok(entries) => entries,
            Err(_) => return files,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_module = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(MODULE_FILE_EXTENSION))
                .unwrap_or(false);
            if is_module {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files.push(name.to_string());
                }
            }
        }
        files.sort();
        files
    }

    fn read_manifest_locked(&self, state: &mut CacheState) -> Vec<CacheEntry> {
        let path = self.manifest_path();
        let mtime = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return Vec::new(),
        };
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(_) => return Vec::new(),
        };
        match quick_xml::de::from_str::<ManifestDocument>(&contents) {
            Ok(doc) => {
                state.manifest_mtime = Some(mtime);
                doc.entries.into_iter().map(CacheEntry::from).collect()
            }
            Err(err) => {
                warn!("discarding unreadable module info manifest: {err}");
                Vec::new()
            }
        }
    }

    fn save_manifest_locked(&self, state: &mut CacheState) -> io::Result<()> {
        let doc = ManifestDocument {
            entries: state
                .entries
                .as_ref()
                .map(|entries| entries.values().map(EntryXml::from).collect())
                .unwrap_or_default(),
        };
        let xml = quick_xml::se::to_string(&doc)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        let path = self.manifest_path();
        fs::write(&path, xml)?;
        state.manifest_mtime = fs::metadata(&path).and_then(|m| m.modified()).ok();
        Ok(())
    }
}

fn file_stem(file: &str) -> String {
    match file.rfind('.') {
        Some(idx) => file[..idx].to_string(),
        None => file.to_string(),
    }
}

fn systemtime_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn nanos_systemtime(nanos: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(nanos)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "AssembliesManifest")]
struct ManifestDocument {
    #[serde(rename = "ModuleInfoEntry", default)]
    entries: Vec<EntryXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryXml {
    #[serde(rename = "@FileName")]
    file_name: String,
    #[serde(rename = "Info")]
    info: InfoXml,
}

#[derive(Debug, Serialize, Deserialize)]
struct InfoXml {
    #[serde(rename = "@Name")]
    name: String,
    #[serde(rename = "@LastWriteTime")]
    last_write_time: u64,
    #[serde(rename = "Reference", default)]
    references: Vec<ReferenceXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReferenceXml {
    #[serde(rename = "@Name")]
    name: String,
}

impl From<EntryXml> for CacheEntry {
    fn from(entry: EntryXml) -> Self {
        CacheEntry {
            file_name: entry.file_name,
            info: ModuleInfo {
                name: entry.info.name,
                last_write_time: nanos_systemtime(entry.info.last_write_time),
                references: entry.info.references.into_iter().map(|r| r.name).collect(),
            },
        }
    }
}

impl From<&CacheEntry> for EntryXml {
    fn from(entry: &CacheEntry) -> Self {
        EntryXml {
            file_name: entry.file_name.clone(),
            info: InfoXml {
                name: entry.info.name.clone(),
                last_write_time: systemtime_nanos(entry.info.last_write_time),
                references: entry
                    .info
                    .references
                    .iter()
                    .map(|name| ReferenceXml { name: name.clone() })
                    .collect(),
            },
        }
    }
}
