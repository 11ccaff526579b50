//! Shared test doubles
//!
//! Module binaries in these tests are small text files: an optional
//! `refs: a,b` line declares references. The stub host accepts anything
//! whose content does not start with `corrupt`, and the stub analyzer
//! resolves references against sibling files.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use modpack::{
    AnalysisError, LoadedModule, ModuleAnalyzer, ModuleData, ModuleHost, ModuleOrigin, ModulePart,
    PackageError, ResolverManager,
};

/// Host load system double counting successful loads.
pub struct StubHost {
    loaded_count: AtomicUsize,
}

impl StubHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            loaded_count: AtomicUsize::new(0),
        })
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded_count.load(Ordering::SeqCst)
    }

    fn accept(&self, part: &ModulePart, content: &str, origin: ModuleOrigin) -> Result<LoadedModule, PackageError> {
        if content.starts_with("corrupt") {
            return Err(PackageError::LoadFailed {
                part: part.source().to_string(),
                message: "unusable module image".to_string(),
            });
        }
        self.loaded_count.fetch_add(1, Ordering::SeqCst);
        Ok(LoadedModule::new(part.module_name(), origin))
    }
}

impl ModuleHost for StubHost {
    fn load_from_path(
        &self,
        part: &ModulePart,
        path: &Path,
    ) -> Result<LoadedModule, PackageError> {
        let content = fs::read_to_string(path).map_err(|e| PackageError::LoadFailed {
            part: part.source().to_string(),
            message: e.to_string(),
        })?;
        self.accept(part, &content, ModuleOrigin::File(path.to_path_buf()))
    }

    fn load_from_bytes(
        &self,
        part: &ModulePart,
        bytes: &[u8],
    ) -> Result<LoadedModule, PackageError> {
        let content = String::from_utf8_lossy(bytes).to_string();
        self.accept(part, &content, ModuleOrigin::Memory)
    }

    fn verify(&self, module: &LoadedModule) -> Result<(), PackageError> {
        if module.name().starts_with("badtype") {
            Err(PackageError::LoadFailed {
                part: module.name().to_string(),
                message: "module failed post-load verification".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Analyzer double reading `refs:` declarations from module files.
pub struct StubAnalyzer;

impl ModuleAnalyzer for StubAnalyzer {
    fn analyze_root(&self, path: &Path) -> Result<ModuleData, AnalysisError> {
        analyze(path, &mut Vec::new())
    }
}

fn analyze(path: &Path, visited: &mut Vec<String>) -> Result<ModuleData, AnalysisError> {
    let content = fs::read_to_string(path).map_err(|e| AnalysisError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if content.starts_with("unanalyzable") {
        return Err(AnalysisError {
            path: path.to_path_buf(),
            message: "unanalyzable module".to_string(),
        });
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    visited.push(name.to_ascii_lowercase());

    let mut references = Vec::new();
    for line in content.lines() {
        let Some(rest) = line.strip_prefix("refs:") else {
            continue;
        };
        for reference in rest.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if visited.contains(&reference.to_ascii_lowercase()) {
                continue;
            }
            let sibling = path
                .parent()
                .map(|d| d.join(format!("{reference}.bin")))
                .unwrap_or_default();
            if sibling.is_file() {
                match analyze(&sibling, visited) {
                    Ok(data) => references.push(data),
                    Err(_) => references.push(unlocated(reference)),
                }
            } else {
                references.push(unlocated(reference));
            }
        }
    }

    Ok(ModuleData {
        name,
        path: path.to_path_buf(),
        references,
    })
}

fn unlocated(name: &str) -> ModuleData {
    ModuleData {
        name: name.to_string(),
        path: PathBuf::new(),
        references: Vec::new(),
    }
}

/// Resolver manager over a fresh stub host.
pub fn stub_manager() -> (Arc<StubHost>, Arc<ResolverManager>) {
    let host = StubHost::new();
    let manager = ResolverManager::new(host.clone());
    (host, manager)
}

/// Write a module file declaring the given references.
pub fn write_module(dir: &Path, name: &str, refs: &[&str]) -> PathBuf {
    let path = dir.join(format!("{name}.bin"));
    let content = if refs.is_empty() {
        format!("module {name}\n")
    } else {
        format!("module {name}\nrefs: {}\n", refs.join(","))
    };
    fs::write(&path, content).expect("write module file");
    path
}

/// Write a module file the host refuses to load.
pub fn write_corrupt_module(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(format!("{name}.bin"));
    fs::write(&path, "corrupt\n").expect("write module file");
    path
}
