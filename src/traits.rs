//! Collaborator traits and shared error types
//!
//! The repository deliberately treats everything that touches module binaries
//! or the network as an injected collaborator: the host load system that
//! turns module bytes into executable units, the static analyzer that
//! extracts declared references, and the downloader that fetches packages
//! from a remote peer. This file defines those seams together with the error
//! types they produce.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::part::ModulePart;

/// Where a loaded module's bytes came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Loaded from a file on disk.
    File(PathBuf),
    /// Loaded from an in-memory byte buffer.
    Memory,
}

/// Opaque handle to a module the host load system accepted.
///
/// The repository never inspects module contents; it only tracks identity and
/// provenance of what the host produced.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    name: String,
    origin: ModuleOrigin,
}

impl LoadedModule {
    pub fn new(name: impl Into<String>, origin: ModuleOrigin) -> Self {
        Self {
            name: name.into(),
            origin,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &ModuleOrigin {
        &self.origin
    }
}

/// Host load system: turns module bytes into executable units.
///
/// `verify` is the explicit post-load well-formedness check; hosts that do
/// not distinguish loading from verification can return `Ok(())`.
pub trait ModuleHost: Send + Sync {
    fn load_from_path(&self, part: &ModulePart, path: &Path)
        -> Result<LoadedModule, PackageError>;

    fn load_from_bytes(
        &self,
        part: &ModulePart,
        bytes: &[u8],
    ) -> Result<LoadedModule, PackageError>;

    fn verify(&self, module: &LoadedModule) -> Result<(), PackageError>;
}

/// Result of statically analyzing one module binary.
#[derive(Debug, Clone)]
pub struct ModuleData {
    /// Declared module name.
    pub name: String,
    /// Path the module was analyzed at. Empty for references that could not
    /// be located on disk.
    pub path: PathBuf,
    /// Referenced modules, recursively.
    pub references: Vec<ModuleData>,
}

/// One-shot static analysis error. Per-file and recoverable: callers degrade
/// the affected module to not-found instead of failing the operation.
#[derive(Debug, Clone, Error)]
#[error("failed to analyze module at '{}': {message}", .path.display())]
pub struct AnalysisError {
    pub path: PathBuf,
    pub message: String,
}

/// Static module analyzer: path in, declared name plus reference tree out.
pub trait ModuleAnalyzer: Send + Sync {
    fn analyze_root(&self, path: &Path) -> Result<ModuleData, AnalysisError>;
}

/// One package delivered by the downloader.
pub struct DownloadedPackage {
    pub uid: Uuid,
    pub last_write_time: SystemTime,
    pub reader: Box<dyn Read + Send>,
}

#[derive(Debug, Clone, Error)]
#[error("download failed: {0}")]
pub struct DownloadError(pub String);

/// Remote fallback for parts that cannot be resolved locally.
///
/// One call resolves one batch; the repository serializes batches so at most
/// one download is outstanding per repository instance.
#[async_trait]
pub trait PackageDownloader: Send + Sync {
    async fn download(
        &self,
        parts: Vec<ModulePart>,
    ) -> Result<Vec<DownloadedPackage>, DownloadError>;
}

/// Failure to load one part of a package.
#[derive(Debug, Clone)]
pub struct ModuleLoadError {
    pub part: ModulePart,
    pub message: String,
}

/// Aggregated failure of a package load pass, carrying every affected part
/// and its cause.
#[derive(Debug, Clone, Error)]
#[error("failed to load {} package module(s)", .errors.len())]
pub struct LoadPackageModulesError {
    pub errors: Vec<ModuleLoadError>,
}

impl LoadPackageModulesError {
    pub fn new(errors: Vec<ModuleLoadError>) -> Self {
        Self { errors }
    }
}

/// Errors surfaced by packages and the host load path.
#[derive(Debug, Clone, Error)]
pub enum PackageError {
    #[error("module part not found: {0}")]
    PartNotFound(String),

    #[error("failed to load module '{part}': {message}")]
    LoadFailed { part: String, message: String },

    #[error("{0}")]
    LoadAggregate(Arc<LoadPackageModulesError>),

    #[error("package archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PackageError {
    fn from(e: std::io::Error) -> Self {
        PackageError::Io(e.to_string())
    }
}
