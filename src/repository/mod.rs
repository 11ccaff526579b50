//! Package repository
//!
//! Orchestrates the on-disk package cache: background bootstrap of the cache
//! directory, per-request freshness validation and eviction, on-demand
//! package construction with transitive closure expansion, and the
//! asynchronous download fallback. One retrieval operation behaves
//! identically regardless of which path satisfied it.

mod entry;
mod maintenance;
#[allow(clippy::module_inception)]
mod repository;
mod validator;

pub use maintenance::{
    MaintenanceEntry, MaintenanceEntryKind, MaintenanceError, MaintenanceExecuteResult,
    RepositoryMaintenance, ValidateEntry, ValidateEntryKind, ValidateResult,
};
pub use repository::{PackageRepository, RepositoryBuilder, RepositoryConfig};
pub use validator::{FreshnessValidator, PackageValidator};

use std::sync::Arc;

use thiserror::Error;

use crate::traits::PackageError;

/// Lifecycle state of a repository instance.
#[derive(Debug, Clone)]
pub enum RepositoryState {
    NotStarted,
    Starting,
    /// Bootstrap finished; carries the aggregated bootstrap errors.
    Started(Arc<Vec<String>>),
}

impl RepositoryState {
    pub fn is_started(&self) -> bool {
        matches!(self, RepositoryState::Started(_))
    }
}

/// Errors of repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid repository directory '{directory}': {message}")]
    Configuration { directory: String, message: String },

    #[error("failed to list module files in '{directory}': {message}")]
    ModuleDirectory { directory: String, message: String },

    #[error("failed to build package: {0}")]
    Build(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RepositoryError {
    fn from(e: std::io::Error) -> Self {
        RepositoryError::Io(e.to_string())
    }
}
