//! Repository maintenance and health checks
//!
//! Maintenance instances are pluggable health checks run by
//! `PackageRepository::validate`. Each instance executes independently; one
//! failure never stops the others. Results come back as a structured list of
//! warnings and errors.

use thiserror::Error;

/// Severity of one maintenance result entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceEntryKind {
    Information,
    Warning,
    Error,
}

/// One observation reported by a maintenance run.
#[derive(Debug, Clone)]
pub struct MaintenanceEntry {
    pub message: String,
    pub kind: MaintenanceEntryKind,
}

impl MaintenanceEntry {
    pub fn new(message: impl Into<String>, kind: MaintenanceEntryKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

/// Outcome of one maintenance execution.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceExecuteResult {
    pub entries: Vec<MaintenanceEntry>,
}

impl MaintenanceExecuteResult {
    pub fn new(entries: Vec<MaintenanceEntry>) -> Self {
        Self { entries }
    }

    pub fn has_error(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.kind == MaintenanceEntryKind::Error)
    }
}

/// Failure of a maintenance execution as a whole.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MaintenanceError(pub String);

/// Pluggable repository health check.
pub trait RepositoryMaintenance: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self) -> Result<MaintenanceExecuteResult, MaintenanceError>;
}

/// Severity of one validation result entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateEntryKind {
    Warning,
    Error,
}

/// One entry of a repository validation report.
#[derive(Debug, Clone)]
pub struct ValidateEntry {
    pub message: String,
    pub kind: ValidateEntryKind,
}

impl ValidateEntry {
    pub fn new(message: impl Into<String>, kind: ValidateEntryKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

/// Aggregated report of a repository validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidateResult {
    entries: Vec<ValidateEntry>,
}

impl ValidateResult {
    pub fn new(entries: Vec<ValidateEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ValidateEntry] {
        &self.entries
    }

    pub fn has_error(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.kind == ValidateEntryKind::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
