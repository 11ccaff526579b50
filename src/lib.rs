//! modpack - module closure package repository
//!
//! This crate distributes closures of compiled binary modules to a runtime
//! host as versioned archive packages. Built packages are cached on disk and
//! served to load requests with freshness validation, on-demand (re)building
//! and an asynchronous remote download fallback.
//!
//! ## Architecture
//!
//! - **Archive codec** ([`archive`]): reads and writes the zip-compatible
//!   closure package format and drives the host load system with scoped
//!   module-resolution hooks.
//! - **Package abstraction** ([`package`]): one closure of parts plus lazy
//!   module loading, polymorphic over archive-, directory- and empty-backed
//!   variants.
//! - **Module-info cache** ([`info`]): persistent module metadata refreshed
//!   incrementally against on-disk timestamps, feeding transitive closure
//!   expansion.
//! - **Repository** ([`repository`]): orchestrates bootstrap, cache
//!   validation and eviction, on-demand build and the download fallback
//!   behind one retrieval operation.
//!
//! Everything that interprets module binaries is injected: the host load
//! system, the static analyzer and the downloader are traits defined in
//! [`traits`].

// Allow dead code - several accessors are part of the API surface
#![allow(dead_code)]

pub mod archive;
pub mod info;
pub mod package;
pub mod part;
pub mod repository;
pub mod resolver;
pub mod traits;

pub use archive::{
    ArchiveBuilder, ArchiveConfig, ArchiveEntry, ArchiveError, LanguageInfo, PackageArchive,
};
pub use info::{ModuleInfo, ModuleInfoCache, ModuleInfoObserver};
pub use package::{ArchivePackage, DirectoryPackage, EmptyPackage, Package, PackageContainer};
pub use part::{ModulePart, MODULE_FILE_EXTENSION};
pub use repository::{
    FreshnessValidator, PackageRepository, PackageValidator, RepositoryBuilder, RepositoryConfig,
    RepositoryError, RepositoryState,
};
pub use resolver::{ModuleResolver, ResolverGuard, ResolverManager};
pub use traits::{
    AnalysisError, DownloadError, DownloadedPackage, LoadPackageModulesError, LoadedModule,
    ModuleAnalyzer, ModuleData, ModuleHost, ModuleLoadError, ModuleOrigin, PackageDownloader,
    PackageError,
};
