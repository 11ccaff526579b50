//! Scoped module resolution
//!
//! The host load system may ask for modules by name while a package load is
//! in flight (cross-references inside a closure). Each load operation
//! installs a resolver scoped to its own closure; the manager addresses
//! resolvers in installation order and the first answer wins. Installation
//! returns an RAII guard so the resolver is removed on every exit path,
//! including failures, and resolution state never leaks across unrelated
//! loads. Multiple managers may coexist (one per host, typically).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::traits::{LoadedModule, ModuleHost, PackageError};

/// Answers module-resolution requests for one load operation.
///
/// Returning `None` declines the request and lets the host's normal
/// resolution continue; `Some(Err(..))` reports a failed load attempt.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Result<LoadedModule, PackageError>>;
}

/// Registry of scoped resolvers plus the host they feed.
pub struct ResolverManager {
    host: Arc<dyn ModuleHost>,
    resolvers: Mutex<Vec<(u64, Arc<dyn ModuleResolver>)>>,
    next_id: AtomicU64,
}

impl ResolverManager {
    pub fn new(host: Arc<dyn ModuleHost>) -> Arc<Self> {
        Arc::new(Self {
            host,
            resolvers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// The host load system this manager serves.
    pub fn host(&self) -> &Arc<dyn ModuleHost> {
        &self.host
    }

    /// Install a resolver for the duration of one load operation. Dropping
    /// the guard uninstalls it.
    pub fn install(self: &Arc<Self>, resolver: Arc<dyn ModuleResolver>) -> ResolverGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut resolvers = self.resolvers.lock().expect("resolver registry poisoned");
            resolvers.push((id, resolver));
        }
        ResolverGuard {
            manager: Arc::clone(self),
            id,
        }
    }

    /// Ask installed resolvers for a module, in installation order.
    pub fn resolve(&self, name: &str) -> Option<Result<LoadedModule, PackageError>> {
        let resolvers: Vec<Arc<dyn ModuleResolver>> = {
            let guard = self.resolvers.lock().expect("resolver registry poisoned");
            guard.iter().map(|(_, r)| Arc::clone(r)).collect()
        };

        for resolver in resolvers {
            if let Some(result) = resolver.resolve(name) {
                return Some(result);
            }
        }
        None
    }

    /// Number of currently installed resolvers.
    pub fn installed_count(&self) -> usize {
        self.resolvers
            .lock()
            .expect("resolver registry poisoned")
            .len()
    }

    fn uninstall(&self, id: u64) {
        let mut resolvers = self.resolvers.lock().expect("resolver registry poisoned");
        resolvers.retain(|(entry_id, _)| *entry_id != id);
    }
}

/// Removes its resolver from the manager on drop.
pub struct ResolverGuard {
    manager: Arc<ResolverManager>,
    id: u64,
}

impl Drop for ResolverGuard {
    fn drop(&mut self) {
        self.manager.uninstall(self.id);
    }
}
