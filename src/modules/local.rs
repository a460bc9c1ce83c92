//=====================================================
// File: modules/local.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Filesystem-backed module resolution
// Objective: Probe ordered search roots for a logical name under the
//            flat-file and package conventions
//=====================================================

use std::env;
use std::fs;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::modules::name::ModuleName;
use crate::modules::{ResolvedSource, ResolverId};

/// Environment variable naming additional default search roots,
/// platform-separator delimited like `PATH`.
pub const SEARCH_PATH_ENV: &str = "TIDESCRIPT_PATH";

// Process-wide default roots: working directory, the running binary's own
// directory, then the inherited search path. Order is part of the contract.
static DEFAULT_ROOTS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    let mut roots = Vec::new();
    if let Ok(current) = env::current_dir() {
        roots.push(current);
    }
    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            roots.push(dir.to_path_buf());
        }
    }
    if let Some(value) = env::var_os(SEARCH_PATH_ENV) {
        roots.extend(env::split_paths(&value));
    }
    roots
});

/// Resolves logical names against local filesystem roots. Files found on
/// disk are trusted; no syntax validation happens here.
#[derive(Debug, Clone)]
pub struct LocalResolver {
    id: ResolverId,
    roots: Vec<PathBuf>,
}

impl Default for LocalResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalResolver {
    pub fn new() -> Self {
        Self::with_roots(DEFAULT_ROOTS.clone())
    }

    /// Replace the process-wide default roots entirely. Hosts and tests
    /// use this to pin resolution to known directories.
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self {
            id: ResolverId::next(),
            roots,
        }
    }

    pub(crate) fn id(&self) -> ResolverId {
        self.id
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Probe every root in order, extra roots first, flat file before
    /// package within each root. First existing file wins.
    pub fn resolve(&self, name: &ModuleName, extra_roots: &[PathBuf]) -> Option<ResolvedSource> {
        info!("searching for local module: {name}");

        for root in extra_roots.iter().chain(self.roots.iter()) {
            if let Some(unit) = self.probe(root, name, false) {
                info!("found local module (file): {name}");
                return Some(unit);
            }
            if let Some(unit) = self.probe(root, name, true) {
                info!("found local module (package): {name}");
                return Some(unit);
            }
        }

        warn!("local module not found: {name}");
        None
    }

    fn probe(&self, root: &PathBuf, name: &ModuleName, package: bool) -> Option<ResolvedSource> {
        let spec = if package { "package" } else { "file" };
        debug!("searching {} by {spec} specification: {name}", root.display());

        let candidate = root.join(name.rel_path(package));
        if !candidate.is_file() {
            return None;
        }
        let candidate = fs::canonicalize(&candidate).unwrap_or(candidate);
        Some(ResolvedSource::local(name.clone(), candidate, package))
    }
}
