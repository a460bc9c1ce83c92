//=====================================================
// File: modules/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Module registry, resolver chain, and loader for TideScript
// Objective: Turn resolved source units into live module objects with
//            get-or-create registration and execute-once semantics
//=====================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::debug;

use crate::interpreter::{self, Namespace, RuntimeError};
use crate::parser::{self, ParseError};

pub mod local;
pub mod name;
pub mod remote;

pub use local::LocalResolver;
pub use name::ModuleName;
pub use remote::RemoteResolver;

//=====================================================
// Section 1.0 - Errors
//=====================================================

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("'{name}' is not a valid module name")]
    InvalidName { name: String },
    #[error("module '{module}' could not be located by any resolver")]
    NotFound { module: String },
    #[error("failed reading module source '{origin}'")]
    Io {
        origin: String,
        #[source]
        source: io::Error,
    },
    #[error("syntax error while loading '{module}': {error}")]
    Parse { module: String, error: ParseError },
    #[error("module '{module}' was already executed")]
    AlreadyExecuted { module: String },
    #[error("error while executing module '{module}': {error}")]
    Runtime { module: String, error: RuntimeError },
}

//=====================================================
// Section 2.0 - Resolver Identity
//=====================================================

static NEXT_RESOLVER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity assigned to every resolver at construction, used to
/// deduplicate chain registration and to recognize a resolver's own
/// embedded delegate within a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverId(u64);

impl ResolverId {
    fn next() -> Self {
        Self(NEXT_RESOLVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

//=====================================================
// Section 3.0 - Resolved Sources
//=====================================================

/// Where a module's source came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    File(PathBuf),
    Url(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::File(path) => write!(f, "{}", path.display()),
            Origin::Url(url) => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Clone)]
enum SourceProvider {
    /// Read the file when the loader asks; local files stay lazy.
    File(PathBuf),
    /// Already-fetched text carried in memory.
    Text(String),
}

/// A successful resolution: where the source lives and how to obtain it.
/// Never holds executed state.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    name: ModuleName,
    origin: Origin,
    is_package: bool,
    provider: SourceProvider,
}

impl ResolvedSource {
    pub(crate) fn local(name: ModuleName, path: PathBuf, is_package: bool) -> Self {
        Self {
            name,
            origin: Origin::File(path.clone()),
            is_package,
            provider: SourceProvider::File(path),
        }
    }

    pub(crate) fn fetched(name: ModuleName, url: String, text: String, is_package: bool) -> Self {
        Self {
            name,
            origin: Origin::Url(url),
            is_package,
            provider: SourceProvider::Text(text),
        }
    }

    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_package(&self) -> bool {
        self.is_package
    }

    /// Materialize the source text: a file read for local units, a cheap
    /// clone for fetched ones.
    pub fn read_source(&self) -> Result<String, ImportError> {
        match &self.provider {
            SourceProvider::File(path) => {
                fs::read_to_string(path).map_err(|source| ImportError::Io {
                    origin: path.display().to_string(),
                    source,
                })
            }
            SourceProvider::Text(text) => Ok(text.clone()),
        }
    }
}

//=====================================================
// Section 4.0 - Resolver Variants
//=====================================================

/// The resolver kinds a chain can hold, consulted in registration order.
#[derive(Debug)]
pub enum Resolver {
    Local(LocalResolver),
    Remote(RemoteResolver),
}

impl Resolver {
    pub fn kind(&self) -> &'static str {
        match self {
            Resolver::Local(_) => "local",
            Resolver::Remote(_) => "remote",
        }
    }

    fn id(&self) -> ResolverId {
        match self {
            Resolver::Local(resolver) => resolver.id(),
            Resolver::Remote(resolver) => resolver.id(),
        }
    }

    fn resolve(
        &self,
        ctx: &ImportContext,
        name: &ModuleName,
        extra_roots: &[PathBuf],
    ) -> Option<ResolvedSource> {
        match self {
            Resolver::Local(resolver) => resolver.resolve(name, extra_roots),
            Resolver::Remote(resolver) => resolver.resolve(ctx, name, extra_roots),
        }
    }
}

impl From<LocalResolver> for Resolver {
    fn from(resolver: LocalResolver) -> Self {
        Resolver::Local(resolver)
    }
}

impl From<RemoteResolver> for Resolver {
    fn from(resolver: RemoteResolver) -> Self {
        Resolver::Remote(resolver)
    }
}

//=====================================================
// Section 5.0 - Module Objects
//=====================================================

/// Name the loader binds a unit's origin under inside the module
/// namespace, so diagnostics and the module itself can reference it.
pub const ORIGIN_BINDING: &str = "__origin__";

/// A live module: the executed artifact bound into the registry.
#[derive(Debug)]
pub struct Module {
    name: ModuleName,
    namespace: Namespace,
    origin: Option<Origin>,
    is_package: bool,
    executed: bool,
    source: Option<String>,
}

/// Shared handle to a registered module. The registry owns the canonical
/// handle; equality of handles is identity (`Rc::ptr_eq`).
pub type ModuleHandle = Rc<RefCell<Module>>;

impl Module {
    fn new(name: ModuleName) -> Self {
        Self {
            name,
            namespace: Namespace::new(),
            origin: None,
            is_package: false,
            executed: false,
            source: None,
        }
    }

    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn is_package(&self) -> bool {
        self.is_package
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// The stored source text, verbatim as read or fetched.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[derive(Debug, Default)]
struct ModuleRegistry {
    entries: HashMap<String, ModuleHandle>,
    order: Vec<String>,
}

impl ModuleRegistry {
    fn get(&self, name: &str) -> Option<ModuleHandle> {
        self.entries.get(name).cloned()
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn insert(&mut self, name: String, handle: ModuleHandle) {
        if !self.entries.contains_key(&name) {
            self.order.push(name.clone());
            self.entries.insert(name, handle);
        }
    }

    fn remove(&mut self, name: &str) {
        if self.entries.remove(name).is_some() {
            self.order.retain(|entry| entry != name);
        }
    }

    fn names(&self) -> Vec<String> {
        self.order.clone()
    }
}

//=====================================================
// Section 6.0 - Import Context
//=====================================================

/// Host-owned import state: the module registry and the ordered resolver
/// chain. There is no ambient global registry; every resolution call goes
/// through a context the host constructed.
#[derive(Debug, Default)]
pub struct ImportContext {
    registry: ModuleRegistry,
    resolvers: Vec<Resolver>,
}

impl ImportContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver to the chain unless this exact instance is
    /// already present. Registering twice is a no-op, not an error.
    pub fn register(&mut self, resolver: impl Into<Resolver>) {
        let resolver = resolver.into();
        if self.is_registered(resolver.id()) {
            debug!("resolver already registered: {}", resolver.kind());
            return;
        }
        self.resolvers.push(resolver);
    }

    pub(crate) fn is_registered(&self, id: ResolverId) -> bool {
        self.resolvers.iter().any(|resolver| resolver.id() == id)
    }

    pub(crate) fn has_local_resolver(&self) -> bool {
        self.resolvers
            .iter()
            .any(|resolver| matches!(resolver, Resolver::Local(_)))
    }

    pub fn is_loaded(&self, name: &ModuleName) -> bool {
        self.registry.contains(&name.as_str())
    }

    /// Handle for an already-registered module, if any.
    pub fn module(&self, name: &str) -> Option<ModuleHandle> {
        self.registry.get(name)
    }

    /// Registered logical names, in binding order.
    pub fn loaded_modules(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Kind labels of the active resolvers, in chain order.
    pub fn active_resolvers(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(Resolver::kind).collect()
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    /// Consult resolvers in registration order; the first hit wins and no
    /// later resolver is consulted.
    pub fn resolve_first(
        &self,
        name: &ModuleName,
        extra_roots: &[PathBuf],
    ) -> Option<ResolvedSource> {
        for resolver in &self.resolvers {
            if let Some(unit) = resolver.resolve(self, name, extra_roots) {
                return Some(unit);
            }
        }
        None
    }

    /// Get-or-create a module object for a resolved unit. An existing
    /// registration wins; this is the only path that may hand back an
    /// already-created object.
    pub fn bind_module(&mut self, unit: &ResolvedSource) -> ModuleHandle {
        let key = unit.name().as_str();
        if let Some(existing) = self.registry.get(&key) {
            return existing;
        }
        let mut module = Module::new(unit.name().clone());
        module.is_package = unit.is_package();
        let handle = Rc::new(RefCell::new(module));
        self.registry.insert(key, handle.clone());
        handle
    }

    /// Execute a unit's source into its module object, exactly once. The
    /// origin is bound before execution so failures can reference it.
    /// Calling this on an already-executed module is a contract breach
    /// and fails loudly.
    pub fn execute_module(
        &mut self,
        handle: &ModuleHandle,
        unit: &ResolvedSource,
    ) -> Result<(), ImportError> {
        let module_name = unit.name().as_str();
        if handle.borrow().is_executed() {
            return Err(ImportError::AlreadyExecuted {
                module: module_name,
            });
        }

        let source = unit.read_source()?;
        let program =
            parser::validate_module(&source, &module_name).map_err(|error| ImportError::Parse {
                module: module_name.clone(),
                error,
            })?;

        let mut module = handle.borrow_mut();
        module.origin = Some(unit.origin().clone());
        interpreter::install_builtins(&mut module.namespace);
        module.namespace.insert(
            ORIGIN_BINDING.to_string(),
            crate::interpreter::Value::Str(unit.origin().to_string()),
        );
        interpreter::execute_program(&program, &mut module.namespace).map_err(|error| {
            ImportError::Runtime {
                module: module_name.clone(),
                error,
            }
        })?;
        module.executed = true;
        module.source = Some(source);
        Ok(())
    }

    /// The host entry point: resolve, bind, and execute a logical name.
    /// A name already in the registry short-circuits to its existing
    /// handle; a failed execution unbinds the name so it is not poisoned.
    pub fn import(&mut self, name: &str, extra_roots: &[PathBuf]) -> Result<ModuleHandle, ImportError> {
        let name = ModuleName::from_dotted(name)?;
        if let Some(existing) = self.registry.get(&name.as_str()) {
            debug!("module already loaded, reusing: {name}");
            return Ok(existing);
        }

        let unit = self
            .resolve_first(&name, extra_roots)
            .ok_or_else(|| ImportError::NotFound {
                module: name.as_str(),
            })?;

        let handle = self.bind_module(&unit);
        match self.execute_module(&handle, &unit) {
            Ok(()) => Ok(handle),
            Err(error) => {
                self.registry.remove(&name.as_str());
                Err(error)
            }
        }
    }
}
