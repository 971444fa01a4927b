//! Handler resolution.
//!
//! A handler reference is a dotted string `module[.module...].function`.
//! Modules live in a [`ModuleRegistry`] filled in when the runtime binary is
//! assembled; a module entry is either reserved by the runtime or a loader
//! that builds the module from files on the [`SearchPath`]. Resolution never
//! fails: an unusable reference yields a stand-in handler bound to a
//! [`Fault`] describing why.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::fault::{Fault, FaultTrace};
use crate::handler::{FaultHandler, Handler};

/// Module paths reserved by the runtime.
pub const DEFAULT_BUILTIN_MODULES: &[&str] = &["std", "core", "alloc", "bootstrap"];

/// Ordered directories consulted by module loaders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// First existing file named `relative` under the directories, in order.
    pub fn find(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        let relative = relative.as_ref();
        self.dirs
            .iter()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_file())
    }
}

/// Named functions exported by one loaded module.
#[derive(Default, Clone)]
pub struct HandlerModule {
    functions: BTreeMap<String, Arc<dyn Handler>>,
}

impl HandlerModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.functions.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn function(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.functions.get(name).cloned()
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for HandlerModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerModule")
            .field("functions", &self.function_names())
            .finish()
    }
}

/// Why a module loader could not produce its module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Syntax {
        file: String,
        line: usize,
        text: String,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("module '{0}' is already registered")]
    AlreadyRegistered(String),
}

pub type ModuleLoader = Box<dyn Fn(&SearchPath) -> Result<HandlerModule, ModuleError> + Send + Sync>;

enum ModuleEntry {
    Builtin,
    Loadable(ModuleLoader),
}

/// Dotted module path to module entry.
pub struct ModuleRegistry {
    entries: BTreeMap<String, ModuleEntry>,
}

impl ModuleRegistry {
    /// Registry with no entries at all.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry holding the default reserved modules.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for path in DEFAULT_BUILTIN_MODULES {
            registry
                .entries
                .insert((*path).to_string(), ModuleEntry::Builtin);
        }
        registry
    }

    pub fn register_builtin(&mut self, path: impl Into<String>) -> Result<(), RegistryError> {
        self.insert(path.into(), ModuleEntry::Builtin)
    }

    pub fn register_loader<F>(&mut self, path: impl Into<String>, loader: F) -> Result<(), RegistryError>
    where
        F: Fn(&SearchPath) -> Result<HandlerModule, ModuleError> + Send + Sync + 'static,
    {
        self.insert(path.into(), ModuleEntry::Loadable(Box::new(loader)))
    }

    /// Register a module that needs nothing from the search path.
    pub fn register_module(
        &mut self,
        path: impl Into<String>,
        module: HandlerModule,
    ) -> Result<(), RegistryError> {
        self.register_loader(path, move |_: &SearchPath| Ok(module.clone()))
    }

    fn insert(&mut self, path: String, entry: ModuleEntry) -> Result<(), RegistryError> {
        if self.entries.contains_key(&path) {
            return Err(RegistryError::AlreadyRegistered(path));
        }
        self.entries.insert(path, entry);
        Ok(())
    }

    pub fn module_paths(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// A path names a package when it is registered or is a prefix of a
    /// registered path.
    fn has_package(&self, path: &str) -> bool {
        let nested = format!("{path}.");
        self.entries
            .keys()
            .any(|key| key == path || key.starts_with(&nested))
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_paths())
            .finish()
    }
}

/// Result of resolving one handler reference.
pub enum Resolution {
    Resolved(Arc<dyn Handler>),
    Unresolved(Fault),
}

impl Resolution {
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Resolved(_) => None,
            Self::Unresolved(fault) => Some(fault),
        }
    }

    /// The located handler, or a stand-in failing with the fault.
    pub fn into_handler(self) -> Arc<dyn Handler> {
        match self {
            Self::Resolved(handler) => handler,
            Self::Unresolved(fault) => Arc::new(FaultHandler::new(fault)),
        }
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(_) => f.write_str("Resolved(..)"),
            Self::Unresolved(fault) => f.debug_tuple("Unresolved").field(fault).finish(),
        }
    }
}

pub struct Resolver<'a> {
    registry: &'a ModuleRegistry,
    search_path: &'a SearchPath,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a ModuleRegistry, search_path: &'a SearchPath) -> Self {
        Self {
            registry,
            search_path,
        }
    }

    pub fn resolve(&self, reference: &str) -> Resolution {
        match self.locate(reference) {
            Ok(handler) => Resolution::Resolved(handler),
            Err(fault) => {
                tracing::warn!(
                    handler = reference,
                    cause = fault.secondary_value().unwrap_or_default(),
                    "{}",
                    fault.message()
                );
                Resolution::Unresolved(fault)
            }
        }
    }

    fn locate(&self, reference: &str) -> Result<Arc<dyn Handler>, Fault> {
        let (module_path, function_name) = reference.rsplit_once('.').ok_or_else(|| {
            Fault::new(format!("Bad handler '{reference}'"))
                .with_secondary("expected '<module>.<function>'")
        })?;

        let mut prefix = String::new();
        for segment in module_path.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            if segment.is_empty() || !self.registry.has_package(&prefix) {
                return Err(import_fault(module_path, format!("No module named '{prefix}'")));
            }
        }

        let module = match self.registry.entries.get(module_path) {
            None => {
                return Err(import_fault(
                    module_path,
                    format!("No module named '{module_path}'"),
                ))
            }
            Some(ModuleEntry::Builtin) => {
                return Err(Fault::new(format!(
                    "Cannot use built-in module {module_path} as a handler module"
                )))
            }
            Some(ModuleEntry::Loadable(loader)) => {
                loader(self.search_path).map_err(|error| load_fault(module_path, error))?
            }
        };

        module.function(function_name).ok_or_else(|| {
            Fault::new(format!(
                "Handler '{function_name}' missing on module '{module_path}'"
            ))
            .with_secondary(format!(
                "module '{module_path}' has no attribute '{function_name}'"
            ))
        })
    }
}

fn import_fault(module_path: &str, cause: impl fmt::Display) -> Fault {
    Fault::new(format!("Unable to import module '{module_path}'")).with_secondary(cause)
}

fn load_fault(module_path: &str, error: ModuleError) -> Fault {
    match error {
        ModuleError::NotFound(cause) => import_fault(module_path, cause),
        ModuleError::Syntax {
            file,
            line,
            text,
            message,
        } => Fault::new(format!("Syntax error in module '{module_path}'"))
            .with_secondary(message)
            .with_trace(FaultTrace::from(format!("File \"{file}\" Line {line}\n\t{text}"))),
    }
}
