//! Deferred value producers.
//!
//! A lazy value stands in for a param, setter value or mutation step and
//! is invoked at the point of consumption, once per consumption. Nothing
//! is memoized here: repeated resolution of a [`LazyNew`] builds a fresh
//! object each time. Only [`LazyGet`] returns the same object, because
//! the service registry caches it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::blueprint::Blueprint;
use crate::error::{Result, ServiceNotFoundError, TasmimError};
use crate::resolver::ResolveContext;
use crate::value::Value;

/// A deferred producer of a [`Value`].
pub trait Lazy: Send + Sync + fmt::Debug {
    fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Value>;
}

/// Looks up a named value in the configuration store.
#[derive(Debug, Clone)]
pub struct LazyValue {
    key: String,
}

impl LazyValue {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Lazy for LazyValue {
    /// # Errors
    /// [`TasmimError::UnknownConfigurationKey`] if the key was never set.
    fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Value> {
        ctx.value(&self.key)?.resolve(ctx)
    }
}

/// Turns file contents into a value.
pub type FileLoader = Arc<dyn Fn(&Path) -> Result<Value> + Send + Sync>;

/// Loads a file when consumed.
///
/// Without a custom loader the file is read as UTF-8 text.
#[derive(Clone)]
pub struct LazyInclude {
    path: PathBuf,
    loader: Option<FileLoader>,
}

impl LazyInclude {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loader: None,
        }
    }

    /// Uses `loader` instead of reading the file as text.
    pub fn with_loader(mut self, loader: impl Fn(&Path) -> Result<Value> + Send + Sync + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Lazy for LazyInclude {
    fn resolve(&self, _ctx: &ResolveContext<'_>) -> Result<Value> {
        trace!(path = %self.path.display(), "Including file");

        match &self.loader {
            Some(loader) => loader(&self.path),
            None => std::fs::read_to_string(&self.path)
                .map(Value::Str)
                .map_err(|source| TasmimError::FileLoad {
                    path: self.path.clone(),
                    source,
                }),
        }
    }
}

impl fmt::Debug for LazyInclude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyInclude")
            .field("path", &self.path)
            .field("custom_loader", &self.loader.is_some())
            .finish()
    }
}

/// Fetches a named service, creating it on first access.
#[derive(Debug, Clone)]
pub struct LazyGet {
    service: String,
}

impl LazyGet {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Lazy for LazyGet {
    /// # Errors
    /// [`TasmimError::ServiceNotFound`] if the service is unknown, or if
    /// resolution was started without a service registry.
    fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Value> {
        let services = ctx.services().ok_or_else(|| {
            TasmimError::ServiceNotFound(ServiceNotFoundError {
                name: self.service.clone(),
                suggestions: Vec::new(),
            })
        })?;

        services.get(&self.service).map(Value::Object)
    }
}

/// Builds a new instance from a blueprint, through the resolver.
#[derive(Debug, Clone)]
pub struct LazyNew {
    blueprint: Blueprint,
}

impl LazyNew {
    pub fn new(blueprint: impl Into<Blueprint>) -> Self {
        Self {
            blueprint: blueprint.into(),
        }
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }
}

impl Lazy for LazyNew {
    fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Value> {
        let object = ctx.new_instance(&self.blueprint)?;
        Ok(Value::Object(Arc::from(object)))
    }
}

type Callable = Arc<dyn Fn(&ResolveContext<'_>) -> Result<Value> + Send + Sync>;

/// Calls an arbitrary closure.
#[derive(Clone)]
pub struct LazyCallable {
    callable: Callable,
}

impl LazyCallable {
    pub fn new(f: impl Fn(&ResolveContext<'_>) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self { callable: Arc::new(f) }
    }
}

impl Lazy for LazyCallable {
    fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Value> {
        (self.callable)(ctx)
    }
}

impl fmt::Debug for LazyCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyCallable(..)")
    }
}

/// A list whose lazy elements are resolved when the list is consumed.
#[derive(Debug, Clone)]
pub struct LazyArray {
    items: Vec<Value>,
}

impl LazyArray {
    pub fn new(items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

impl Lazy for LazyArray {
    fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Value> {
        self.items
            .iter()
            .map(|item| item.clone().resolve(ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    }
}
