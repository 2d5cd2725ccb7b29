//! # The Container: heart of Tasmim
//!
//! Named services on top of the [`Resolver`]. Services are defined as
//! values (usually lazies) and created on first [`get`](Container::get);
//! plain objects are built with [`new_instance`](Container::new_instance).
//!
//! # Lifecycle
//! ```text
//! ContainerBuilder ──build()──> define ──lock()──> modify ──> Container
//!                                  │                             │
//!                          set() / config_mut()        get() / new_instance()
//! ```
//!
//! Configuration is only writable while the container is unlocked. The
//! first `get()` or `new_instance()` locks it.
//!
//! # Examples
//! ```rust
//! use tasmim_container::prelude::*;
//!
//! struct Mailer {
//!     host: String,
//! }
//!
//! let table = ClassTable::new().with(
//!     ClassDef::class("Mailer")
//!         .param("host")
//!         .constructor(|args| Ok(Mailer { host: args.string(0)? })),
//! );
//!
//! let mut container = Container::new(table);
//! container.config_mut().unwrap().set_param("Mailer", "host", "smtp.local");
//! container.set("mailer", Container::lazy_new("Mailer")).unwrap();
//!
//! let mailer = container.get_as::<Mailer>("mailer").expect("Failed to get mailer");
//! assert_eq!(mailer.host, "smtp.local");
//! assert!(container.is_locked());
//! ```

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tasmim_support::rendering::suggest_similar;
use tracing::{debug, info, instrument, trace};

use crate::blueprint::Blueprint;
use crate::error::{CircularDependencyError, CycleKind, Result, ServiceNotFoundError, TasmimError};
use crate::key::ParamKey;
use crate::lazy::{LazyArray, LazyCallable, LazyGet, LazyInclude, LazyNew, LazyValue};
use crate::provider::Provider;
use crate::reflect::{ClassTable, Reflector};
use crate::registry::{ServiceLocator, ServiceRegistry};
use crate::resolver::{Overlay, ResolveContext, Resolver};
use crate::store::ConfigStore;
use crate::value::{Instance, Object, Value};

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Container`] from providers.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .auto_resolve(true)
///     .provider(DatabaseProvider)
///     .provider(MailProvider)
///     .build()?;
/// ```
pub struct ContainerBuilder {
    reflector: Option<Arc<dyn Reflector>>,
    auto_resolve: bool,
    providers: Vec<Box<dyn Provider>>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            reflector: None,
            auto_resolve: false,
            providers: Vec::new(),
        }
    }

    /// Type metadata source. Defaults to the classes registered with
    /// `inventory::submit!`.
    pub fn reflector(mut self, reflector: impl Reflector + 'static) -> Self {
        self.reflector = Some(Arc::new(reflector));
        self
    }

    /// Fill typed params with no explicit value from the type map, or with
    /// a new instance of the declared type.
    pub fn auto_resolve(mut self, enabled: bool) -> Self {
        self.auto_resolve = enabled;
        self
    }

    /// Add a [`Provider`] module. Providers run in the order added.
    pub fn provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Build the container: every provider's `define`, then lock, then
    /// every provider's `modify`.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        info!(
            providers = self.providers.len(),
            auto_resolve = self.auto_resolve,
            "Building container"
        );

        let reflector = self
            .reflector
            .unwrap_or_else(|| Arc::new(ClassTable::from_inventory()));
        let resolver = Resolver::new(reflector).with_auto_resolve(self.auto_resolve);
        let mut container = Container::from_resolver(resolver);

        for provider in &self.providers {
            debug!(provider = provider.name(), "Defining");
            provider.define(&mut container)?;
        }

        container.lock();

        for provider in &self.providers {
            debug!(provider = provider.name(), "Modifying");
            provider.modify(&container)?;
        }

        info!(services = container.services.len(), "Container built successfully ✓");
        Ok(container)
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("auto_resolve", &self.auto_resolve)
            .field("providers", &self.providers.len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Service container over a configuration [`Resolver`].
pub struct Container {
    resolver: Resolver,
    services: ServiceRegistry,
    locked: AtomicBool,
}

impl Container {
    /// An unlocked container over `reflector`, with auto-resolution off.
    pub fn new(reflector: impl Reflector + 'static) -> Self {
        Self::from_resolver(Resolver::new(Arc::new(reflector)))
    }

    pub fn from_resolver(resolver: Resolver) -> Self {
        Self {
            resolver,
            services: ServiceRegistry::new(),
            locked: AtomicBool::new(false),
        }
    }

    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Prevents further configuration. Cannot be undone.
    pub fn lock(&self) {
        if !self.locked.swap(true, Ordering::SeqCst) {
            debug!("Container locked");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn config(&self) -> &ConfigStore {
        self.resolver.store()
    }

    /// Mutable access to params, setters, mutations, values and types.
    ///
    /// # Errors
    /// [`TasmimError::ContainerLocked`] once the container is locked.
    pub fn config_mut(&mut self) -> Result<&mut ConfigStore> {
        self.ensure_unlocked()?;
        Ok(self.resolver.store_mut())
    }

    // ── Services ──

    /// Defines a service. `definition` is an object, or a lazy value that
    /// produces one on first [`get`](Container::get).
    ///
    /// # Errors
    /// [`TasmimError::ContainerLocked`] once the container is locked.
    pub fn set(&mut self, name: &str, definition: impl Into<Value>) -> Result<()> {
        self.ensure_unlocked()?;
        self.services.register(name, definition.into());
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.services.contains(name)
    }

    /// Returns the shared instance of a service, creating it on first access.
    /// Locks the container.
    ///
    /// # Errors
    /// - [`TasmimError::ServiceNotFound`] if `name` was never set
    /// - [`TasmimError::ServiceNotObject`] if the definition produced a
    ///   non-object value
    /// - [`TasmimError::CircularDependency`] if creating the service needs
    ///   the service itself
    /// - any error raised while building it
    pub fn get(&self, name: &str) -> Result<Instance> {
        self.lock();

        let entry = self.services.get(name).ok_or_else(|| {
            TasmimError::ServiceNotFound(ServiceNotFoundError {
                name: name.to_string(),
                suggestions: self.find_suggestions(name),
            })
        })?;

        if let Some(instance) = entry.instance() {
            trace!(service = name, "Service instance cache hit");
            return Ok(Arc::clone(instance));
        }

        let _guard = CreationGuard::enter(self, name)?;
        entry
            .get_or_try_init(|| self.create_service(name, entry.definition()))
            .map(Arc::clone)
    }

    /// Like [`get`](Container::get), downcast to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.get(name)?.downcast::<T>().map_err(|_| {
            TasmimError::construction(name, format!("Type mismatch: expected {}", type_name::<T>()))
        })
    }

    /// Names of every defined service, in definition order.
    pub fn services(&self) -> Vec<String> {
        self.services.names().map(str::to_string).collect()
    }

    /// Names of services whose instance has been created.
    pub fn instances(&self) -> Vec<String> {
        self.services.instantiated().map(str::to_string).collect()
    }

    // ── New instances ──

    /// Builds a new object of `blueprint`'s type. The blueprint's params,
    /// setters and mutations are merged over the type's configuration.
    /// Locks the container.
    ///
    /// ```rust,ignore
    /// let mailer = container.new_instance(Blueprint::new("Mailer").param("port", 2525))?;
    /// ```
    pub fn new_instance(&self, blueprint: impl Into<Blueprint>) -> Result<Object> {
        self.new_instance_with(blueprint, &[])
    }

    /// Like [`new_instance`](Container::new_instance), with `contextual`
    /// blueprints applied to every type built during this call.
    pub fn new_instance_with(&self, blueprint: impl Into<Blueprint>, contextual: &[Blueprint]) -> Result<Object> {
        self.lock();
        let blueprint = blueprint.into();
        trace!(class = blueprint.class_name(), contextual = contextual.len(), "New instance");
        self.resolver.resolve_with(&blueprint, contextual, Some(self))
    }

    /// Like [`new_instance`](Container::new_instance), downcast to `T`.
    pub fn new_instance_as<T: Any + Send + Sync>(&self, blueprint: impl Into<Blueprint>) -> Result<T> {
        let blueprint = blueprint.into();
        let class = blueprint.class_name().to_string();
        self.new_instance(blueprint)?
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| TasmimError::construction(class, format!("Type mismatch: expected {}", type_name::<T>())))
    }

    /// A reusable factory for new objects of `blueprint`'s type.
    pub fn new_factory(&self, blueprint: impl Into<Blueprint>) -> Factory<'_> {
        Factory {
            container: self,
            blueprint: blueprint.into(),
        }
    }

    // ── Lazy helpers ──

    /// A new instance of `blueprint`'s type, built on each consumption.
    pub fn lazy_new(blueprint: impl Into<Blueprint>) -> Value {
        Value::lazy(LazyNew::new(blueprint))
    }

    /// The shared instance of a service.
    pub fn lazy_get(service: impl Into<String>) -> Value {
        Value::lazy(LazyGet::new(service))
    }

    /// A named value from the configuration store.
    pub fn lazy_value(key: impl Into<String>) -> Value {
        Value::lazy(LazyValue::new(key))
    }

    /// The text of a file.
    pub fn lazy_include(path: impl Into<PathBuf>) -> Value {
        Value::lazy(LazyInclude::new(path))
    }

    /// The contents of a file, converted by `loader`.
    pub fn lazy_include_with(
        path: impl Into<PathBuf>,
        loader: impl Fn(&Path) -> Result<Value> + Send + Sync + 'static,
    ) -> Value {
        Value::lazy(LazyInclude::new(path).with_loader(loader))
    }

    /// The result of calling `f`.
    pub fn lazy(f: impl Fn(&ResolveContext<'_>) -> Result<Value> + Send + Sync + 'static) -> Value {
        Value::lazy(LazyCallable::new(f))
    }

    /// A list whose lazy elements are resolved on consumption.
    pub fn lazy_array(items: impl IntoIterator<Item = Value>) -> Value {
        Value::lazy(LazyArray::new(items))
    }

    // ── Internal ──

    fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            return Err(TasmimError::ContainerLocked);
        }
        Ok(())
    }

    fn create_service(&self, name: &str, definition: &Value) -> Result<Instance> {
        debug!(service = name, "Creating service");

        let overlay = Overlay::default();
        let ctx = ResolveContext::new(&self.resolver, &overlay, Some(self));

        match definition.clone().resolve(&ctx)? {
            Value::Object(instance) => Ok(instance),
            other => Err(TasmimError::ServiceNotObject {
                name: name.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    fn find_suggestions(&self, name: &str) -> Vec<String> {
        let known: Vec<&str> = self.services.names().collect();
        suggest_similar(name, &known, 3)
    }
}

impl ServiceLocator for Container {
    fn has(&self, name: &str) -> bool {
        Container::has(self, name)
    }

    fn get(&self, name: &str) -> Result<Instance> {
        Container::get(self, name)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.services.len())
            .field("locked", &self.is_locked())
            .field("resolver", &self.resolver)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Factory
// ═══════════════════════════════════════════

/// Creates new objects from a fixed blueprint.
///
/// Extra params given per call are added on top: named ones replace
/// existing entries, positional ones follow the blueprint's own.
pub struct Factory<'c> {
    container: &'c Container,
    blueprint: Blueprint,
}

impl Factory<'_> {
    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn create(&self) -> Result<Object> {
        self.container.new_instance(self.blueprint.clone())
    }

    pub fn create_with(&self, extra: impl IntoIterator<Item = (ParamKey, Value)>) -> Result<Object> {
        self.container.new_instance(self.blueprint.with_params(extra))
    }
}

impl fmt::Debug for Factory<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").field("blueprint", &self.blueprint).finish()
    }
}

// ═══════════════════════════════════════════
// Creation guard (internal)
// ═══════════════════════════════════════════

thread_local! {
    /// Services being created on this thread, with their container.
    static CREATING: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a service as being created until dropped.
struct CreationGuard;

impl CreationGuard {
    fn enter(container: &Container, name: &str) -> Result<Self> {
        let owner = container as *const Container as usize;

        CREATING.with_borrow_mut(|stack| {
            if let Some(start) = stack.iter().position(|(o, n)| *o == owner && n == name) {
                let mut chain: Vec<String> = stack[start..]
                    .iter()
                    .filter(|(o, _)| *o == owner)
                    .map(|(_, n)| n.clone())
                    .collect();
                chain.push(name.to_string());
                return Err(TasmimError::CircularDependency(CircularDependencyError {
                    chain,
                    kind: CycleKind::Service,
                }));
            }

            stack.push((owner, name.to_string()));
            Ok(CreationGuard)
        })
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        CREATING.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, Factory};
    pub use crate::blueprint::{Blueprint, UnifiedParam};
    pub use crate::error::{Result, TasmimError};
    pub use crate::key::ParamKey;
    pub use crate::provider::Provider;
    pub use crate::reflect::{Args, ClassDef, ClassRegistration, ClassTable, ParamDef, Reflector};
    pub use crate::value::{Instance, Object, Value};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
