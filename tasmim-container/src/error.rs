//! Error types for Tasmim container operations.
//!
//! Every failure here is a wiring error: it surfaces immediately to the
//! caller of `get_unified`/`resolve`/`get` and is never retried.

use std::fmt;
use std::path::PathBuf;

use tasmim_support::rendering::render_chain;

use crate::reflect::ReflectError;

/// Main error type for all Tasmim operations.
#[derive(Debug, thiserror::Error)]
pub enum TasmimError {
    /// The named type does not exist or cannot be introspected.
    #[error(transparent)]
    TypeLookup(TypeLookupError),

    /// A required constructor parameter has no value after unification
    /// and override merging.
    #[error("{}", .0)]
    MissingParam(MissingParamError),

    /// A configured setter has no corresponding method on the type.
    #[error("{}", .0)]
    SetterMethodNotFound(SetterMethodNotFoundError),

    /// A mutation step did not resolve to something invocable.
    #[error("Mutation does not implement the mutation contract: {value}")]
    MutationContractViolation { value: String },

    /// Requested service was never registered.
    #[error("{}", .0)]
    ServiceNotFound(ServiceNotFoundError),

    /// A service or type needs itself to be created, directly or through others.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A service definition resolved to something other than an object.
    #[error("Service {name:?} did not resolve to an object (got {found})")]
    ServiceNotObject { name: String, found: String },

    /// A named value was requested that was never registered.
    #[error("Unknown configuration key: {key:?}")]
    UnknownConfigurationKey { key: String },

    /// Constructor, setter or mutation returned an error.
    #[error("Failed to construct {class}: {source}")]
    ConstructionFailed {
        class: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A file-backed value could not be loaded.
    #[error("Failed to load {}: {source}", .path.display())]
    FileLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container is locked and cannot be modified.
    #[error("Container is locked. Configure services and params before the first get() or new_instance()")]
    ContainerLocked,
}

impl TasmimError {
    /// Shorthand for a [`TasmimError::ConstructionFailed`] with a plain message.
    pub fn construction(class: impl Into<String>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        TasmimError::ConstructionFailed {
            class: class.into(),
            source: message.into(),
        }
    }
}

/// Error when a type cannot be found or reflected.
#[derive(Debug)]
pub struct TypeLookupError {
    /// The type that was requested
    pub name: String,
    /// Why the reflection facility failed
    pub source: ReflectError,
    /// Known types with a similar name
    pub suggestions: Vec<String>,
}

impl fmt::Display for TypeLookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type lookup failed for {}: {}", self.name, self.source)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for TypeLookupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Error when a constructor parameter is still unresolved at instantiation.
#[derive(Debug)]
pub struct MissingParamError {
    /// The type being constructed
    pub class: String,
    /// The parameter without a value
    pub param: String,
}

impl fmt::Display for MissingParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Param missing: {}::${}", self.class, self.param)?;
        write!(
            f,
            "\n  Hint: Configure params[{:?}][{:?}] or pass it as an override",
            self.class, self.param,
        )
    }
}

/// Error when a setter refers to a method the type does not have.
#[derive(Debug)]
pub struct SetterMethodNotFoundError {
    pub class: String,
    pub method: String,
}

impl fmt::Display for SetterMethodNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Setter method not found: {}::{}()", self.class, self.method)?;
        write!(
            f,
            "\n  Hint: Register the method with ClassDef::setter() or remove setters[{:?}][{:?}]",
            self.class, self.method,
        )
    }
}

/// Error when a named service was never registered.
#[derive(Debug)]
pub struct ServiceNotFoundError {
    pub name: String,
    /// Registered services with a similar name
    pub suggestions: Vec<String>,
}

impl fmt::Display for ServiceNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not found: {:?}", self.name)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(f, "\n  Hint: Did you forget to call .set({:?}, ..)?", self.name)
    }
}

/// Error when creation re-enters a service or type still being created.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Names in creation order, ending with the repeated one.
    /// Example: ["mailer", "transport", "mailer"]
    pub chain: Vec<String>,
    pub kind: CycleKind,
}

/// What the names in a [`CircularDependencyError`] chain are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Named services, fetched with `get()`.
    Service,
    /// Types, each built as a new instance while building the previous one.
    Instance,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected:\n  {}", render_chain(&self.chain))?;
        match self.kind {
            CycleKind::Service => write!(
                f,
                "\n  Hint: Inject a lazy_new() instance instead of a lazy_get() service somewhere in the chain"
            ),
            CycleKind::Instance => write!(
                f,
                "\n  Hint: Configure an explicit value for one of the params in the chain"
            ),
        }
    }
}

/// Convenient Result type for Tasmim operations.
pub type Result<T> = std::result::Result<T, TasmimError>;
