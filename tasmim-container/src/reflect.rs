//! Reflection contract consumed by the introspector.
//!
//! Rust has no runtime reflection, so types describe themselves through a
//! registration table: each [`ClassDef`] lists its parent, interfaces,
//! mixins, ordered constructor parameters, and the typed closures used to
//! construct it and call its setters.
//!
//! # Examples
//! ```
//! use tasmim_container::reflect::{ClassDef, ClassTable, ParamDef};
//!
//! struct Mailer {
//!     host: String,
//!     port: i64,
//! }
//!
//! let table = ClassTable::new().with(
//!     ClassDef::class("Mailer")
//!         .param("host")
//!         .param(ParamDef::new("port").with_default(25))
//!         .constructor(|args| {
//!             Ok(Mailer { host: args.string(0)?, port: args.int(1)? })
//!         }),
//! );
//!
//! assert_eq!(table.len(), 1);
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Result, TasmimError};
use crate::value::{Object, Value};

/// Type-erased constructor.
pub type ConstructorFn = Arc<dyn Fn(Args) -> Result<Object> + Send + Sync>;

/// Type-erased setter: receives the object under construction and a value.
pub type SetterFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), Value) -> Result<()> + Send + Sync>;

/// What kind of type a [`ClassDef`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Concrete, instantiable when it has a constructor
    Class,
    /// Class that cannot be instantiated directly
    Abstract,
    /// Contract a class implements
    Interface,
    /// Composable bundle of behavior (trait)
    Mixin,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Class => write!(f, "class"),
            TypeKind::Abstract => write!(f, "abstract class"),
            TypeKind::Interface => write!(f, "interface"),
            TypeKind::Mixin => write!(f, "mixin"),
        }
    }
}

/// A declared constructor parameter.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    /// Assigned when the parameter is added to a [`ClassDef`].
    pub position: usize,
    pub default: Option<Value>,
    /// Declared type constraint, used by auto-resolution.
    pub type_name: Option<String>,
}

impl ParamDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: 0,
            default: None,
            type_name: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

impl From<&str> for ParamDef {
    fn from(name: &str) -> Self {
        ParamDef::new(name)
    }
}

/// Self-description of one type in the registration table.
#[derive(Clone)]
pub struct ClassDef {
    name: String,
    kind: TypeKind,
    parent: Option<String>,
    interfaces: Vec<String>,
    mixins: Vec<String>,
    params: Vec<ParamDef>,
    constructor: Option<ConstructorFn>,
    setters: IndexMap<String, SetterFn>,
}

impl ClassDef {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            interfaces: Vec::new(),
            mixins: Vec::new(),
            params: Vec::new(),
            constructor: None,
            setters: IndexMap::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Abstract)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn mixin(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Mixin)
    }

    /// Sets the parent class.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds an implemented interface. On an interface, adds a super-interface.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Composes a mixin. Mixins may compose further mixins.
    pub fn uses(mut self, mixin: impl Into<String>) -> Self {
        self.mixins.push(mixin.into());
        self
    }

    /// Appends a constructor parameter; its position is its index.
    pub fn param(mut self, param: impl Into<ParamDef>) -> Self {
        let mut param = param.into();
        param.position = self.params.len();
        self.params.push(param);
        self
    }

    /// Registers the constructor, called with the resolved positional args.
    pub fn constructor<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Args) -> Result<T> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move |args: Args| Ok(Box::new(f(args)?) as Object)));
        self
    }

    /// Registers a setter method by name.
    pub fn setter<T, F>(mut self, method: impl Into<String>, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let method = method.into();
        let owner = self.name.clone();
        let label = method.clone();
        self.setters.insert(
            method,
            Arc::new(move |object: &mut (dyn Any + Send + Sync), value: Value| {
                let target = object.downcast_mut::<T>().ok_or_else(|| {
                    TasmimError::construction(
                        owner.clone(),
                        format!("setter {label}() expects {}", type_name::<T>()),
                    )
                })?;
                f(target, value)
            }),
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Directly implemented interfaces, in declaration order.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Directly composed mixins, in declaration order.
    pub fn mixins(&self) -> &[String] {
        &self.mixins
    }

    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    pub fn constructor_fn(&self) -> Option<&ConstructorFn> {
        self.constructor.as_ref()
    }

    pub fn setter_fn(&self, method: &str) -> Option<&SetterFn> {
        self.setters.get(method)
    }

    /// Names of the methods declared on this type itself.
    pub fn own_methods(&self) -> impl Iterator<Item = (&str, &SetterFn)> {
        self.setters.iter().map(|(name, setter)| (name.as_str(), setter))
    }

    /// `true` for classes that are not abstract and have a constructor.
    pub fn is_instantiable(&self) -> bool {
        self.kind == TypeKind::Class && self.constructor.is_some()
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("interfaces", &self.interfaces)
            .field("mixins", &self.mixins)
            .field("params", &self.params)
            .field("setters", &self.setters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Positional constructor arguments with typed accessors.
#[derive(Debug)]
pub struct Args {
    class: String,
    values: Vec<Value>,
}

impl Args {
    pub fn new(class: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            class: class.into(),
            values,
        }
    }

    /// The type being constructed.
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            TasmimError::construction(
                self.class.clone(),
                format!("argument #{index} was not supplied"),
            )
        })
    }

    pub fn string(&self, index: usize) -> Result<String> {
        let value = self.value(index)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(index, "string", value))
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        let value = self.value(index)?;
        value.as_int().ok_or_else(|| self.mismatch(index, "int", value))
    }

    pub fn float(&self, index: usize) -> Result<f64> {
        let value = self.value(index)?;
        value.as_float().ok_or_else(|| self.mismatch(index, "float", value))
    }

    pub fn bool(&self, index: usize) -> Result<bool> {
        let value = self.value(index)?;
        value.as_bool().ok_or_else(|| self.mismatch(index, "bool", value))
    }

    pub fn object<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        let value = self.value(index)?;
        value
            .downcast::<T>()
            .ok_or_else(|| self.mismatch(index, type_name::<T>(), value))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    fn mismatch(&self, index: usize, expected: &str, found: &Value) -> TasmimError {
        TasmimError::construction(
            self.class.clone(),
            format!(
                "Type mismatch: argument #{index} expected {expected}, got {}",
                found.kind()
            ),
        )
    }
}

/// Failure reported by a [`Reflector`].
#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    #[error("type is not registered")]
    NotFound,
    #[error("{0}")]
    Other(String),
}

/// The host reflection facility.
///
/// Implementations must be deterministic: the same name always yields an
/// equivalent definition.
pub trait Reflector: Send + Sync {
    fn reflect(&self, name: &str) -> std::result::Result<Arc<ClassDef>, ReflectError>;

    /// Names this reflector knows, used for "did you mean?" suggestions.
    fn known_types(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A compile-time registration of a [`ClassDef`].
///
/// Submit one per type with `inventory::submit!` and collect them all
/// with [`ClassTable::from_inventory`].
///
/// ```rust,ignore
/// fn mailer() -> ClassDef {
///     ClassDef::class("Mailer").param("host").constructor(|a| Ok(Mailer(a.string(0)?)))
/// }
///
/// tasmim_container::inventory::submit! {
///     ClassRegistration::new(mailer)
/// }
/// ```
pub struct ClassRegistration {
    build: fn() -> ClassDef,
}

impl ClassRegistration {
    pub const fn new(build: fn() -> ClassDef) -> Self {
        Self { build }
    }
}

inventory::collect!(ClassRegistration);

/// In-memory [`Reflector`] backed by a map of class definitions.
#[derive(Default)]
pub struct ClassTable {
    classes: HashMap<String, Arc<ClassDef>>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from every [`ClassRegistration`] submitted in the binary.
    pub fn from_inventory() -> Self {
        let mut table = Self::new();
        for registration in inventory::iter::<ClassRegistration> {
            table.register((registration.build)());
        }
        table
    }

    /// Adds or replaces a definition.
    pub fn register(&mut self, def: ClassDef) {
        debug!(class = %def.name, kind = %def.kind, "Registered class definition");
        self.classes.insert(def.name.clone(), Arc::new(def));
    }

    /// Builder-style [`ClassTable::register`].
    pub fn with(mut self, def: ClassDef) -> Self {
        self.register(def);
        self
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Reflector for ClassTable {
    fn reflect(&self, name: &str) -> std::result::Result<Arc<ClassDef>, ReflectError> {
        self.classes.get(name).cloned().ok_or(ReflectError::NotFound)
    }

    fn known_types(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }
}

impl fmt::Debug for ClassTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassTable")
            .field("classes", &self.classes.len())
            .finish()
    }
}
