//! Dynamic values flowing through params, setters and mutations.
//!
//! A [`Value`] is either plain data, a constructed object, a deferred
//! producer ([`Lazy`]) that is invoked at the point of use, or a
//! [`Mutation`] step.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TasmimError};
use crate::lazy::Lazy;
use crate::resolver::ResolveContext;

/// A shared, fully constructed object.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// An owned object while it is still being built.
///
/// Setters receive it by `&mut`, mutations take it and hand back a
/// (possibly different) object.
pub type Object = Box<dyn Any + Send + Sync>;

/// A post-construction transformation step.
///
/// Any `Fn(Object) -> Result<Object>` closure implements this.
pub trait Mutation: Send + Sync {
    fn mutate(&self, object: Object) -> Result<Object>;
}

impl<F> Mutation for F
where
    F: Fn(Object) -> Result<Object> + Send + Sync,
{
    fn mutate(&self, object: Object) -> Result<Object> {
        self(object)
    }
}

/// A configuration value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(Instance),
    Lazy(Arc<dyn Lazy>),
    Mutation(Arc<dyn Mutation>),
}

impl Value {
    /// Wraps a concrete object.
    pub fn object<T: Any + Send + Sync>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Wraps a deferred producer.
    pub fn lazy(lazy: impl Lazy + 'static) -> Self {
        Value::Lazy(Arc::new(lazy))
    }

    /// Wraps a closure as a mutation step.
    pub fn mutation(f: impl Fn(Object) -> Result<Object> + Send + Sync + 'static) -> Self {
        Value::Mutation(Arc::new(f))
    }

    /// Wraps an in-place edit of a `T` as a mutation step.
    ///
    /// The step fails with [`TasmimError::ConstructionFailed`] when applied
    /// to an object that is not a `T`.
    pub fn mutate<T: Any + Send + Sync>(
        f: impl Fn(&mut T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Value::mutation(move |mut object: Object| {
            match object.downcast_mut::<T>() {
                Some(target) => f(target)?,
                None => {
                    return Err(TasmimError::construction(
                        type_name::<T>(),
                        "mutation applied to an object of another type",
                    ));
                }
            }
            Ok(object)
        })
    }

    /// Returns `true` for deferred values.
    pub fn is_lazy(&self) -> bool {
        matches!(self, Value::Lazy(_))
    }

    /// Invokes a deferred value and returns its result; other values are
    /// returned as they are.
    ///
    /// The producer runs once per call. Nothing is memoized.
    pub fn resolve(self, ctx: &ResolveContext<'_>) -> Result<Value> {
        match self {
            Value::Lazy(lazy) => {
                tracing::trace!(lazy = ?lazy, "Invoking lazy value");
                lazy.resolve(ctx)
            }
            other => Ok(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    /// Returns the wrapped object as a `T`, if it is one.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_instance()
            .and_then(|instance| Arc::clone(instance).downcast::<T>().ok())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Lazy(_) => "lazy",
            Value::Mutation(_) => "mutation",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(_) => write!(f, "Object(..)"),
            Value::Lazy(lazy) => write!(f, "Lazy({lazy:?})"),
            Value::Mutation(_) => write!(f, "Mutation(..)"),
        }
    }
}

// Objects, lazies and mutations compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Lazy(a), Value::Lazy(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Value::Mutation(a), Value::Mutation(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Object(instance)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
