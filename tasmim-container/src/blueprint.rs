//! Construction blueprints.
//!
//! A [`Blueprint`] is the unified plan for building one type: ordered
//! constructor params, setter calls, and mutation steps. The resolver
//! produces one per type and caches it; call sites layer their own
//! override blueprints on top with [`Blueprint::merge`].

use std::fmt;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::error::{MissingParamError, Result, SetterMethodNotFoundError, TasmimError};
use crate::introspect::TypeDescriptor;
use crate::key::ParamKey;
use crate::reflect::Args;
use crate::resolver::ResolveContext;
use crate::value::{Object, Value};

/// A parameter after unification.
#[derive(Clone, Debug, PartialEq)]
pub enum UnifiedParam {
    /// An explicit value, from configuration or an override.
    Resolved(Value),
    /// The declared constructor default. Any explicit value in the
    /// hierarchy takes priority over it.
    DefaultValue { name: String, value: Value },
    /// No value anywhere. Fatal unless supplied before instantiation.
    Unresolved { name: String },
}

impl UnifiedParam {
    pub fn is_resolved(&self) -> bool {
        matches!(self, UnifiedParam::Resolved(_))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, UnifiedParam::DefaultValue { .. })
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, UnifiedParam::Unresolved { .. })
    }

    /// The usable value, if there is one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            UnifiedParam::Resolved(value) | UnifiedParam::DefaultValue { value, .. } => Some(value),
            UnifiedParam::Unresolved { .. } => None,
        }
    }
}

impl From<Value> for UnifiedParam {
    fn from(value: Value) -> Self {
        UnifiedParam::Resolved(value)
    }
}

/// Immutable construction plan for one type.
///
/// # Examples
/// ```
/// use tasmim_container::blueprint::Blueprint;
///
/// let overrides = Blueprint::new("Mailer")
///     .param(0, "smtp.local")
///     .param("port", 587)
///     .setter("setTimeout", 30);
///
/// assert_eq!(overrides.class_name(), "Mailer");
/// assert_eq!(overrides.params().len(), 2);
/// ```
#[derive(Clone)]
pub struct Blueprint {
    class_name: String,
    params: IndexMap<ParamKey, UnifiedParam>,
    setters: IndexMap<String, Value>,
    mutations: Vec<Value>,
}

impl Blueprint {
    /// An empty blueprint for `class_name`.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            params: IndexMap::new(),
            setters: IndexMap::new(),
            mutations: Vec::new(),
        }
    }

    pub fn from_parts(
        class_name: impl Into<String>,
        params: IndexMap<ParamKey, UnifiedParam>,
        setters: IndexMap<String, Value>,
        mutations: Vec<Value>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            params,
            setters,
            mutations,
        }
    }

    /// Adds a param override by name or position.
    pub fn param(mut self, key: impl Into<ParamKey>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), UnifiedParam::Resolved(value.into()));
        self
    }

    /// Adds a setter call.
    pub fn setter(mut self, method: impl Into<String>, value: impl Into<Value>) -> Self {
        self.setters.insert(method.into(), value.into());
        self
    }

    /// Appends a mutation step.
    pub fn mutation(mut self, mutation: impl Into<Value>) -> Self {
        self.mutations.push(mutation.into());
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn params(&self) -> &IndexMap<ParamKey, UnifiedParam> {
        &self.params
    }

    pub fn setters(&self) -> &IndexMap<String, Value> {
        &self.setters
    }

    pub fn mutations(&self) -> &[Value] {
        &self.mutations
    }

    /// Layers `overrides` on top of this blueprint.
    ///
    /// - Params: for the i-th param of `self`, the override's positional
    ///   entry `i` wins; failing that its entry under the same key wins;
    ///   otherwise the param is kept. Override entries matching no param
    ///   of `self` are ignored.
    /// - Setters: map merge, override wins on collision.
    /// - Mutations: `self`'s steps followed by the override's.
    pub fn merge(&self, overrides: &Blueprint) -> Blueprint {
        let mut merged = self.clone();

        if !overrides.params.is_empty() {
            for (position, (key, param)) in merged.params.iter_mut().enumerate() {
                if let Some(value) = overrides.params.get(&ParamKey::Position(position)) {
                    *param = value.clone();
                } else if let Some(value) = overrides.params.get(key) {
                    *param = value.clone();
                }
            }
        }

        merged
            .setters
            .extend(overrides.setters.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.mutations.extend(overrides.mutations.iter().cloned());
        merged
    }

    /// Returns a copy with extra params added.
    ///
    /// Named entries overwrite existing ones. Positional entries are
    /// appended after the positional entries already present, so call-time
    /// arguments follow those fixed when the blueprint was built.
    pub fn with_params(&self, extra: impl IntoIterator<Item = (ParamKey, Value)>) -> Blueprint {
        let mut result = self.clone();
        let offset = self.params.keys().filter(|key| key.position().is_some()).count();

        for (key, value) in extra {
            let key = match key {
                ParamKey::Position(pos) => ParamKey::Position(pos + offset),
                named => named,
            };
            result.params.insert(key, UnifiedParam::Resolved(value));
        }

        result
    }

    /// Layers a contextual blueprint for the same type: params and setters
    /// overwrite by key, mutations append.
    pub(crate) fn layer(&mut self, other: &Blueprint) {
        self.params
            .extend(other.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.setters
            .extend(other.setters.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.mutations.extend(other.mutations.iter().cloned());
    }

    /// Builds the object this blueprint describes.
    ///
    /// Lazy params, setter values and mutation steps are invoked here, at
    /// the point of use. Params are passed positionally in map order.
    ///
    /// # Errors
    /// - [`TasmimError::MissingParam`] for any param still unresolved
    /// - [`TasmimError::SetterMethodNotFound`] for a setter the type lacks,
    ///   before any param is resolved or the constructor runs
    /// - [`TasmimError::MutationContractViolation`] for a mutation step
    ///   that does not resolve to a [`Value::Mutation`]
    ///
    /// A failure after construction discards the partially built object;
    /// setters already applied are not undone.
    pub fn instantiate(&self, descriptor: &TypeDescriptor, ctx: &ResolveContext<'_>) -> Result<Object> {
        let class = self.class_name.as_str();

        let setters = self
            .setters
            .iter()
            .map(|(method, value)| {
                descriptor.setter(method).map(|setter| (setter, value)).ok_or_else(|| {
                    TasmimError::SetterMethodNotFound(SetterMethodNotFoundError {
                        class: class.to_string(),
                        method: method.clone(),
                    })
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut args = Vec::with_capacity(self.params.len());
        for param in self.params.values() {
            let value = match param {
                UnifiedParam::Resolved(value) | UnifiedParam::DefaultValue { value, .. } => {
                    value.clone().resolve(ctx)?
                }
                UnifiedParam::Unresolved { name } => {
                    return Err(TasmimError::MissingParam(MissingParamError {
                        class: class.to_string(),
                        param: name.clone(),
                    }));
                }
            };
            args.push(value);
        }

        let constructor = descriptor.constructor().filter(|_| descriptor.is_instantiable()).ok_or_else(|| {
            TasmimError::construction(class, format!("cannot instantiate {} {class}", descriptor.kind()))
        })?;

        trace!(class, args = args.len(), "Constructing");
        let mut object = constructor(Args::new(class, args))?;

        for (setter, value) in setters {
            let value = value.clone().resolve(ctx)?;
            setter(&mut *object, value)?;
        }

        for step in &self.mutations {
            match step.clone().resolve(ctx)? {
                Value::Mutation(mutation) => object = mutation.mutate(object)?,
                other => {
                    warn!(class, value = ?other, "Mutation step does not implement the mutation contract");
                    return Err(TasmimError::MutationContractViolation {
                        value: format!("{other:?}"),
                    });
                }
            }
        }

        Ok(object)
    }
}

impl From<&str> for Blueprint {
    fn from(class_name: &str) -> Self {
        Blueprint::new(class_name)
    }
}

impl From<String> for Blueprint {
    fn from(class_name: String) -> Self {
        Blueprint::new(class_name)
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("class_name", &self.class_name)
            .field("params", &self.params)
            .field("setters", &self.setters)
            .field("mutations", &self.mutations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(value: impl Into<Value>) -> UnifiedParam {
        UnifiedParam::Resolved(value.into())
    }

    fn unified() -> Blueprint {
        let mut params = IndexMap::new();
        params.insert(ParamKey::from("foo"), UnifiedParam::Resolved("a".into()));
        params.insert(
            ParamKey::from("bar"),
            UnifiedParam::DefaultValue {
                name: "bar".into(),
                value: "b".into(),
            },
        );
        params.insert(ParamKey::from("baz"), UnifiedParam::Unresolved { name: "baz".into() });

        let mut setters = IndexMap::new();
        setters.insert("setX".to_string(), Value::from(1));

        Blueprint::from_parts("Widget", params, setters, vec![Value::from("m1")])
    }

    #[test]
    fn positional_override_beats_named() {
        let merged = unified().merge(&Blueprint::new("Widget").param(0, "keepme").param("foo", "bad"));
        assert_eq!(merged.params()[&ParamKey::from("foo")], resolved("keepme"));
    }

    #[test]
    fn named_override_replaces_default_and_unresolved() {
        let merged = unified().merge(&Blueprint::new("Widget").param("bar", "B").param("baz", "Z"));
        assert_eq!(merged.params()[&ParamKey::from("bar")], resolved("B"));
        assert_eq!(merged.params()[&ParamKey::from("baz")], resolved("Z"));
        assert_eq!(merged.params()[&ParamKey::from("foo")], resolved("a"));
    }

    #[test]
    fn unmatched_override_params_are_ignored() {
        let merged = unified().merge(&Blueprint::new("Widget").param("nope", 1).param(7, 2));
        assert_eq!(merged.params().len(), 3);
    }

    #[test]
    fn setters_merge_and_mutations_append() {
        let merged = unified().merge(
            &Blueprint::new("Widget")
                .setter("setX", 2)
                .setter("setY", 3)
                .mutation("m2"),
        );

        assert_eq!(merged.setters()["setX"], Value::Int(2));
        assert_eq!(merged.setters()["setY"], Value::Int(3));
        assert_eq!(merged.mutations(), &[Value::from("m1"), Value::from("m2")]);
    }

    #[test]
    fn merge_keeps_base_class_name() {
        let merged = unified().merge(&Blueprint::new("Other"));
        assert_eq!(merged.class_name(), "Widget");
    }

    #[test]
    fn with_params_appends_positional_after_existing() {
        let factory = Blueprint::new("Widget").param(0, "fixed").param("name", "x");
        let call = factory.with_params(vec![
            (ParamKey::from(0), Value::from("extra")),
            (ParamKey::from("name"), Value::from("y")),
        ]);

        assert_eq!(call.params()[&ParamKey::from(0)], resolved("fixed"));
        assert_eq!(call.params()[&ParamKey::from(1)], resolved("extra"));
        assert_eq!(call.params()[&ParamKey::from("name")], resolved("y"));
    }

    #[test]
    fn unified_param_accessors() {
        let default = UnifiedParam::DefaultValue {
            name: "x".into(),
            value: 1.into(),
        };
        assert!(default.is_default());
        assert_eq!(default.value(), Some(&Value::Int(1)));
        assert_eq!(UnifiedParam::Unresolved { name: "x".into() }.value(), None);
    }
}
