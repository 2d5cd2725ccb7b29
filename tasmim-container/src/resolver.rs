//! # The Resolver: unification of configuration over a type hierarchy
//!
//! Given a type name, the resolver computes its unified [`Blueprint`]:
//! the parent's unified blueprint is the baseline, then the type's own
//! params are decided by the precedence rule, and setters and mutations
//! are layered from interfaces, then mixins, then the type itself.
//!
//! ```text
//!   getUnified(Child)
//!        │
//!        ├── getUnified(Parent) ──► baseline params / setters / mutations
//!        │
//!        ├── params:    explicit #pos ► explicit $name ► parent resolved
//!        │              ► own default ► parent default ► unresolved
//!        │
//!        └── setters/mutations: parent ► interfaces ► mixins ► Child
//! ```
//!
//! Unified blueprints are cached per type. Contextual overrides never
//! touch the cache or the store: they travel as an [`Overlay`] through
//! unification and through the [`ResolveContext`] seen by lazy values.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, instrument, trace};

use crate::blueprint::{Blueprint, UnifiedParam};
use crate::error::{CircularDependencyError, CycleKind, Result, TasmimError};
use crate::introspect::{Introspector, TypeDescriptor};
use crate::key::ParamKey;
use crate::lazy::LazyNew;
use crate::reflect::{ParamDef, Reflector};
use crate::registry::ServiceLocator;
use crate::store::ConfigStore;
use crate::value::{Object, Value};

/// Contextual configuration layered over the store for a single resolve.
///
/// Several blueprints for the same type are combined in order.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    entries: HashMap<String, Blueprint>,
}

impl Overlay {
    pub fn new(contextual: &[Blueprint]) -> Self {
        let mut entries: HashMap<String, Blueprint> = HashMap::new();
        for blueprint in contextual {
            entries
                .entry(blueprint.class_name().to_string())
                .and_modify(|existing| existing.layer(blueprint))
                .or_insert_with(|| blueprint.clone());
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, class: &str) -> Option<&Blueprint> {
        self.entries.get(class)
    }
}

/// What a lazy value sees when it is invoked.
///
/// Carries the resolver, the active overlay, and the service locator if
/// resolution was started from a container.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    resolver: &'a Resolver,
    overlay: &'a Overlay,
    services: Option<&'a dyn ServiceLocator>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        resolver: &'a Resolver,
        overlay: &'a Overlay,
        services: Option<&'a dyn ServiceLocator>,
    ) -> Self {
        Self {
            resolver,
            overlay,
            services,
        }
    }

    pub fn resolver(&self) -> &'a Resolver {
        self.resolver
    }

    pub fn overlay(&self) -> &'a Overlay {
        self.overlay
    }

    pub fn services(&self) -> Option<&'a dyn ServiceLocator> {
        self.services
    }

    /// Builds a new instance from `overrides` under the active overlay.
    ///
    /// # Errors
    /// [`TasmimError::CircularDependency`] if `class` is already being
    /// built further up this construction.
    pub fn new_instance(&self, overrides: &Blueprint) -> Result<Object> {
        let class = overrides.class_name();
        let _guard = ConstructionGuard::enter(self.resolver, class)?;
        let unified = self.resolver.unify(class, self.overlay)?;
        let descriptor = self.resolver.describe(class)?;
        unified.merge(overrides).instantiate(&descriptor, self)
    }

    /// Looks up a named value in the store.
    pub fn value(&self, key: &str) -> Result<Value> {
        self.resolver.store().value(key).cloned()
    }
}

impl fmt::Debug for ResolveContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveContext")
            .field("overlay", self.overlay)
            .field("services", &self.services.is_some())
            .finish()
    }
}

/// Computes unified blueprints and resolves them into objects.
pub struct Resolver {
    introspector: Introspector,
    store: ConfigStore,
    auto_resolve: bool,
    unified: RwLock<HashMap<String, Arc<Blueprint>>>,
}

impl Resolver {
    pub fn new(reflector: Arc<dyn Reflector>) -> Self {
        Self {
            introspector: Introspector::new(reflector),
            store: ConfigStore::new(),
            auto_resolve: false,
            unified: RwLock::new(HashMap::new()),
        }
    }

    /// Enables auto-resolution of typed params that have no explicit value.
    pub fn with_auto_resolve(mut self, enabled: bool) -> Self {
        self.auto_resolve = enabled;
        self
    }

    pub fn auto_resolve(&self) -> bool {
        self.auto_resolve
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Mutable access to the configuration store.
    ///
    /// Clears every cached unified blueprint, since any entry may affect
    /// a type or its descendants.
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        self.unified.get_mut().clear();
        &mut self.store
    }

    /// Drops every cached unified blueprint.
    pub fn clear_cache(&self) {
        self.unified.write().clear();
    }

    pub fn introspector(&self) -> &Introspector {
        &self.introspector
    }

    pub fn describe(&self, class: &str) -> Result<Arc<TypeDescriptor>> {
        self.introspector.describe(class)
    }

    /// Returns the unified blueprint for `class`, computing and caching it
    /// on first use. Repeated calls return the same `Arc`.
    pub fn get_unified(&self, class: &str) -> Result<Arc<Blueprint>> {
        self.unify(class, &Overlay::default())
    }

    /// Builds an object: `blueprint` is merged over the unified blueprint of
    /// its type, with `contextual` blueprints applied to every type built
    /// during this call, including nested lazy constructions.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use tasmim_container::blueprint::Blueprint;
    /// use tasmim_container::reflect::{ClassDef, ClassTable};
    /// use tasmim_container::resolver::Resolver;
    ///
    /// struct Greeter(String);
    ///
    /// let table = ClassTable::new().with(
    ///     ClassDef::class("Greeter")
    ///         .param("greeting")
    ///         .constructor(|args| Ok(Greeter(args.string(0)?))),
    /// );
    ///
    /// let resolver = Resolver::new(Arc::new(table));
    /// let object = resolver
    ///     .resolve(&Blueprint::new("Greeter").param("greeting", "hello"), &[])
    ///     .unwrap();
    ///
    /// assert_eq!(object.downcast_ref::<Greeter>().unwrap().0, "hello");
    /// ```
    pub fn resolve(&self, blueprint: &Blueprint, contextual: &[Blueprint]) -> Result<Object> {
        self.resolve_with(blueprint, contextual, None)
    }

    /// Like [`Resolver::resolve`], with a service locator for service lazies.
    pub fn resolve_with(
        &self,
        blueprint: &Blueprint,
        contextual: &[Blueprint],
        services: Option<&dyn ServiceLocator>,
    ) -> Result<Object> {
        let overlay = Overlay::new(contextual);
        ResolveContext::new(self, &overlay, services).new_instance(blueprint)
    }

    /// Unifies `class` under `overlay`. Only overlay-free results are cached.
    #[instrument(skip(self, overlay), name = "unify", level = "trace")]
    pub(crate) fn unify(&self, class: &str, overlay: &Overlay) -> Result<Arc<Blueprint>> {
        let cacheable = overlay.is_empty();

        if cacheable {
            if let Some(cached) = self.unified.read().get(class) {
                trace!(class, "Unified cache hit");
                return Ok(Arc::clone(cached));
            }
        }

        let descriptor = self.introspector.describe(class)?;

        let (parent, parent_descriptor) = match descriptor.parent() {
            Some(parent) => (
                Some(self.unify(parent, overlay)?),
                Some(self.introspector.describe(parent)?),
            ),
            None => (None, None),
        };

        // Contributions the parent already merged are not layered again.
        let (inherited_interfaces, inherited_mixins) = parent_descriptor
            .as_ref()
            .map_or((0, 0), |p| (p.interfaces().len(), p.mixins().len()));
        let sources: Vec<&str> = descriptor.interfaces()[inherited_interfaces..]
            .iter()
            .chain(&descriptor.mixins()[inherited_mixins..])
            .map(String::as_str)
            .chain(std::iter::once(class))
            .collect();

        let params = self.unified_params(&descriptor, parent.as_deref(), overlay);
        let setters = self.unified_setters(&sources, parent.as_deref(), overlay);
        let mutations = self.unified_mutations(&sources, parent.as_deref(), overlay);

        debug!(
            class,
            params = params.len(),
            setters = setters.len(),
            mutations = mutations.len(),
            contextual = !cacheable,
            "Unified blueprint"
        );

        let blueprint = Arc::new(Blueprint::from_parts(class, params, setters, mutations));
        if !cacheable {
            return Ok(blueprint);
        }

        let mut cache = self.unified.write();
        let cached = cache.entry(class.to_string()).or_insert(blueprint);
        Ok(Arc::clone(cached))
    }

    fn unified_params(
        &self,
        descriptor: &TypeDescriptor,
        parent: Option<&Blueprint>,
        overlay: &Overlay,
    ) -> IndexMap<ParamKey, UnifiedParam> {
        descriptor
            .params()
            .iter()
            .map(|param| {
                let mut unified = self.unified_param(descriptor.name(), param, parent, overlay);
                if self.auto_resolve {
                    unified = self.auto_resolved(param, unified);
                }
                (ParamKey::Name(param.name.clone()), unified)
            })
            .collect()
    }

    /// Precedence for one param of `class`:
    /// 1. explicit entry at its position
    /// 2. explicit entry under its name
    /// 3. the parent's value, if it is a concrete (resolved) value
    /// 4. this type's declared default
    /// 5. the parent's declared default
    /// 6. unresolved
    fn unified_param(
        &self,
        class: &str,
        param: &ParamDef,
        parent: Option<&Blueprint>,
        overlay: &Overlay,
    ) -> UnifiedParam {
        let explicit = |key: ParamKey| {
            self.explicit_param(class, &key, overlay)
                .filter(|value| !value.is_unresolved())
        };

        if let Some(value) = explicit(ParamKey::Position(param.position)) {
            return value;
        }

        if let Some(value) = explicit(ParamKey::Name(param.name.clone())) {
            return value;
        }

        let inherited = parent.and_then(|bp| bp.params().get(&ParamKey::Name(param.name.clone())));

        if let Some(value) = inherited.filter(|p| p.is_resolved()) {
            return value.clone();
        }

        if let Some(default) = &param.default {
            return UnifiedParam::DefaultValue {
                name: param.name.clone(),
                value: default.clone(),
            };
        }

        if let Some(value) = inherited.filter(|p| p.is_default()) {
            return value.clone();
        }

        UnifiedParam::Unresolved {
            name: param.name.clone(),
        }
    }

    /// Explicit entry for `class`, with the overlay taking priority.
    fn explicit_param(&self, class: &str, key: &ParamKey, overlay: &Overlay) -> Option<UnifiedParam> {
        overlay
            .get(class)
            .and_then(|bp| bp.params().get(key).cloned())
            .or_else(|| {
                self.store
                    .params(class)
                    .and_then(|params| params.get(key))
                    .map(|value| UnifiedParam::Resolved(value.clone()))
            })
    }

    /// For a param with no explicit value: use the configured value for its
    /// declared type, or a lazy new instance when that type is a concrete
    /// class. Anything else keeps its marker.
    fn auto_resolved(&self, param: &ParamDef, unified: UnifiedParam) -> UnifiedParam {
        if unified.is_resolved() {
            return unified;
        }

        let Some(type_name) = param.type_name.as_deref() else {
            return unified;
        };

        if let Some(value) = self.store.type_value(type_name) {
            trace!(param = %param.name, type_name, "Auto-resolved from type map");
            return UnifiedParam::Resolved(value.clone());
        }

        match self.introspector.describe(type_name) {
            Ok(descriptor) if descriptor.is_instantiable() => {
                trace!(param = %param.name, type_name, "Auto-resolved to lazy new instance");
                UnifiedParam::Resolved(Value::lazy(LazyNew::new(Blueprint::new(type_name))))
            }
            _ => unified,
        }
    }

    fn unified_setters(
        &self,
        sources: &[&str],
        parent: Option<&Blueprint>,
        overlay: &Overlay,
    ) -> IndexMap<String, Value> {
        let mut unified = parent.map(|bp| bp.setters().clone()).unwrap_or_default();

        for source in sources {
            if let Some(setters) = self.store.setters(source) {
                unified.extend(setters.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            if let Some(contextual) = overlay.get(source) {
                unified.extend(contextual.setters().iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        unified
    }

    fn unified_mutations(&self, sources: &[&str], parent: Option<&Blueprint>, overlay: &Overlay) -> Vec<Value> {
        let mut unified = parent.map(|bp| bp.mutations().to_vec()).unwrap_or_default();

        for source in sources {
            unified.extend(self.store.mutations(source).iter().cloned());
            if let Some(contextual) = overlay.get(source) {
                unified.extend(contextual.mutations().iter().cloned());
            }
        }

        unified
    }
}

thread_local! {
    /// Types being built on this thread, with their resolver.
    static CONSTRUCTING: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a type as under construction until dropped.
struct ConstructionGuard;

impl ConstructionGuard {
    fn enter(resolver: &Resolver, class: &str) -> Result<Self> {
        let owner = resolver as *const Resolver as usize;

        CONSTRUCTING.with_borrow_mut(|stack| {
            if let Some(start) = stack.iter().position(|(o, c)| *o == owner && c == class) {
                let mut chain: Vec<String> = stack[start..]
                    .iter()
                    .filter(|(o, _)| *o == owner)
                    .map(|(_, c)| c.clone())
                    .collect();
                chain.push(class.to_string());
                debug!(chain = ?chain, "Construction cycle");
                return Err(TasmimError::CircularDependency(CircularDependencyError {
                    chain,
                    kind: CycleKind::Instance,
                }));
            }

            stack.push((owner, class.to_string()));
            Ok(ConstructionGuard)
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("auto_resolve", &self.auto_resolve)
            .field("store", &self.store)
            .field("unified", &self.unified.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{ClassDef, ClassTable};

    #[derive(Debug)]
    struct Widget {
        args: Vec<Value>,
        fake: Option<Value>,
    }

    fn widget(def: ClassDef) -> ClassDef {
        def.constructor(|args| {
            Ok(Widget {
                args: args.into_values(),
                fake: None,
            })
        })
        .setter("setFake", |w: &mut Widget, v: Value| {
            w.fake = Some(v);
            Ok(())
        })
    }

    fn resolver(table: ClassTable) -> Resolver {
        Resolver::new(Arc::new(table))
    }

    fn param(bp: &Blueprint, name: &str) -> UnifiedParam {
        bp.params()[&ParamKey::from(name)].clone()
    }

    #[test]
    fn unconfigured_type_gets_declared_defaults() {
        let r = resolver(ClassTable::new().with(widget(
            ClassDef::class("A")
                .param(ParamDef::new("x").with_default(1))
                .param("y"),
        )));

        let bp = r.get_unified("A").unwrap();
        assert_eq!(
            param(&bp, "x"),
            UnifiedParam::DefaultValue {
                name: "x".into(),
                value: Value::Int(1)
            }
        );
        assert_eq!(param(&bp, "y"), UnifiedParam::Unresolved { name: "y".into() });
        assert!(bp.setters().is_empty());
        assert!(bp.mutations().is_empty());

        let again = r.get_unified("A").unwrap();
        assert!(Arc::ptr_eq(&bp, &again));
    }

    #[test]
    fn parent_explicit_value_is_inherited() {
        let mut r = resolver(
            ClassTable::new()
                .with(widget(ClassDef::class("P").param("x")))
                .with(widget(ClassDef::class("C").extends("P").param("x"))),
        );
        r.store_mut().set_param("P", "x", "dib");

        let bp = r.get_unified("C").unwrap();
        assert_eq!(param(&bp, "x"), UnifiedParam::Resolved("dib".into()));
    }

    #[test]
    fn inherited_resolved_value_beats_own_default() {
        let mut r = resolver(
            ClassTable::new()
                .with(widget(ClassDef::class("P").param("x")))
                .with(widget(
                    ClassDef::class("C")
                        .extends("P")
                        .param(ParamDef::new("x").with_default("mine")),
                )),
        );
        r.store_mut().set_param("P", "x", "dib");

        let bp = r.get_unified("C").unwrap();
        assert_eq!(param(&bp, "x"), UnifiedParam::Resolved("dib".into()));
    }

    #[test]
    fn own_default_beats_inherited_default() {
        let r = resolver(
            ClassTable::new()
                .with(widget(ClassDef::class("P").param(ParamDef::new("x").with_default("theirs"))))
                .with(widget(
                    ClassDef::class("C")
                        .extends("P")
                        .param(ParamDef::new("x").with_default("mine")),
                )),
        );

        let bp = r.get_unified("C").unwrap();
        assert_eq!(param(&bp, "x").value(), Some(&Value::from("mine")));
        assert!(param(&bp, "x").is_default());
    }

    #[test]
    fn inherited_default_when_child_declares_none() {
        let r = resolver(
            ClassTable::new()
                .with(widget(ClassDef::class("P").param(ParamDef::new("x").with_default("bar"))))
                .with(widget(ClassDef::class("C").extends("P").param("x"))),
        );

        let bp = r.get_unified("C").unwrap();
        assert!(param(&bp, "x").is_default());
        assert_eq!(param(&bp, "x").value(), Some(&Value::from("bar")));
    }

    #[test]
    fn explicit_position_beats_explicit_name() {
        let mut r = resolver(ClassTable::new().with(widget(ClassDef::class("A").param("foo"))));
        r.store_mut().set_param("A", "foo", "named");
        r.store_mut().set_param("A", 0, "positional");

        let bp = r.get_unified("A").unwrap();
        assert_eq!(param(&bp, "foo"), UnifiedParam::Resolved("positional".into()));
    }

    #[test]
    fn setter_precedence_interface_mixin_class() {
        let mut r = resolver(
            ClassTable::new()
                .with(ClassDef::interface("I"))
                .with(ClassDef::mixin("M2"))
                .with(ClassDef::mixin("M").uses("M2"))
                .with(widget(ClassDef::class("C").implements("I").uses("M"))),
        );

        let store = r.store_mut();
        store.set_setter("I", "setFake", "interface");
        store.set_setter("M2", "setFake", "base-mixin");
        store.set_setter("M2", "setOnlyBase", 1);
        store.set_setter("M", "setFake", "mixin");

        let bp = r.get_unified("C").unwrap();
        assert_eq!(bp.setters()["setFake"], Value::from("mixin"));
        assert_eq!(bp.setters()["setOnlyBase"], Value::Int(1));

        r.store_mut().set_setter("C", "setFake", "class");
        let bp = r.get_unified("C").unwrap();
        assert_eq!(bp.setters()["setFake"], Value::from("class"));
    }

    #[test]
    fn parent_class_setter_not_overridden_by_inherited_interface() {
        let mut r = resolver(
            ClassTable::new()
                .with(ClassDef::interface("I"))
                .with(widget(ClassDef::class("P").implements("I")))
                .with(widget(ClassDef::class("C").extends("P"))),
        );
        r.store_mut().set_setter("I", "setFake", "interface");
        r.store_mut().set_setter("P", "setFake", "parent");

        let bp = r.get_unified("C").unwrap();
        assert_eq!(bp.setters()["setFake"], Value::from("parent"));
    }

    #[test]
    fn mutations_append_in_precedence_order() {
        let mut r = resolver(
            ClassTable::new()
                .with(ClassDef::interface("I"))
                .with(ClassDef::mixin("M"))
                .with(widget(ClassDef::class("P").implements("I")))
                .with(widget(ClassDef::class("C").extends("P").uses("M"))),
        );

        let store = r.store_mut();
        store.add_mutation("C", "own");
        store.add_mutation("M", "mixin");
        store.add_mutation("I", "interface");
        store.add_mutation("P", "parent");

        let bp = r.get_unified("C").unwrap();
        assert_eq!(
            bp.mutations(),
            &[
                Value::from("interface"),
                Value::from("parent"),
                Value::from("mixin"),
                Value::from("own"),
            ]
        );
    }

    #[test]
    fn store_writes_invalidate_cache() {
        let mut r = resolver(ClassTable::new().with(widget(ClassDef::class("A").param("x"))));
        assert!(r.get_unified("A").unwrap().params()[0].is_unresolved());

        r.store_mut().set_param("A", "x", 5);
        assert_eq!(param(&r.get_unified("A").unwrap(), "x"), UnifiedParam::Resolved(Value::Int(5)));
    }

    #[test]
    fn contextual_overrides_are_invisible_afterwards() {
        let r = resolver(ClassTable::new().with(widget(ClassDef::class("A").param("x"))));
        let before = r.get_unified("A").unwrap();

        let object = r
            .resolve(&Blueprint::new("A"), &[Blueprint::new("A").param("x", "ctx")])
            .unwrap();
        assert_eq!(object.downcast_ref::<Widget>().unwrap().args, vec![Value::from("ctx")]);

        let after = r.get_unified("A").unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(after.params()[0].is_unresolved());
    }

    #[test]
    fn contextual_overrides_reach_nested_lazy_construction() {
        let mut r = resolver(
            ClassTable::new()
                .with(widget(ClassDef::class("Inner").param("x")))
                .with(widget(ClassDef::class("Outer").param("inner"))),
        );
        r.store_mut()
            .set_param("Outer", "inner", Value::lazy(LazyNew::new(Blueprint::new("Inner"))));

        let object = r
            .resolve(&Blueprint::new("Outer"), &[Blueprint::new("Inner").param("x", 42)])
            .unwrap();
        let outer = object.downcast_ref::<Widget>().unwrap();
        let inner = outer.args[0].downcast::<Widget>().unwrap();
        assert_eq!(inner.args, vec![Value::Int(42)]);

        assert!(matches!(
            r.resolve(&Blueprint::new("Outer"), &[]),
            Err(TasmimError::MissingParam(_))
        ));
    }

    #[test]
    fn missing_param_names_type_and_param() {
        let r = resolver(ClassTable::new().with(widget(ClassDef::class("Needy").param("fake"))));
        let err = r.resolve(&Blueprint::new("Needy"), &[]).unwrap_err();
        match &err {
            TasmimError::MissingParam(e) => {
                assert_eq!(e.class, "Needy");
                assert_eq!(e.param, "fake");
            }
            other => panic!("Expected MissingParam, got: {other:?}"),
        }
        assert!(err.to_string().starts_with("Param missing: Needy::$fake"));
    }

    #[test]
    fn setter_without_method_fails_before_params_resolve() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut r = resolver(ClassTable::new().with(widget(ClassDef::class("A").param("x"))));
        r.store_mut().set_param(
            "A",
            "x",
            Value::lazy(crate::lazy::LazyCallable::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })),
        );
        r.store_mut().set_setter("A", "setMissing", 1);

        match r.resolve(&Blueprint::new("A"), &[]).unwrap_err() {
            TasmimError::SetterMethodNotFound(e) => assert_eq!(e.method, "setMissing"),
            other => panic!("Expected SetterMethodNotFound, got: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn non_mutation_step_is_rejected() {
        let mut r = resolver(ClassTable::new().with(widget(ClassDef::class("A"))));
        r.store_mut().add_mutation("A", "not callable");

        match r.resolve(&Blueprint::new("A"), &[]).unwrap_err() {
            TasmimError::MutationContractViolation { value } => assert!(value.contains("not callable")),
            other => panic!("Expected MutationContractViolation, got: {other:?}"),
        }
    }

    #[test]
    fn mutations_replace_the_working_object() {
        let mut r = resolver(ClassTable::new().with(widget(ClassDef::class("A"))));
        r.store_mut().add_mutation(
            "A",
            Value::mutate::<Widget>(|w| {
                w.args.push("touched".into());
                Ok(())
            }),
        );
        r.store_mut()
            .add_mutation("A", Value::mutation(|_| Ok(Box::new(String::from("replaced")))));

        let object = r.resolve(&Blueprint::new("A"), &[]).unwrap();
        assert_eq!(object.downcast_ref::<String>().unwrap(), "replaced");
    }

    #[test]
    fn abstract_types_cannot_be_instantiated() {
        let r = resolver(ClassTable::new().with(ClassDef::abstract_class("Shape")));
        assert!(matches!(
            r.resolve(&Blueprint::new("Shape"), &[]),
            Err(TasmimError::ConstructionFailed { .. })
        ));
    }

    #[test]
    fn auto_resolve_uses_type_map_then_lazy_new() {
        let table = ClassTable::new()
            .with(ClassDef::interface("Clock"))
            .with(widget(ClassDef::class("Engine")))
            .with(widget(
                ClassDef::class("Car")
                    .param(ParamDef::new("engine").with_type("Engine"))
                    .param(ParamDef::new("clock").with_type("Clock"))
                    .param(ParamDef::new("name").with_type("string")),
            ));

        let mut r = Resolver::new(Arc::new(table)).with_auto_resolve(true);
        let bp = r.get_unified("Car").unwrap();
        assert!(matches!(param(&bp, "engine"), UnifiedParam::Resolved(Value::Lazy(_))));
        assert!(param(&bp, "clock").is_unresolved());
        assert!(param(&bp, "name").is_unresolved());

        r.store_mut().set_type("Clock", "system-clock");
        let bp = r.get_unified("Car").unwrap();
        assert_eq!(param(&bp, "clock"), UnifiedParam::Resolved("system-clock".into()));
    }

    #[test]
    fn auto_resolve_off_leaves_typed_params_unresolved() {
        let r = resolver(
            ClassTable::new()
                .with(widget(ClassDef::class("Engine")))
                .with(widget(ClassDef::class("Car").param(ParamDef::new("engine").with_type("Engine")))),
        );

        assert!(param(&r.get_unified("Car").unwrap(), "engine").is_unresolved());
    }

    #[test]
    fn self_referencing_type_is_a_construction_cycle() {
        let table = ClassTable::new()
            .with(widget(ClassDef::class("Node").param(ParamDef::new("next").with_type("Node"))))
            .with(widget(ClassDef::class("Leaf")));
        let r = Resolver::new(Arc::new(table)).with_auto_resolve(true);

        for _ in 0..2 {
            match r.resolve(&Blueprint::new("Node"), &[]).unwrap_err() {
                TasmimError::CircularDependency(e) => {
                    assert_eq!(e.chain, vec!["Node", "Node"]);
                    assert_eq!(e.kind, CycleKind::Instance);
                }
                other => panic!("Expected CircularDependency, got: {other:?}"),
            }
        }

        assert!(r.resolve(&Blueprint::new("Leaf"), &[]).is_ok());
    }

    #[test]
    fn mutual_construction_cycle_names_the_chain() {
        let table = ClassTable::new()
            .with(widget(ClassDef::class("Egg").param(ParamDef::new("hen").with_type("Hen"))))
            .with(widget(ClassDef::class("Hen").param(ParamDef::new("egg").with_type("Egg"))));
        let r = Resolver::new(Arc::new(table)).with_auto_resolve(true);

        match r.resolve(&Blueprint::new("Egg"), &[]).unwrap_err() {
            TasmimError::CircularDependency(e) => assert_eq!(e.chain, vec!["Egg", "Hen", "Egg"]),
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn same_type_built_twice_side_by_side_is_not_a_cycle() {
        let table = ClassTable::new()
            .with(widget(ClassDef::class("Wheel")))
            .with(widget(
                ClassDef::class("Axle")
                    .param(ParamDef::new("left").with_type("Wheel"))
                    .param(ParamDef::new("right").with_type("Wheel")),
            ));
        let r = Resolver::new(Arc::new(table)).with_auto_resolve(true);

        let axle = r.resolve(&Blueprint::new("Axle"), &[]).unwrap();
        assert_eq!(axle.downcast_ref::<Widget>().unwrap().args.len(), 2);
    }

    #[test]
    fn unknown_type_fails_lookup() {
        let r = resolver(ClassTable::new());
        assert!(matches!(r.get_unified("Ghost"), Err(TasmimError::TypeLookup(_))));
    }
}
