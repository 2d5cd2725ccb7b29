//! Cached per-type introspection.
//!
//! The [`Introspector`] turns raw [`ClassDef`]s from a [`Reflector`] into
//! [`TypeDescriptor`]s: ancestry, the transitive set of interfaces and
//! mixins, and the flattened method table. Results are cached per name.
//!
//! # Ordering
//! Interfaces and mixins are listed most-base first: whatever the parent
//! contributes comes before what the type itself adds, and a composed
//! mixin (or extended interface) comes before the one composing it. Later
//! entries are more specific.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tasmim_support::rendering::{render_chain, suggest_similar};
use tracing::{debug, trace};

use crate::error::{Result, TasmimError, TypeLookupError};
use crate::reflect::{ClassDef, ConstructorFn, ParamDef, ReflectError, Reflector, SetterFn, TypeKind};

/// Fully expanded description of one type.
#[derive(Clone)]
pub struct TypeDescriptor {
    def: Arc<ClassDef>,
    /// Parent first, root last
    ancestors: Vec<String>,
    interfaces: Vec<String>,
    mixins: Vec<String>,
    setters: HashMap<String, SetterFn>,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn kind(&self) -> TypeKind {
        self.def.kind()
    }

    pub fn parent(&self) -> Option<&str> {
        self.def.parent()
    }

    /// Parent, grandparent, ... up to the root.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Ordered constructor parameters.
    pub fn params(&self) -> &[ParamDef] {
        self.def.params()
    }

    /// Every interface implemented directly or through ancestors and
    /// super-interfaces, most-base first.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Every mixin composed directly, through ancestors, or through other
    /// mixins, most-base first.
    pub fn mixins(&self) -> &[String] {
        &self.mixins
    }

    /// The method named `method`, declared here or inherited. `None` when
    /// the type has no such method.
    pub fn setter(&self, method: &str) -> Option<&SetterFn> {
        self.setters.get(method)
    }

    pub fn constructor(&self) -> Option<&ConstructorFn> {
        self.def.constructor_fn()
    }

    pub fn is_instantiable(&self) -> bool {
        self.def.is_instantiable()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("ancestors", &self.ancestors)
            .field("interfaces", &self.interfaces)
            .field("mixins", &self.mixins)
            .field("params", &self.params().len())
            .finish()
    }
}

/// Wraps a [`Reflector`] and caches [`TypeDescriptor`]s.
pub struct Introspector {
    reflector: Arc<dyn Reflector>,
    cache: DashMap<String, Arc<TypeDescriptor>>,
}

impl Introspector {
    pub fn new(reflector: Arc<dyn Reflector>) -> Self {
        Self {
            reflector,
            cache: DashMap::new(),
        }
    }

    /// Returns the descriptor for `name`, computing it on first use.
    ///
    /// # Errors
    /// [`TasmimError::TypeLookup`] if the type, one of its ancestors, or one
    /// of its interfaces or mixins is unknown, or if its parent chain loops.
    pub fn describe(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        self.describe_guarded(name, &mut Vec::new())
    }

    /// Drops every cached descriptor.
    pub fn clear(&self) {
        self.cache.clear();
    }

    fn describe_guarded(&self, name: &str, stack: &mut Vec<String>) -> Result<Arc<TypeDescriptor>> {
        if let Some(cached) = self.cache.get(name) {
            trace!(class = name, "Descriptor cache hit");
            return Ok(Arc::clone(cached.value()));
        }

        if stack.iter().any(|seen| seen == name) {
            stack.push(name.to_string());
            return Err(self.lookup_error(
                name,
                ReflectError::Other(format!("cyclic inheritance: {}", render_chain(stack.as_slice()))),
            ));
        }

        let def = self.reflect(name)?;

        let parent = match def.parent() {
            Some(parent) => {
                stack.push(name.to_string());
                let described = self.describe_guarded(parent, stack);
                stack.pop();
                Some(described?)
            }
            None => None,
        };

        let mut descriptor = match &parent {
            Some(parent) => TypeDescriptor {
                def: Arc::clone(&def),
                ancestors: std::iter::once(parent.name().to_string())
                    .chain(parent.ancestors.iter().cloned())
                    .collect(),
                interfaces: parent.interfaces.clone(),
                mixins: parent.mixins.clone(),
                setters: parent.setters.clone(),
            },
            None => TypeDescriptor {
                def: Arc::clone(&def),
                ancestors: Vec::new(),
                interfaces: Vec::new(),
                mixins: Vec::new(),
                setters: HashMap::new(),
            },
        };

        let mut seen: HashSet<String> = descriptor.interfaces.iter().cloned().collect();
        for interface in def.interfaces() {
            self.expand(interface, &mut seen, &mut descriptor.interfaces, ClassDef::interfaces)?;
        }

        let inherited_mixins = descriptor.mixins.len();
        let mut seen: HashSet<String> = descriptor.mixins.iter().cloned().collect();
        for mixin in def.mixins() {
            self.expand(mixin, &mut seen, &mut descriptor.mixins, ClassDef::mixins)?;
        }

        // Methods from newly composed mixins, then the type's own.
        let added: Vec<String> = descriptor.mixins[inherited_mixins..].to_vec();
        for mixin in &added {
            let mixin_def = self.reflect(mixin)?;
            absorb_methods(&mut descriptor, &mixin_def);
        }
        absorb_methods(&mut descriptor, &def);

        let mut lineage = vec![name.to_string()];
        lineage.extend(descriptor.ancestors.iter().cloned());
        debug!(
            class = name,
            kind = %def.kind(),
            lineage = %render_chain(&lineage),
            interfaces = descriptor.interfaces.len(),
            mixins = descriptor.mixins.len(),
            "Described type"
        );

        let descriptor = Arc::new(descriptor);
        self.cache.insert(name.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Post-order expansion of an interface or mixin graph.
    ///
    /// Tolerates cycles in descriptor data: a name is only entered once.
    fn expand(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        out: &mut Vec<String>,
        edges: fn(&ClassDef) -> &[String],
    ) -> Result<()> {
        if !seen.insert(name.to_string()) {
            return Ok(());
        }

        let def = self.reflect(name)?;
        for next in edges(&def) {
            self.expand(next, seen, out, edges)?;
        }

        out.push(name.to_string());
        Ok(())
    }

    fn reflect(&self, name: &str) -> Result<Arc<ClassDef>> {
        self.reflector
            .reflect(name)
            .map_err(|err| self.lookup_error(name, err))
    }

    fn lookup_error(&self, name: &str, source: ReflectError) -> TasmimError {
        let known = self.reflector.known_types();
        let known: Vec<&str> = known.iter().map(String::as_str).collect();

        TasmimError::TypeLookup(TypeLookupError {
            name: name.to_string(),
            source,
            suggestions: suggest_similar(name, &known, 3),
        })
    }
}

fn absorb_methods(descriptor: &mut TypeDescriptor, def: &ClassDef) {
    for (method, setter) in def.own_methods() {
        descriptor.setters.insert(method.to_string(), Arc::clone(setter));
    }
}

impl fmt::Debug for Introspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Introspector")
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::ClassTable;
    use crate::value::Value;

    struct Widget;

    fn introspector(table: ClassTable) -> Introspector {
        Introspector::new(Arc::new(table))
    }

    fn hierarchy() -> ClassTable {
        ClassTable::new()
            .with(ClassDef::interface("Base"))
            .with(ClassDef::interface("Named").implements("Base"))
            .with(ClassDef::interface("Sized"))
            .with(ClassDef::mixin("Inner"))
            .with(ClassDef::mixin("Outer").uses("Inner"))
            .with(ClassDef::mixin("Extra"))
            .with(
                ClassDef::class("Parent")
                    .implements("Named")
                    .uses("Outer")
                    .param("foo"),
            )
            .with(
                ClassDef::class("Child")
                    .extends("Parent")
                    .implements("Sized")
                    .uses("Extra")
                    .param("foo")
                    .param("bar")
                    .constructor(|_| Ok(Widget))
                    .setter("setFake", |_: &mut Widget, _: Value| Ok(())),
            )
            .with(ClassDef::class("GrandChild").extends("Child"))
    }

    #[test]
    fn describes_params_in_order() {
        let intro = introspector(hierarchy());
        let child = intro.describe("Child").unwrap();
        let names: Vec<_> = child.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["foo", "bar"]);
        assert!(child.is_instantiable());
    }

    #[test]
    fn interfaces_are_transitive_most_base_first() {
        let intro = introspector(hierarchy());
        let child = intro.describe("Child").unwrap();
        assert_eq!(child.interfaces(), &["Base", "Named", "Sized"]);
    }

    #[test]
    fn mixins_are_transitive_most_base_first() {
        let intro = introspector(hierarchy());
        let child = intro.describe("Child").unwrap();
        assert_eq!(child.mixins(), &["Inner", "Outer", "Extra"]);
    }

    #[test]
    fn ancestors_and_inherited_methods() {
        let intro = introspector(hierarchy());
        let grandchild = intro.describe("GrandChild").unwrap();
        assert_eq!(grandchild.ancestors(), &["Child", "Parent"]);
        assert!(grandchild.setter("setFake").is_some());
        assert!(grandchild.setter("setOther").is_none());
    }

    #[test]
    fn repeated_describe_hits_cache() {
        let intro = introspector(hierarchy());
        let a = intro.describe("Child").unwrap();
        let b = intro.describe("Child").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_type_suggests_close_names() {
        let intro = introspector(hierarchy());
        match intro.describe("Childx").unwrap_err() {
            TasmimError::TypeLookup(err) => {
                assert_eq!(err.name, "Childx");
                assert!(err.suggestions.iter().any(|s| s == "Child"));
            }
            other => panic!("Expected TypeLookup, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_mixin_fails_lookup() {
        let intro = introspector(ClassTable::new().with(ClassDef::class("A").uses("Ghost")));
        assert!(matches!(intro.describe("A"), Err(TasmimError::TypeLookup(_))));
    }

    #[test]
    fn mixin_cycles_are_tolerated() {
        let table = ClassTable::new()
            .with(ClassDef::mixin("M1").uses("M2"))
            .with(ClassDef::mixin("M2").uses("M1"))
            .with(ClassDef::class("C").uses("M1"));

        let intro = introspector(table);
        let c = intro.describe("C").unwrap();
        assert_eq!(c.mixins(), &["M2", "M1"]);
    }

    #[test]
    fn inheritance_cycle_is_an_error() {
        let table = ClassTable::new()
            .with(ClassDef::class("A").extends("B"))
            .with(ClassDef::class("B").extends("A"));

        let intro = introspector(table);
        match intro.describe("A").unwrap_err() {
            TasmimError::TypeLookup(err) => assert!(err.source.to_string().contains("cyclic")),
            other => panic!("Expected TypeLookup, got: {other:?}"),
        }
    }

    struct Offline;

    impl Reflector for Offline {
        fn reflect(&self, _name: &str) -> std::result::Result<Arc<ClassDef>, ReflectError> {
            Err(ReflectError::Other("metadata store offline".into()))
        }
    }

    #[test]
    fn lookup_error_keeps_reflector_failure_as_source() {
        let intro = Introspector::new(Arc::new(Offline));
        let err = intro.describe("Mailer").unwrap_err();

        assert!(format!("{err}").contains("metadata store offline"));
        let source = std::error::Error::source(&err).expect("lookup error has a source");
        assert!(matches!(
            source.downcast_ref::<ReflectError>(),
            Some(ReflectError::Other(reason)) if reason == "metadata store offline"
        ));
    }
}
