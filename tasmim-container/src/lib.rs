//! Core container implementation for Tasmim.
//!
//! The [`resolver`] computes unified construction blueprints over a type
//! hierarchy; the [`container`] adds named services, locking and providers.

pub mod blueprint;
pub mod container;
pub mod error;
pub mod introspect;
pub mod key;
pub mod lazy;
pub mod provider;
pub mod reflect;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod value;

pub use blueprint::{Blueprint, UnifiedParam};
pub use container::{Container, ContainerBuilder, Factory, prelude};
pub use error::{Result, TasmimError};
pub use key::ParamKey;
pub use provider::Provider;
pub use reflect::{ClassDef, ClassRegistration, ClassTable, Reflector};
pub use resolver::Resolver;
pub use value::Value;

/// Re-exported for `inventory::submit!` class registrations.
pub use inventory;
