//! # Tasmim: Blueprint-based Dependency Injection for Rust
//!
//! Configure constructor params, setters and mutations per type, interface
//! or mixin; Tasmim unifies them over the type hierarchy into one
//! construction blueprint and builds objects and named services from it.
//!
//! ```rust
//! use tasmim::prelude::*;
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let table = ClassTable::new().with(
//!     ClassDef::class("Greeter")
//!         .param(ParamDef::new("greeting").with_default("hello"))
//!         .constructor(|args| Ok(Greeter { greeting: args.string(0)? })),
//! );
//!
//! let container = Container::builder().reflector(table).build().unwrap();
//! let greeter = container.new_instance_as::<Greeter>("Greeter").unwrap();
//! assert_eq!(greeter.greeting, "hello");
//! ```

pub use tasmim_container::*;
pub use tasmim_support::*;
