//! Provider trait: a module of related configuration.
//!
//! Providers group the services, params, setters and mutations of one
//! part of an application. The builder runs them in two passes:
//!
//! ```text
//! define(&mut Container)   every provider, container unlocked
//!        │
//!      lock()
//!        │
//! modify(&Container)       every provider, services may be fetched
//! ```
//!
//! # Examples
//! ```
//! use tasmim_container::prelude::*;
//!
//! struct MailProvider;
//!
//! impl Provider for MailProvider {
//!     fn define(&self, container: &mut Container) -> Result<()> {
//!         container.config_mut()?.set_param("Mailer", "host", "smtp.local");
//!         container.set("mailer", Container::lazy_new("Mailer"))
//!     }
//! }
//! ```

use crate::container::Container;
use crate::error::Result;

/// A module that configures a container.
pub trait Provider: Send + Sync {
    /// Registers services and configuration.
    ///
    /// Called once, before the container is locked.
    fn define(&self, container: &mut Container) -> Result<()>;

    /// Runs after every provider has defined its part and the container
    /// is locked. Services can be fetched here.
    fn modify(&self, container: &Container) -> Result<()> {
        let _ = container;
        Ok(())
    }

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
