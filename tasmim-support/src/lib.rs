//! # Tasmim Support
//!
//! Shared utilities for the Tasmim DI framework.
//!
//! This crate provides:
//! - Lineage rendering for error messages and log fields
//! - "Did you mean?" suggestions for unknown names

pub mod rendering;
