//! # ember-common
//!
//! Shared config, error taxonomy, context object, and logging/metrics glue
//! used across every `ember` crate. This is the foundation layer — no
//! business logic, just primitives and contracts.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;

