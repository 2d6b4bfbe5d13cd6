//! API route modules.

pub mod client;
pub mod federation;
pub mod health;
