//! # ember-federation
//!
//! The Matrix server-server federation client: request signing and
//! verification (`X-Matrix`), server discovery (well-known / SRV / A/AAAA),
//! a per-destination connection pool with circuit breaking, and one method
//! per operation-table row.
//!
//! ## Key concepts
//!
//! - **Server keys** (`keys.rs`): this server's Ed25519 signing key, and the
//!   `/_matrix/key/v2/server` key document.
//! - **Request signing** (`auth.rs`): the `X-Matrix` Authorization scheme —
//!   every S2S request is signed with this server's key, the same way
//!   `ember-model::sign` signs events.
//! - **Discovery** (`discovery.rs`): resolves a bare server name to an HTTPS
//!   base URL via `.well-known/matrix/server`, SRV, or A/AAAA fallback.
//! - **Connection pool** (`pool.rs`): per-destination `prelink`/`avail`/
//!   `linked`/`errant`/`exists` state and the circuit breaker.
//! - **Client** (`client.rs`): the signed-request core plus one method per
//!   federation operation.

pub mod auth;
pub mod client;
pub mod discovery;
pub mod error;
pub mod key_manager;
pub mod keys;
pub mod pool;
pub mod retry;
pub mod types;

pub use client::FederationClient;
pub use error::{FederationError, FederationResult};
pub use key_manager::KeyManager;
pub use keys::{ServerKeyDocument, ServerSigningKey};
pub use types::Transaction;
