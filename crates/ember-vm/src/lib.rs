//! # ember-vm
//!
//! The event pipeline: the nine ordered phases an inbound (or locally
//! authored) PDU passes through on its way into the durable store —
//! well-formedness, content hash, signature verification, duplicate
//! detection, ancestor fetch, authorization against claimed and resolved
//! state, state resolution itself, and atomic commit. [`pipeline::Pipeline`]
//! is the entry point; everything else in this crate is one phase (or one
//! piece of phase-9 support) of that sequence.

pub mod ancestors;
pub mod auth;
pub mod commit;
pub mod compose;
pub mod error;
pub mod inflight;
pub mod pdu_event;
pub mod pipeline;
pub mod retry;
pub mod room;
pub mod sig_check;
pub mod staging;
pub mod state_res;
pub mod subscribe;
pub mod wellformed;

pub use compose::{build_unsigned, compose, Draft, LOCAL_ROOM_VERSION};
pub use error::{VmError, VmResult};
pub use pipeline::{Origin, Pipeline};
pub use staging::StagingQueue;
pub use subscribe::CommitPublisher;
