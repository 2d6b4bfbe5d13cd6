//! # ember-head
//!
//! Per-room frontier tracker: the set of committed events with no committed
//! child, used to derive `prev_events` for new events and to detect where a
//! room's DAG currently terminates.

pub mod error;
pub mod tracker;

pub use error::{HeadError, HeadResult};
pub use tracker::HeadTracker;
