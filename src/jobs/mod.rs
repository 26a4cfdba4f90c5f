//! Job state and the concurrent registry that owns it.
//!
//! The registry is the single source of truth polled by clients. Workers
//! never hold a reference to a record; they send [`JobUpdate`]s by id.

mod registry;
mod types;

pub use registry::JobRegistry;
pub use types::{JobRecord, JobState, JobUpdate};
