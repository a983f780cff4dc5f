//! Job directory layout, metadata store, and task-status state machine.
//!
//! A job directory is owned by a single [`create_job`] call and thereafter
//! read-write by at most one scheduler instance (see [`job_meta`]/[`job_state`]).

pub mod error;
pub mod job_meta;
pub mod job_state;
pub mod json_store;
pub mod layout;
pub mod task;

pub use error::StoreError;
pub use job_meta::{create_job, load_job, JobMeta};
pub use job_state::JobState;
pub use task::{TaskKey, TaskMeta, TaskStatus};
