//! State module for tracking job progress
//!
//! # Components
//!
//! - `JobStatus`: lifecycle status persisted on the job record
//! - `JobState`: the controller's view of a running job, enforcing legal transitions
//! - `JobStats`: aggregate counters written when a job terminates

mod job_state;

// Re-export main types
pub use job_state::{JobState, JobStats, JobStatus, StateError};
