//! Error types for dispatch-engine operations.

use thiserror::Error;

use crate::reschedule::Phase;

#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The candidate change cannot be resolved into a concrete schedule.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The collaborator rejected the schedule update, or it timed out.
    #[error("Failed to save schedule for job {job_id}: {message}")]
    Persistence { job_id: String, message: String },

    /// The best-effort technician notification failed.
    #[error("Failed to notify technicians for job {job_id}: {message}")]
    Notification { job_id: String, message: String },

    #[error("Reschedule does not change the job's date or time")]
    NoChange,

    #[error("{count} conflict(s) must be acknowledged before confirming")]
    AcknowledgementRequired { count: usize },

    #[error("Cannot {action} while {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Fetching the schedule snapshot from the collaborator failed.
    #[error("Failed to load schedule data: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
