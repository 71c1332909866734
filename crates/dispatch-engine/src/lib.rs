//! # dispatch-engine
//!
//! Conflict detection and confirmed rescheduling for field-service jobs.
//!
//! When office staff move a job to a new date or time, the engine checks the
//! move against the rest of the schedule and walks the change through an
//! explicit confirmation step before anything is saved. A move conflicts when
//! it overlaps another job sharing a technician, an assigned technician's
//! leave, or a business-wide closed period. Conflicts are advisory: the user
//! may proceed anyway, but only after acknowledging them.
//!
//! ## Modules
//!
//! - [`window`] — (date, time, duration) → absolute half-open intervals
//! - [`conflict`] — Scan a candidate move for job, leave and closure overlaps
//! - [`reschedule`] — Confirmation state machine and the final save
//! - [`availability`] — Free slots for a job's technicians on a given day
//! - [`ports`] — Traits the surrounding application implements
//! - [`model`] — Job, leave and closed-period records
//! - [`config`] — Scheduler configuration
//! - [`error`] — Error types

pub mod availability;
pub mod config;
pub mod conflict;
pub mod error;
pub mod model;
pub mod ports;
pub mod reschedule;
pub mod window;

pub use availability::{find_free_slots, first_free_slot, suggest_start_times, FreeSlot};
pub use config::{SchedulerConfig, Settings};
pub use conflict::{scan, Conflict, ConflictKind};
pub use error::SchedulerError;
pub use model::{BusinessClosedPeriod, Job, JobStatus, LeaveType, ScheduleSnapshot, TechnicianLeave};
pub use ports::{fetch_snapshot, ScheduleSink, ScheduleSource};
pub use reschedule::{ApplyOutcome, NotificationOutcome, Phase, RescheduleController};
pub use window::TimeWindow;
