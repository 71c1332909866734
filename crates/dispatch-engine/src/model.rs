//! Records supplied by the surrounding application.
//!
//! These mirror the collaborator's job, leave and closed-period rows. The
//! engine only ever reads them; the one mutation it requests goes through
//! [`ScheduleSink`](crate::ports::ScheduleSink).

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::window::TimeWindow;

/// Lifecycle state of a job. Only `Cancelled` frees the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

/// A unit of field work booked for one or more technicians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: String,
    /// Technicians booked on the job. Duplicates collapse; order carries no
    /// meaning. Empty means nobody is assigned yet.
    #[serde(default)]
    pub assigned_technician_ids: BTreeSet<String>,
    /// Calendar day in the business timezone, or `None` when unscheduled.
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    /// Stored wall-clock start, usually `"HH:MM"` or `"HH:MM:SS"`. Missing or
    /// unparseable values fall back to the configured default start.
    #[serde(default)]
    pub scheduled_time: Option<String>,
    /// Planned length in hours. Missing, zero, negative or non-finite values
    /// fall back to the configured default duration.
    #[serde(default)]
    pub expected_duration_hours: Option<f64>,
    /// Lifecycle state (defaults to `scheduled`).
    #[serde(default)]
    pub status: JobStatus,
    /// Soft-delete marker; a deleted job is ignored everywhere.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Deleted and cancelled jobs never take part in conflict scans.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none() && self.status != JobStatus::Cancelled
    }

    pub fn shares_technician_with(&self, other: &Job) -> bool {
        !self
            .assigned_technician_ids
            .is_disjoint(&other.assigned_technician_ids)
    }

    pub fn has_technicians(&self) -> bool {
        !self.assigned_technician_ids.is_empty()
    }
}

/// Why a technician is away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Vacation,
    Sick,
    Personal,
    Training,
    Other,
}

impl std::fmt::Display for LeaveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LeaveType::Vacation => "vacation",
            LeaveType::Sick => "sick leave",
            LeaveType::Personal => "personal leave",
            LeaveType::Training => "training",
            LeaveType::Other => "leave",
        };
        f.write_str(label)
    }
}

/// A period one technician is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicianLeave {
    /// Unique leave record identifier.
    pub id: String,
    /// Technician on leave.
    pub technician_id: String,
    /// Start of the leave (inclusive).
    pub start_time: DateTime<Utc>,
    /// End of the leave (exclusive).
    pub end_time: DateTime<Utc>,
    /// Kind of leave, shown in conflict reasons.
    pub leave_type: LeaveType,
}

impl TechnicianLeave {
    /// The leave as a half-open window. May be invalid for malformed rows.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}

/// A company-wide closure (holiday, shutdown) that blocks every technician.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessClosedPeriod {
    /// Unique closure identifier.
    pub id: String,
    /// Display name, e.g. "Christmas Day".
    pub name: String,
    /// Start of the closure (inclusive).
    pub start_time: DateTime<Utc>,
    /// End of the closure (exclusive).
    pub end_time: DateTime<Utc>,
}

impl BusinessClosedPeriod {
    /// The closure as a half-open window. May be invalid for malformed rows.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}

/// Point-in-time copy of everything a scan reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    /// All jobs, including cancelled and deleted ones.
    #[serde(default)]
    pub jobs: Vec<Job>,
    /// Leave records for every technician.
    #[serde(default)]
    pub technician_leave: Vec<TechnicianLeave>,
    /// Business-wide closures.
    #[serde(default)]
    pub closed_periods: Vec<BusinessClosedPeriod>,
}

impl ScheduleSnapshot {
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }
}
