//! Detect collisions between a candidate job schedule and everything else on
//! the books.
//!
//! A scan runs three passes over an in-memory [`ScheduleSnapshot`]:
//!
//! 1. other live jobs on the same date sharing at least one technician,
//! 2. leave records of any assigned technician,
//! 3. business-wide closed periods, regardless of assignment.
//!
//! All windows are half-open, so back-to-back commitments are NOT conflicts.
//! Scanning is pure: no I/O, no mutation of the snapshot.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{Result, SchedulerError};
use crate::model::{BusinessClosedPeriod, Job, ScheduleSnapshot, TechnicianLeave};
use crate::window::{self, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    JobOverlap,
    LeaveOverlap,
    ClosedPeriodOverlap,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::JobOverlap => "job_overlap",
            ConflictKind::LeaveOverlap => "leave_overlap",
            ConflictKind::ClosedPeriodOverlap => "closed_period_overlap",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConflictKind::JobOverlap => "Job overlap",
            ConflictKind::LeaveOverlap => "Technician leave",
            ConflictKind::ClosedPeriodOverlap => "Business closed",
        };
        f.write_str(label)
    }
}

/// An advisory finding: the candidate schedule overlaps another commitment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    JobOverlap {
        job: Job,
        window: TimeWindow,
        shared_technician_ids: BTreeSet<String>,
        overlap_minutes: i64,
    },
    LeaveOverlap {
        leave: TechnicianLeave,
        overlap_minutes: i64,
    },
    ClosedPeriodOverlap {
        period: BusinessClosedPeriod,
        overlap_minutes: i64,
    },
}

impl Conflict {
    pub fn kind(&self) -> ConflictKind {
        match self {
            Conflict::JobOverlap { .. } => ConflictKind::JobOverlap,
            Conflict::LeaveOverlap { .. } => ConflictKind::LeaveOverlap,
            Conflict::ClosedPeriodOverlap { .. } => ConflictKind::ClosedPeriodOverlap,
        }
    }

    /// Id of the colliding record.
    pub fn entity_id(&self) -> &str {
        match self {
            Conflict::JobOverlap { job, .. } => &job.id,
            Conflict::LeaveOverlap { leave, .. } => &leave.id,
            Conflict::ClosedPeriodOverlap { period, .. } => &period.id,
        }
    }

    pub fn overlap_minutes(&self) -> i64 {
        match self {
            Conflict::JobOverlap {
                overlap_minutes, ..
            }
            | Conflict::LeaveOverlap {
                overlap_minutes, ..
            }
            | Conflict::ClosedPeriodOverlap {
                overlap_minutes, ..
            } => *overlap_minutes,
        }
    }

    /// Short human-readable explanation, with times shown in `tz`.
    pub fn reason(&self, tz: Tz) -> String {
        match self {
            Conflict::JobOverlap {
                job,
                window,
                shared_technician_ids,
                overlap_minutes,
            } => format!(
                "Job {} already booked {} to {} with {} ({} min overlap)",
                job.id,
                local(window.start, tz),
                local(window.end, tz),
                join(shared_technician_ids),
                overlap_minutes
            ),
            Conflict::LeaveOverlap {
                leave,
                overlap_minutes,
            } => format!(
                "Technician {} on {} from {} to {} ({} min overlap)",
                leave.technician_id,
                leave.leave_type,
                local(leave.start_time, tz),
                local(leave.end_time, tz),
                overlap_minutes
            ),
            Conflict::ClosedPeriodOverlap {
                period,
                overlap_minutes,
            } => format!(
                "Business closed for {} from {} to {} ({} min overlap)",
                period.name,
                local(period.start_time, tz),
                local(period.end_time, tz),
                overlap_minutes
            ),
        }
    }
}

fn local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

fn join(ids: &BTreeSet<String>) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// A fully resolved candidate schedule for one job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub date: NaiveDate,
    /// Minutes since local midnight.
    pub minutes: u32,
    pub duration_hours: f64,
    pub window: TimeWindow,
}

impl Candidate {
    fn build(
        job_id: &str,
        date: NaiveDate,
        minutes: u32,
        duration_hours: f64,
        tz: Tz,
    ) -> Result<Candidate> {
        let window = window::compute_window(date, minutes, duration_hours, tz).ok_or_else(|| {
            SchedulerError::Validation(format!(
                "job {job_id} duration of {duration_hours} h does not fit on the calendar"
            ))
        })?;
        Ok(Candidate {
            date,
            minutes,
            duration_hours,
            window,
        })
    }

    /// The same candidate moved back to the top of its hour, the slot a save
    /// actually writes.
    pub fn snapped_to_hour(&self, job_id: &str, tz: Tz) -> Result<Candidate> {
        let minutes = window::snap_to_hour(self.minutes);
        if minutes == self.minutes {
            return Ok(*self);
        }
        Candidate::build(job_id, self.date, minutes, self.duration_hours, tz)
    }
}

/// Resolve a candidate move of `job` to `target_date` / `target_time`.
///
/// Missing pieces fall back to the job's stored values, then to the configured
/// defaults. A candidate with no date at all, or with a target time that does
/// not parse, is rejected.
pub fn resolve_candidate(
    job: &Job,
    target_date: Option<NaiveDate>,
    target_time: Option<&str>,
    settings: &Settings,
) -> Result<Candidate> {
    let date = target_date.or(job.scheduled_date).ok_or_else(|| {
        SchedulerError::Validation(format!("job {} has no target date to schedule", job.id))
    })?;

    let minutes = match target_time {
        Some(text) => window::parse_time_of_day(text).ok_or_else(|| {
            SchedulerError::Validation(format!("invalid target time {text:?}, expected HH:MM"))
        })?,
        None => window::resolve_time_of_day(
            job.scheduled_time.as_deref(),
            settings.default_start_minutes,
        ),
    };

    let duration_hours =
        window::resolve_duration_hours(job.expected_duration_hours, settings.default_duration_hours);

    Candidate::build(&job.id, date, minutes, duration_hours, settings.timezone)
}

/// Window a job occupies according to its own stored schedule, or `None` when
/// it has no date or its duration runs off the calendar.
pub fn job_window(job: &Job, settings: &Settings) -> Option<TimeWindow> {
    let date = job.scheduled_date?;
    let minutes =
        window::resolve_time_of_day(job.scheduled_time.as_deref(), settings.default_start_minutes);
    let hours =
        window::resolve_duration_hours(job.expected_duration_hours, settings.default_duration_hours);
    let window = window::compute_window(date, minutes, hours, settings.timezone);
    if window.is_none() {
        warn!(job_id = %job.id, hours, "skipping job whose duration does not fit on the calendar");
    }
    window
}

/// Scan a candidate move of `job` against the snapshot.
///
/// Returns an unordered list; empty means no conflicts.
pub fn scan(
    job: &Job,
    target_date: Option<NaiveDate>,
    target_time: Option<&str>,
    snapshot: &ScheduleSnapshot,
    settings: &Settings,
) -> Result<Vec<Conflict>> {
    let candidate = resolve_candidate(job, target_date, target_time, settings)?;
    Ok(scan_candidate(job, &candidate, snapshot, settings))
}

/// Scan an already-resolved candidate.
pub fn scan_candidate(
    job: &Job,
    candidate: &Candidate,
    snapshot: &ScheduleSnapshot,
    settings: &Settings,
) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    conflicts.extend(job_overlaps(job, candidate, &snapshot.jobs, settings));
    conflicts.extend(leave_overlaps(job, &candidate.window, &snapshot.technician_leave));
    conflicts.extend(closed_period_overlaps(
        &candidate.window,
        &snapshot.closed_periods,
    ));

    debug!(
        job_id = %job.id,
        date = %candidate.date,
        time = %window::format_time_of_day(candidate.minutes),
        conflicts = conflicts.len(),
        "scanned reschedule candidate"
    );
    conflicts
}

fn job_overlaps(
    job: &Job,
    candidate: &Candidate,
    jobs: &[Job],
    settings: &Settings,
) -> Vec<Conflict> {
    if !job.has_technicians() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut conflicts = Vec::new();
    for other in jobs {
        if other.id == job.id
            || !other.is_live()
            || other.scheduled_date != Some(candidate.date)
            || !job.shares_technician_with(other)
        {
            continue;
        }
        let Some(other_window) = job_window(other, settings) else {
            continue;
        };
        // One entry per colliding job, however many technicians they share.
        if candidate.window.overlaps(&other_window) && seen.insert(other.id.as_str()) {
            conflicts.push(Conflict::JobOverlap {
                job: other.clone(),
                window: other_window,
                shared_technician_ids: job
                    .assigned_technician_ids
                    .intersection(&other.assigned_technician_ids)
                    .cloned()
                    .collect(),
                overlap_minutes: candidate.window.overlap_minutes(&other_window),
            });
        }
    }
    conflicts
}

fn leave_overlaps(
    job: &Job,
    job_window: &TimeWindow,
    leaves: &[TechnicianLeave],
) -> Vec<Conflict> {
    let mut seen = HashSet::new();
    let mut conflicts = Vec::new();
    for leave in leaves {
        if !job.assigned_technician_ids.contains(&leave.technician_id) {
            continue;
        }
        let leave_window = leave.window();
        if !leave_window.is_valid() {
            warn!(leave_id = %leave.id, "skipping leave record that ends before it starts");
            continue;
        }
        if job_window.overlaps(&leave_window) && seen.insert(leave.id.as_str()) {
            conflicts.push(Conflict::LeaveOverlap {
                leave: leave.clone(),
                overlap_minutes: job_window.overlap_minutes(&leave_window),
            });
        }
    }
    conflicts
}

fn closed_period_overlaps(
    job_window: &TimeWindow,
    periods: &[BusinessClosedPeriod],
) -> Vec<Conflict> {
    let mut seen = HashSet::new();
    let mut conflicts = Vec::new();
    for period in periods {
        let closed = period.window();
        if !closed.is_valid() {
            warn!(period_id = %period.id, "skipping closed period that ends before it starts");
            continue;
        }
        if job_window.overlaps(&closed) && seen.insert(period.id.as_str()) {
            conflicts.push(Conflict::ClosedPeriodOverlap {
                period: period.clone(),
                overlap_minutes: job_window.overlap_minutes(&closed),
            });
        }
    }
    conflicts
}
