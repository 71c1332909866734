//! Two-stage confirmation workflow for moving a job.
//!
//! ```text
//! Idle --request--> PendingChange --scan--> PendingConfirm
//!                                       \-> PendingConfirmWithConflicts --acknowledge--> (confirmable)
//! Pending* --confirm--> Applying --ok--> Idle
//!                                \-err-> back to the same Pending* state
//! Pending* --cancel--> Idle
//! ```
//!
//! `PendingChange` and the scan happen inside [`RescheduleController::request`],
//! so callers only ever observe the resulting `Pending*` phase. The controller
//! holds no rendering state; a UI reads [`PendingReschedule`] to draw the
//! summary, the conflict list and the enabled/disabled confirm action.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::conflict::{self, Candidate, Conflict};
use crate::error::{Result, SchedulerError};
use crate::model::{Job, ScheduleSnapshot};
use crate::ports::ScheduleSink;
use crate::window;

/// Observable controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    PendingConfirm,
    PendingConfirmWithConflicts,
    Applying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::PendingConfirm => "awaiting confirmation",
            Phase::PendingConfirmWithConflicts => "awaiting confirmation of conflicts",
            Phase::Applying => "applying",
        };
        f.write_str(label)
    }
}

/// Old and new schedule of the job being moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub job_id: String,
    pub from_date: Option<NaiveDate>,
    pub from_time: Option<String>,
    pub to_date: NaiveDate,
    /// Already snapped to the hour; this is what will be saved.
    pub to_time: String,
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job {}: ", self.job_id)?;
        match (&self.from_date, &self.from_time) {
            (Some(date), Some(time)) => write!(f, "{date} {time}")?,
            (Some(date), None) => write!(f, "{date}")?,
            _ => f.write_str("unscheduled")?,
        }
        write!(f, " -> {} {}", self.to_date, self.to_time)
    }
}

/// A scanned change waiting for the user.
#[derive(Debug, Clone)]
pub struct PendingReschedule {
    job: Job,
    candidate: Candidate,
    conflicts: Vec<Conflict>,
    acknowledged: bool,
    notify: bool,
    last_error: Option<String>,
}

impl PendingReschedule {
    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    /// Conflicts found when the change was requested. Not refreshed after a
    /// failed save.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn notify(&self) -> bool {
        self.notify
    }

    /// The notify toggle is only offered when someone would receive it.
    pub fn notify_available(&self) -> bool {
        self.job.has_technicians()
    }

    /// Error from the most recent failed save, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn phase(&self) -> Phase {
        if self.has_conflicts() {
            Phase::PendingConfirmWithConflicts
        } else {
            Phase::PendingConfirm
        }
    }

    fn snapped_minutes(&self) -> u32 {
        window::snap_to_hour(self.candidate.minutes)
    }

    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            job_id: self.job.id.clone(),
            from_date: self.job.scheduled_date,
            from_time: self
                .job
                .scheduled_time
                .as_deref()
                .and_then(window::parse_time_of_day)
                .map(window::format_time_of_day),
            to_date: self.candidate.date,
            to_time: window::format_time_of_day(self.snapped_minutes()),
        }
    }

    /// True when saving would change the job's date or time.
    ///
    /// Compares against the snapped time, since that is the value persisted.
    pub fn is_change(&self) -> bool {
        let current_minutes = self
            .job
            .scheduled_time
            .as_deref()
            .and_then(window::parse_time_of_day);
        self.job.scheduled_date != Some(self.candidate.date)
            || current_minutes != Some(self.snapped_minutes())
    }

    /// Whether the confirm action is enabled.
    pub fn can_confirm(&self) -> bool {
        self.check_confirmable().is_ok()
    }

    fn check_confirmable(&self) -> Result<()> {
        if !self.is_change() {
            return Err(SchedulerError::NoChange);
        }
        if self.has_conflicts() && !self.acknowledged {
            return Err(SchedulerError::AcknowledgementRequired {
                count: self.conflicts.len(),
            });
        }
        Ok(())
    }
}

/// Result of the best-effort technician notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum NotificationOutcome {
    NotRequested,
    Sent,
    Failed(String),
}

/// What a successful confirm saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub job_id: String,
    pub date: NaiveDate,
    pub time: String,
    /// Number of acknowledged conflicts the change was saved over.
    pub conflicts_overridden: usize,
    pub notification: NotificationOutcome,
}

#[derive(Debug)]
enum State {
    Idle,
    Pending(PendingReschedule),
    Applying,
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Idle => Phase::Idle,
            State::Pending(pending) => pending.phase(),
            State::Applying => Phase::Applying,
        }
    }
}

/// Puts the pending change back if an apply does not complete, including when
/// the confirm future is dropped mid-save.
struct ApplyGuard<'a> {
    state: &'a mut State,
    pending: Option<PendingReschedule>,
}

impl ApplyGuard<'_> {
    fn complete(mut self) {
        self.pending = None;
        *self.state = State::Idle;
    }

    fn fail(mut self, message: String) {
        if let Some(mut pending) = self.pending.take() {
            pending.last_error = Some(message);
            *self.state = State::Pending(pending);
        }
    }
}

impl Drop for ApplyGuard<'_> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            *self.state = State::Pending(pending);
        }
    }
}

/// Drives one reschedule at a time from request to saved change.
pub struct RescheduleController<S> {
    sink: S,
    settings: Settings,
    state: State,
}

impl<S: ScheduleSink> RescheduleController<S> {
    pub fn new(sink: S, settings: Settings) -> Self {
        Self {
            sink,
            settings,
            state: State::Idle,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn pending(&self) -> Option<&PendingReschedule> {
        match &self.state {
            State::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn can_confirm(&self) -> bool {
        self.pending().is_some_and(PendingReschedule::can_confirm)
    }

    /// Start moving `job` to `target_date` / `target_time` and scan the move.
    ///
    /// Replaces any change already pending. On a validation error the
    /// controller stays where it was.
    pub fn request(
        &mut self,
        job: &Job,
        target_date: Option<NaiveDate>,
        target_time: Option<&str>,
        snapshot: &ScheduleSnapshot,
    ) -> Result<Phase> {
        if matches!(self.state, State::Applying) {
            return Err(SchedulerError::InvalidTransition {
                action: "request a reschedule",
                phase: Phase::Applying,
            });
        }

        // Scan the slot confirm will write, not the one typed in.
        let candidate = conflict::resolve_candidate(job, target_date, target_time, &self.settings)?
            .snapped_to_hour(&job.id, self.settings.timezone)?;
        debug!(job_id = %job.id, date = %candidate.date, "pending change, scanning");
        let conflicts = conflict::scan_candidate(job, &candidate, snapshot, &self.settings);

        let pending = PendingReschedule {
            job: job.clone(),
            candidate,
            conflicts,
            acknowledged: false,
            notify: false,
            last_error: None,
        };
        let phase = pending.phase();
        self.state = State::Pending(pending);
        Ok(phase)
    }

    /// "Proceed Anyway": accept the listed conflicts.
    pub fn acknowledge_conflicts(&mut self) -> Result<()> {
        let phase = self.phase();
        match &mut self.state {
            State::Pending(pending) if pending.has_conflicts() => {
                pending.acknowledged = true;
                Ok(())
            }
            _ => Err(SchedulerError::InvalidTransition {
                action: "acknowledge conflicts",
                phase,
            }),
        }
    }

    /// Toggle the technician notification for the pending change.
    pub fn set_notify(&mut self, notify: bool) -> Result<()> {
        let phase = self.phase();
        let State::Pending(pending) = &mut self.state else {
            return Err(SchedulerError::InvalidTransition {
                action: "change notification",
                phase,
            });
        };
        if notify && !pending.notify_available() {
            return Err(SchedulerError::Validation(format!(
                "job {} has no assigned technicians to notify",
                pending.job.id
            )));
        }
        pending.notify = notify;
        Ok(())
    }

    /// Drop the pending change without side effects.
    pub fn cancel(&mut self) -> Result<()> {
        if !matches!(self.state, State::Pending(_)) {
            return Err(SchedulerError::InvalidTransition {
                action: "cancel",
                phase: self.phase(),
            });
        }
        debug!("reschedule cancelled");
        self.state = State::Idle;
        Ok(())
    }

    /// Save the pending change.
    ///
    /// Issues exactly one schedule update with the time snapped to the hour.
    /// On failure the controller returns to the pending phase it came from,
    /// with conflicts and acknowledgement kept and the error recorded.
    pub async fn confirm(&mut self) -> Result<ApplyOutcome> {
        let pending = match std::mem::replace(&mut self.state, State::Applying) {
            State::Pending(pending) => pending,
            other => {
                let phase = other.phase();
                self.state = other;
                return Err(SchedulerError::InvalidTransition {
                    action: "confirm",
                    phase,
                });
            }
        };
        if let Err(e) = pending.check_confirmable() {
            self.state = State::Pending(pending);
            return Err(e);
        }

        let job_id = pending.job.id.clone();
        let date = pending.candidate.date;
        let time = window::format_time_of_day(pending.snapped_minutes());
        let notify = pending.notify;
        let conflicts_overridden = pending.conflicts.len();

        let guard = ApplyGuard {
            state: &mut self.state,
            pending: Some(pending),
        };

        let saved = match tokio::time::timeout(
            self.settings.persist_timeout,
            self.sink.update_job_schedule(&job_id, date, &time),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!(
                "timed out after {} ms",
                self.settings.persist_timeout.as_millis()
            )),
        };

        if let Err(message) = saved {
            warn!(job_id = %job_id, error = %message, "schedule update failed");
            guard.fail(message.clone());
            return Err(SchedulerError::Persistence { job_id, message });
        }
        guard.complete();
        info!(
            job_id = %job_id,
            date = %date,
            time = %time,
            conflicts_overridden,
            "job rescheduled"
        );

        let notification = if notify {
            self.notify_technicians(&job_id, date, &time).await
        } else {
            NotificationOutcome::NotRequested
        };

        Ok(ApplyOutcome {
            job_id,
            date,
            time,
            conflicts_overridden,
            notification,
        })
    }

    async fn notify_technicians(&self, job_id: &str, date: NaiveDate, time: &str) -> NotificationOutcome {
        let message = format!("Job {job_id} has been rescheduled to {date} at {time}");
        let result = match tokio::time::timeout(
            self.settings.notify_timeout,
            self.sink.notify_assigned_technicians(job_id, &message),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!(
                "timed out after {} ms",
                self.settings.notify_timeout.as_millis()
            )),
        };

        match result {
            Ok(()) => NotificationOutcome::Sent,
            Err(message) => {
                let err = SchedulerError::Notification {
                    job_id: job_id.to_string(),
                    message: message.clone(),
                };
                warn!("{err}");
                NotificationOutcome::Failed(message)
            }
        }
    }
}
