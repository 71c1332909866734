//! Boundaries to the surrounding application.
//!
//! The application owns jobs, leave and closed periods. It serves snapshots
//! through [`ScheduleSource`] and accepts the single schedule mutation (plus the
//! optional notification) through [`ScheduleSink`]. Implementations report
//! failures as `anyhow::Error`; the engine maps them onto [`SchedulerError`].

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::model::{BusinessClosedPeriod, Job, ScheduleSnapshot, TechnicianLeave};

/// Read-only access to the records a scan needs.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn list_jobs(&self) -> anyhow::Result<Vec<Job>>;
    async fn list_technician_leave(&self) -> anyhow::Result<Vec<TechnicianLeave>>;
    async fn list_business_closed_periods(&self) -> anyhow::Result<Vec<BusinessClosedPeriod>>;
}

/// Writes issued by a confirmed reschedule.
#[async_trait]
pub trait ScheduleSink: Send + Sync {
    /// Set `scheduled_date` / `scheduled_time` on one job. Must be atomic for
    /// that record.
    async fn update_job_schedule(&self, job_id: &str, date: NaiveDate, time: &str)
        -> anyhow::Result<()>;

    /// Tell the job's assigned technicians about the change. Best effort.
    async fn notify_assigned_technicians(&self, job_id: &str, message: &str) -> anyhow::Result<()>;
}

/// Load all three record lists into a [`ScheduleSnapshot`].
///
/// The three fetches are polled concurrently on the current task.
pub async fn fetch_snapshot<S>(source: &S) -> Result<ScheduleSnapshot>
where
    S: ScheduleSource + ?Sized,
{
    let (jobs, technician_leave, closed_periods) = tokio::try_join!(
        source.list_jobs(),
        source.list_technician_leave(),
        source.list_business_closed_periods(),
    )
    .map_err(|e| SchedulerError::Source(format!("{e:#}")))?;

    debug!(
        jobs = jobs.len(),
        leave = technician_leave.len(),
        closed_periods = closed_periods.len(),
        "loaded schedule snapshot"
    );

    Ok(ScheduleSnapshot {
        jobs,
        technician_leave,
        closed_periods,
    })
}
