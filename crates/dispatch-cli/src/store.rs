//! A schedule snapshot kept in a JSON file.
//!
//! Serves the engine's ports for the CLI. Schedule updates rewrite the whole
//! file through a temporary sibling and a rename, so a failed write leaves the
//! original untouched.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use dispatch_engine::model::{BusinessClosedPeriod, Job, ScheduleSnapshot, TechnicianLeave};
use dispatch_engine::{ScheduleSink, ScheduleSource};
use tracing::info;

pub struct JsonFileStore {
    path: PathBuf,
    snapshot: Mutex<ScheduleSnapshot>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        let snapshot: ScheduleSnapshot = serde_json::from_str(&json)
            .with_context(|| format!("Invalid snapshot JSON: {}", path.display()))?;
        Ok(Self {
            path,
            snapshot: Mutex::new(snapshot),
        })
    }

    fn read(&self) -> Result<ScheduleSnapshot> {
        self.snapshot
            .lock()
            .map(|snapshot| snapshot.clone())
            .map_err(|_| anyhow!("snapshot lock poisoned"))
    }

    fn persist(&self, snapshot: &ScheduleSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace file: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleSource for JsonFileStore {
    async fn list_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.read()?.jobs)
    }

    async fn list_technician_leave(&self) -> Result<Vec<TechnicianLeave>> {
        Ok(self.read()?.technician_leave)
    }

    async fn list_business_closed_periods(&self) -> Result<Vec<BusinessClosedPeriod>> {
        Ok(self.read()?.closed_periods)
    }
}

#[async_trait]
impl ScheduleSink for JsonFileStore {
    async fn update_job_schedule(&self, job_id: &str, date: NaiveDate, time: &str) -> Result<()> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| anyhow!("snapshot lock poisoned"))?;

        let mut updated = guard.clone();
        let job = updated
            .jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or_else(|| anyhow!("job {job_id} no longer exists"))?;
        job.scheduled_date = Some(date);
        job.scheduled_time = Some(time.to_string());

        self.persist(&updated)?;
        *guard = updated;
        Ok(())
    }

    async fn notify_assigned_technicians(&self, job_id: &str, message: &str) -> Result<()> {
        let snapshot = self.read()?;
        let job = snapshot
            .job(job_id)
            .ok_or_else(|| anyhow!("job {job_id} no longer exists"))?;
        // No delivery channel behind a file; the log line is the notification.
        info!(
            job_id = %job_id,
            technicians = ?job.assigned_technician_ids,
            "{message}"
        );
        Ok(())
    }
}
