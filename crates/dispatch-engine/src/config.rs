//! Scheduler configuration.
//!
//! All fields have defaults, so a config file only needs to name the values it
//! overrides:
//!
//! ```json
//! { "timezone": "America/Chicago", "persist_timeout_ms": 20000 }
//! ```

use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::window::{self, MINUTES_PER_DAY};

pub const DEFAULT_START_TIME: &str = "09:00";
pub const DEFAULT_DURATION_HOURS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// IANA timezone the business operates in. Job dates and times are local
    /// to this zone; leave and closed periods are absolute instants.
    pub timezone: String,
    /// Start time used when neither the candidate nor the job has one.
    pub default_start_time: String,
    /// Duration used when a job has no usable expected duration.
    pub default_duration_hours: f64,
    /// Upper bound on the schedule update call.
    pub persist_timeout_ms: u64,
    /// Upper bound on the technician notification call.
    pub notify_timeout_ms: u64,
    /// Working day used for free slot suggestions.
    pub workday_start: String,
    pub workday_end: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            default_start_time: DEFAULT_START_TIME.to_string(),
            default_duration_hours: DEFAULT_DURATION_HOURS,
            persist_timeout_ms: 15_000,
            notify_timeout_ms: 5_000,
            workday_start: "07:00".to_string(),
            workday_end: "18:00".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Parse a config from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SchedulerError::Validation(format!("invalid config: {e}")))?;
        config.settings()?;
        Ok(config)
    }

    /// Validate the config and resolve it into the values used by the engine.
    pub fn settings(&self) -> Result<Settings> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(self.timezone.clone()))?;

        let default_start_minutes = parse_field("default_start_time", &self.default_start_time)?;
        let workday_start_minutes = parse_field("workday_start", &self.workday_start)?;
        // "24:00" is allowed as the end of the working day.
        let workday_end_minutes = if self.workday_end == "24:00" {
            MINUTES_PER_DAY
        } else {
            parse_field("workday_end", &self.workday_end)?
        };
        if workday_start_minutes >= workday_end_minutes {
            return Err(SchedulerError::Validation(format!(
                "workday_start {} must be before workday_end {}",
                self.workday_start, self.workday_end
            )));
        }

        let default_duration_hours =
            if self.default_duration_hours.is_finite() && self.default_duration_hours > 0.0 {
                self.default_duration_hours
            } else {
                return Err(SchedulerError::Validation(format!(
                    "default_duration_hours must be positive, got {}",
                    self.default_duration_hours
                )));
            };

        Ok(Settings {
            timezone,
            default_start_minutes,
            default_duration_hours,
            persist_timeout: Duration::from_millis(self.persist_timeout_ms),
            notify_timeout: Duration::from_millis(self.notify_timeout_ms),
            workday_start_minutes,
            workday_end_minutes,
        })
    }
}

fn parse_field(name: &str, value: &str) -> Result<u32> {
    window::parse_time_of_day(value)
        .ok_or_else(|| SchedulerError::Validation(format!("{name} is not a valid time: {value:?}")))
}

/// Validated, ready-to-use form of [`SchedulerConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub timezone: Tz,
    pub default_start_minutes: u32,
    pub default_duration_hours: f64,
    pub persist_timeout: Duration,
    pub notify_timeout: Duration,
    pub workday_start_minutes: u32,
    pub workday_end_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            default_start_minutes: 9 * 60,
            default_duration_hours: DEFAULT_DURATION_HOURS,
            persist_timeout: Duration::from_millis(15_000),
            notify_timeout: Duration::from_millis(5_000),
            workday_start_minutes: 7 * 60,
            workday_end_minutes: 18 * 60,
        }
    }
}
