//! Free time for a job's crew on a given day.
//!
//! Collects the busy periods that would make a candidate move conflict (other
//! jobs of the assigned technicians, their leave, business closures), merges
//! them within the working day, and reports the gaps. Used to offer the user a
//! clean alternative when a reschedule collides.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::conflict::job_window;
use crate::model::{Job, ScheduleSnapshot};
use crate::window::{self, TimeWindow, MINUTES_PER_DAY};

/// A free time slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl FreeSlot {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
        }
    }

    fn contains(&self, window: &TimeWindow) -> bool {
        self.start <= window.start && window.end <= self.end
    }
}

/// The configured working day on `date`, as an absolute window.
pub fn workday(date: NaiveDate, settings: &Settings) -> TimeWindow {
    TimeWindow::new(
        day_bound(date, settings.workday_start_minutes, settings),
        day_bound(date, settings.workday_end_minutes, settings),
    )
}

fn day_bound(date: NaiveDate, minutes: u32, settings: &Settings) -> DateTime<Utc> {
    if minutes >= MINUTES_PER_DAY {
        if let Some(next) = date.succ_opt() {
            return window::local_to_utc(next, 0, settings.timezone);
        }
    }
    window::local_to_utc(date, minutes.min(MINUTES_PER_DAY - 1), settings.timezone)
}

/// Everything that blocks `job`'s technicians on `date`, clipped to the
/// working day, merged and sorted.
///
/// Overlapping or adjacent busy periods are merged into one.
pub fn busy_periods(
    job: &Job,
    date: NaiveDate,
    snapshot: &ScheduleSnapshot,
    settings: &Settings,
) -> Vec<TimeWindow> {
    let day = workday(date, settings);

    let jobs = snapshot
        .jobs
        .iter()
        .filter(|other| {
            other.id != job.id
                && other.is_live()
                && other.scheduled_date == Some(date)
                && job.shares_technician_with(other)
        })
        .filter_map(|other| job_window(other, settings));
    let leave = snapshot
        .technician_leave
        .iter()
        .filter(|leave| job.assigned_technician_ids.contains(&leave.technician_id))
        .map(|leave| leave.window());
    let closed = snapshot.closed_periods.iter().map(|period| period.window());

    let mut intervals: Vec<TimeWindow> = jobs
        .chain(leave)
        .chain(closed)
        .filter(|w| w.is_valid() && w.overlaps(&day))
        .map(|w| TimeWindow::new(w.start.max(day.start), w.end.min(day.end)))
        .collect();

    intervals.sort_by_key(|w| (w.start, w.end));

    let mut merged: Vec<TimeWindow> = Vec::new();
    for interval in intervals {
        if let Some(last) = merged.last_mut() {
            if interval.start <= last.end {
                last.end = last.end.max(interval.end);
                continue;
            }
        }
        merged.push(interval);
    }
    merged
}

/// Gaps in the working day on `date` long enough to hold `job`.
///
/// Returns free slots sorted by start time.
pub fn find_free_slots(
    job: &Job,
    date: NaiveDate,
    snapshot: &ScheduleSnapshot,
    settings: &Settings,
) -> Vec<FreeSlot> {
    let day = workday(date, settings);
    let needed = job_duration_minutes(job, settings);

    let mut free_slots = Vec::new();
    let mut cursor = day.start;
    for busy in busy_periods(job, date, snapshot, settings) {
        if cursor < busy.start {
            free_slots.push(FreeSlot::new(cursor, busy.start));
        }
        cursor = cursor.max(busy.end);
    }
    if cursor < day.end {
        free_slots.push(FreeSlot::new(cursor, day.end));
    }

    free_slots.retain(|slot| slot.duration_minutes >= needed);
    free_slots
}

/// The earliest slot on `date` that fits `job`.
pub fn first_free_slot(
    job: &Job,
    date: NaiveDate,
    snapshot: &ScheduleSnapshot,
    settings: &Settings,
) -> Option<FreeSlot> {
    find_free_slots(job, date, snapshot, settings)
        .into_iter()
        .next()
}

/// Top-of-hour start times (`"HH:MM"`, business-local) at which `job` fits
/// entirely inside a free slot on `date`.
///
/// Only whole hours are offered because saved times are snapped to the hour.
pub fn suggest_start_times(
    job: &Job,
    date: NaiveDate,
    snapshot: &ScheduleSnapshot,
    settings: &Settings,
) -> Vec<String> {
    let slots = find_free_slots(job, date, snapshot, settings);
    if slots.is_empty() {
        return Vec::new();
    }
    let hours =
        window::resolve_duration_hours(job.expected_duration_hours, settings.default_duration_hours);
    let day = workday(date, settings);

    let first_hour = settings.workday_start_minutes.div_ceil(60);
    (first_hour..24)
        .map(|hour| hour * 60)
        .filter(|&minutes| {
            window::compute_window(date, minutes, hours, settings.timezone).is_some_and(
                |candidate| {
                    candidate.end <= day.end && slots.iter().any(|slot| slot.contains(&candidate))
                },
            )
        })
        .map(window::format_time_of_day)
        .collect()
}

fn job_duration_minutes(job: &Job, settings: &Settings) -> i64 {
    let hours =
        window::resolve_duration_hours(job.expected_duration_hours, settings.default_duration_hours);
    (hours * 60.0).ceil() as i64
}
