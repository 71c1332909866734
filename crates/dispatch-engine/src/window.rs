//! Time windows -- converts (date, time-of-day, duration) triples into absolute
//! intervals and tests them for overlap.
//!
//! Job dates and times are wall-clock values in the business timezone. They are
//! converted to UTC instants so they compare directly against leave and closed
//! periods, which are stored as absolute timestamps.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Longest DST gap we step over when a local time does not exist.
const MAX_GAP_MINUTES: i64 = 3 * 60;

/// A half-open interval `[start, end)` on the absolute timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A window is usable only when it has positive length.
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    /// Minutes shared by both windows, or 0 when they do not overlap.
    pub fn overlap_minutes(&self, other: &TimeWindow) -> i64 {
        if !self.overlaps(other) {
            return 0;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (end - start).num_minutes()
    }
}

/// Two half-open intervals overlap iff `a_start < b_end && b_start < a_end`.
///
/// One interval ending exactly when the other begins is NOT an overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Parse `"HH:MM"` (or `"HH:MM:SS"`, seconds dropped) into minutes since midnight.
///
/// Returns `None` for anything else, including out-of-range components.
pub fn parse_time_of_day(text: &str) -> Option<u32> {
    let mut parts = text.trim().split(':');
    let hours = parts.next()?;
    let minutes = parts.next()?;
    if let Some(seconds) = parts.next() {
        parse_component(seconds, 2, 59)?;
    }
    if parts.next().is_some() {
        return None;
    }

    let hours = parse_component(hours, 1, 23)?;
    let minutes = parse_component(minutes, 2, 59)?;
    Some(hours * 60 + minutes)
}

fn parse_component(text: &str, min_len: usize, max: u32) -> Option<u32> {
    if text.len() < min_len || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok().filter(|value| *value <= max)
}

/// Format minutes since midnight as `"HH:MM"`.
pub fn format_time_of_day(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Truncate a time-of-day to the top of its hour.
pub fn snap_to_hour(minutes: u32) -> u32 {
    minutes - minutes % 60
}

/// Pick the time-of-day for a window: the stored value when it parses, else
/// the default.
pub fn resolve_time_of_day(stored: Option<&str>, default_minutes: u32) -> u32 {
    stored.and_then(parse_time_of_day).unwrap_or(default_minutes)
}

/// Use `hours` when it is a positive finite number, else the default.
pub fn resolve_duration_hours(hours: Option<f64>, default_hours: f64) -> f64 {
    match hours {
        Some(h) if h.is_finite() && h > 0.0 => h,
        _ => default_hours,
    }
}

/// Build the absolute window for a job starting at `minutes` past local midnight
/// on `date` and lasting `duration_hours`.
///
/// Returns `None` when the end falls outside the representable timeline.
pub fn compute_window(
    date: NaiveDate,
    minutes: u32,
    duration_hours: f64,
    tz: Tz,
) -> Option<TimeWindow> {
    let start = local_to_utc(date, minutes, tz);
    let length = Duration::try_milliseconds((duration_hours * 3_600_000.0).round() as i64)?;
    let end = start.checked_add_signed(length)?;
    Some(TimeWindow::new(start, end))
}

/// Convert a wall-clock time in `tz` to a UTC instant.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times inside
/// a DST gap shift forward to the first valid time after the gap.
pub fn local_to_utc(date: NaiveDate, minutes: u32, tz: Tz) -> DateTime<Utc> {
    let naive = local_datetime(date, minutes);
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.with_timezone(&Utc);
    }

    (1..=MAX_GAP_MINUTES)
        .find_map(|step| {
            tz.from_local_datetime(&(naive + Duration::minutes(step)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

fn local_datetime(date: NaiveDate, minutes: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(minutes))
}
