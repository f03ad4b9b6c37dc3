//! Daily schedule windows for campaigns.
//!
//! A campaign may restrict spins to a time-of-day window ("HH:MM" to
//! "HH:MM") in its own local time, expressed as a fixed offset from UTC.
//! Windows may cross midnight (22:00 - 02:00). Evaluation is pure so the
//! same instant always yields the same verdict.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStatus {
    pub open: bool,
    /// 12-hour display of the window start, set only while closed
    pub next_open_display: Option<String>,
}

impl ScheduleStatus {
    fn always_open() -> Self {
        Self {
            open: true,
            next_open_display: None,
        }
    }
}

/// Evaluate a campaign's window at `now`. Missing or malformed window bounds
/// mean the campaign is always open, matching how unscheduled campaigns
/// behave.
pub fn is_open(
    schedule_start: Option<&str>,
    schedule_end: Option<&str>,
    offset_minutes: i32,
    now: DateTime<Utc>,
) -> ScheduleStatus {
    let (Some(start_raw), Some(end_raw)) = (schedule_start, schedule_end) else {
        return ScheduleStatus::always_open();
    };
    let (Some(start), Some(end)) = (parse_minutes(start_raw), parse_minutes(end_raw)) else {
        return ScheduleStatus::always_open();
    };

    let local = now + Duration::minutes(i64::from(offset_minutes));
    let current = i32::try_from(local.hour() * 60 + local.minute()).unwrap_or(0);

    let open = if start <= end {
        current >= start && current < end
    } else {
        // Crosses midnight, e.g. 22:00 - 02:00
        current >= start || current < end
    };

    ScheduleStatus {
        open,
        next_open_display: if open { None } else { Some(display_12h(start)) },
    }
}

/// "HH:MM" as minutes since midnight; `None` when out of range or malformed.
fn parse_minutes(value: &str) -> Option<i32> {
    let (hours, minutes) = value.split_once(':')?;
    let hours: i32 = hours.trim().parse().ok()?;
    let minutes: i32 = minutes.trim().parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(hours * 60 + minutes)
}

fn display_12h(minutes_since_midnight: i32) -> String {
    let hours = minutes_since_midnight / 60;
    let minutes = minutes_since_midnight % 60;
    let period = if hours >= 12 { "PM" } else { "AM" };
    let hour12 = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{hour12}:{minutes:02} {period}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
    }

    #[test]
    fn unscheduled_campaign_is_always_open() {
        assert!(is_open(None, None, 0, at(3, 0)).open);
        assert!(is_open(Some("10:00"), None, 0, at(3, 0)).open);
    }

    #[test]
    fn normal_window() {
        let status = is_open(Some("10:00"), Some("22:00"), 0, at(15, 30));
        assert!(status.open);
        assert!(status.next_open_display.is_none());

        let status = is_open(Some("10:00"), Some("22:00"), 0, at(9, 59));
        assert!(!status.open);
        assert_eq!(status.next_open_display.as_deref(), Some("10:00 AM"));

        // End bound is exclusive
        assert!(!is_open(Some("10:00"), Some("22:00"), 0, at(22, 0)).open);
    }

    #[test]
    fn window_crossing_midnight() {
        let window = (Some("22:00"), Some("02:00"));
        assert!(is_open(window.0, window.1, 0, at(23, 15)).open);
        assert!(is_open(window.0, window.1, 0, at(1, 59)).open);
        assert!(!is_open(window.0, window.1, 0, at(12, 0)).open);
    }

    #[test]
    fn offset_shifts_the_local_clock() {
        // 14:00 UTC is 09:00 at UTC-5, one hour before the window opens
        let status = is_open(Some("10:00"), Some("22:00"), -300, at(14, 0));
        assert!(!status.open);
        // 15:00 UTC is 10:00 at UTC-5
        assert!(is_open(Some("10:00"), Some("22:00"), -300, at(15, 0)).open);
    }

    #[test]
    fn malformed_bounds_default_to_open() {
        assert!(is_open(Some("25:00"), Some("22:00"), 0, at(12, 0)).open);
        assert!(is_open(Some("banana"), Some("22:00"), 0, at(12, 0)).open);
    }

    #[test]
    fn twelve_hour_display() {
        assert_eq!(display_12h(0), "12:00 AM");
        assert_eq!(display_12h(750), "12:30 PM");
        assert_eq!(display_12h(22 * 60), "10:00 PM");
    }
}
