// src/timetable.rs

//! Recurring run-time computation for command tasks.
//!
//! The scheduler core deliberately never reschedules a task except for the
//! retry path; deciding *when* a task runs again is the caller's job. This
//! module is that caller-side piece for the `tickdag` binary: it parses the
//! `daily_at` / `weekly_at` config fields and computes the next concrete
//! `DateTime<Utc>` to pass to [`Scheduler::schedule`].
//!
//! All times are interpreted as UTC wall-clock times.
//!
//! [`Scheduler::schedule`]: crate::sched::Scheduler::schedule

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};

use crate::errors::TickdagError;

/// When a recurring task should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timetable {
    /// Every day at the given time of day.
    DailyAt(NaiveTime),
    /// Once a week, on the given weekday at the given time of day.
    WeeklyAt(Weekday, NaiveTime),
}

impl Timetable {
    /// The next occurrence strictly after `now`.
    pub fn next_occurrence(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Timetable::DailyAt(time) => next_at_time(now, time),
            Timetable::WeeklyAt(weekday, time) => {
                let mut candidate = next_at_time(now, time);
                while candidate.weekday() != weekday {
                    candidate += Duration::days(1);
                }
                candidate
            }
        }
    }

    /// Parse the `daily_at` config form, e.g. `"04:30"`.
    pub fn parse_daily(s: &str) -> Result<Self, TickdagError> {
        Ok(Timetable::DailyAt(parse_time_of_day(s)?))
    }

    /// Parse the `weekly_at` config form, e.g. `"mon 08:00"`.
    pub fn parse_weekly(s: &str) -> Result<Self, TickdagError> {
        let mut parts = s.split_whitespace();
        let (Some(day), Some(time), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TickdagError::ConfigError(format!(
                "invalid weekly_at '{s}' (expected \"<weekday> HH:MM\", e.g. \"mon 08:00\")"
            )));
        };
        Ok(Timetable::WeeklyAt(
            parse_weekday(day)?,
            parse_time_of_day(time)?,
        ))
    }
}

impl fmt::Display for Timetable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Timetable::DailyAt(t) => write!(f, "daily at {}", t.format("%H:%M")),
            Timetable::WeeklyAt(d, t) => write!(f, "weekly on {} at {}", d, t.format("%H:%M")),
        }
    }
}

/// The next `DateTime<Utc>` with the given time of day, strictly after `now`.
fn next_at_time(now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    let today = now
        .date_naive()
        .and_time(time)
        .and_utc();
    if today > now { today } else { today + Duration::days(1) }
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime, TickdagError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| {
        TickdagError::ConfigError(format!("invalid time of day '{s}' (expected HH:MM)"))
    })
}

fn parse_weekday(s: &str) -> Result<Weekday, TickdagError> {
    match s.trim().to_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        other => Err(TickdagError::ConfigError(format!(
            "invalid weekday '{other}' (expected mon..sun)"
        ))),
    }
}
