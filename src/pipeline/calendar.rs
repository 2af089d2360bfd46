//! Calendar attributes derived from an hourly timestamp
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Suffix appended to the hour number in `hour_str` ("7 Uhr")
pub const HOUR_SUFFIX: &str = " Uhr";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarFields {
    /// 0-23
    pub hour: u32,
    pub hour_str: String,
    /// 0 = Monday
    pub weekday: u32,
    pub day_name: String,
    /// 1-12
    pub month: u32,
    pub month_name: String,
    pub year: i32,
}

impl CalendarFields {
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        let hour = timestamp.hour();
        let weekday = timestamp.weekday().num_days_from_monday();
        let month = timestamp.month();

        Self {
            hour,
            hour_str: format!("{hour}{HOUR_SUFFIX}"),
            weekday,
            day_name: timestamp.format("%A").to_string(),
            month,
            month_name: timestamp.format("%B").to_string(),
            year: timestamp.year(),
        }
    }
}
