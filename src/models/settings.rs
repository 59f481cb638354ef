use std::str::FromStr;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{AppError, AppResult};

pub const DEFAULT_TIMEZONE: &str = "Africa/Johannesburg";
pub const DEFAULT_TERM_WEEKS: u32 = 12;
pub const DEFAULT_WEEKLY_CAP: usize = 2;
pub const DEFAULT_SAME_WEEKDAY_WEEKS: u32 = 4;
pub const DEFAULT_SEARCH_HORIZON_DAYS: u32 = 14;

pub fn default_alternate_times() -> Vec<NaiveTime> {
    [(9, 0), (14, 0), (17, 0)]
        .into_iter()
        .filter_map(|(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
        .collect()
}

/// Tunables of the lesson generation engine.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSettings {
    /// IANA zone the preferred times are expressed in.
    pub timezone: String,
    pub default_term_weeks: u32,
    pub weekly_cap: usize,
    pub same_weekday_search_weeks: u32,
    pub search_horizon_days: u32,
    pub alternate_times: Vec<NaiveTime>,
    pub updated_at: String,
}

impl SchedulerSettings {
    pub fn tz(&self) -> AppResult<Tz> {
        Tz::from_str(&self.timezone)
            .map_err(|_| AppError::validation(format!("unknown time zone: {}", self.timezone)))
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            default_term_weeks: DEFAULT_TERM_WEEKS,
            weekly_cap: DEFAULT_WEEKLY_CAP,
            same_weekday_search_weeks: DEFAULT_SAME_WEEKDAY_WEEKS,
            search_horizon_days: DEFAULT_SEARCH_HORIZON_DAYS,
            alternate_times: default_alternate_times(),
            updated_at: String::new(),
        }
    }
}
