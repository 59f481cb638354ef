use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::schedule::{
    parse_weekday, DeliveryMode, Frequency, ScheduleTemplate, WeekdaySet,
};

const MAX_DURATION_MINUTES: i64 = 24 * 60;
const MAX_TERM_WEEKS: u32 = 104;
const TIME_FORMATS: [&str; 4] = ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];

/// Raw schedule preference as stored on the accepted request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleDescriptor {
    #[serde(default, alias = "preferredDays")]
    days: Option<Vec<String>>,
    #[serde(default, alias = "preferredTimes")]
    times: Option<Vec<String>>,
    #[serde(default, alias = "durationMinutes")]
    duration: Option<i64>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    term_duration_weeks: Option<u32>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    delivery_mode: Option<String>,
}

/// Values the descriptor may leave out.
#[derive(Debug, Clone)]
pub struct TemplateDefaults {
    /// Term start used when the descriptor has none.
    pub today: NaiveDate,
    pub default_term_weeks: u32,
    /// Term length supplied by the accepted request itself.
    pub term_weeks_override: Option<u32>,
}

pub struct ScheduleParser;

impl ScheduleParser {
    pub fn parse(descriptor: &str, defaults: &TemplateDefaults) -> AppResult<ScheduleTemplate> {
        let raw: ScheduleDescriptor = serde_json::from_str(descriptor)
            .map_err(|err| AppError::invalid_schedule_format(err.to_string()))?;

        let mut missing = Vec::new();
        if raw.days.as_ref().map_or(true, |days| days.is_empty()) {
            missing.push("days");
        }
        if raw.times.as_ref().map_or(true, |times| times.is_empty()) {
            missing.push("times");
        }
        if raw.duration.is_none() {
            missing.push("duration");
        }
        if !missing.is_empty() {
            return Err(AppError::incomplete_schedule(missing));
        }

        let preferred_days = Self::parse_days(raw.days.as_deref().unwrap_or_default())?;
        let preferred_times = Self::parse_times(raw.times.as_deref().unwrap_or_default())?;

        let duration_minutes = raw.duration.unwrap_or_default();
        if duration_minutes <= 0 || duration_minutes > MAX_DURATION_MINUTES {
            return Err(AppError::invalid_schedule_format(format!(
                "duration must be between 1 and {MAX_DURATION_MINUTES} minutes, got {duration_minutes}"
            )));
        }

        let frequency = match raw.frequency.as_deref() {
            Some(value) => value.parse::<Frequency>()?,
            None => Frequency::Weekly,
        };

        let delivery_mode = match raw.delivery_mode.as_deref() {
            Some(value) => value.parse::<DeliveryMode>()?,
            None => DeliveryMode::Online,
        };

        let term_start = match raw.start_date.as_deref() {
            Some(value) => parse_date(value)?,
            None => defaults.today,
        };

        let term_end = match raw.end_date.as_deref() {
            Some(value) => parse_date(value)?,
            None => {
                let weeks = defaults
                    .term_weeks_override
                    .or(raw.term_duration_weeks)
                    .unwrap_or(defaults.default_term_weeks);
                if weeks == 0 || weeks > MAX_TERM_WEEKS {
                    return Err(AppError::invalid_schedule_format(format!(
                        "term length must be between 1 and {MAX_TERM_WEEKS} weeks, got {weeks}"
                    )));
                }
                term_start + Duration::days(i64::from(weeks) * 7 - 1)
            }
        };

        if term_end <= term_start {
            return Err(AppError::invalid_schedule_format(format!(
                "term end {term_end} must be after term start {term_start}"
            )));
        }
        let term_days = (term_end - term_start).num_days() + 1;
        if term_days > i64::from(MAX_TERM_WEEKS) * 7 {
            return Err(AppError::invalid_schedule_format(format!(
                "term length must be at most {MAX_TERM_WEEKS} weeks, got {term_days} days"
            )));
        }

        debug!(
            target: "app::scheduler",
            days = preferred_days.len(),
            times = preferred_times.len(),
            %term_start,
            %term_end,
            "schedule descriptor parsed"
        );

        Ok(ScheduleTemplate {
            preferred_days,
            preferred_times,
            duration_minutes,
            term_start,
            term_end,
            frequency,
            delivery_mode,
        })
    }

    fn parse_days(values: &[String]) -> AppResult<WeekdaySet> {
        let mut days = WeekdaySet::empty();
        for value in values {
            let day = parse_weekday(value).ok_or_else(|| {
                AppError::invalid_schedule_format(format!("unknown weekday: {value}"))
            })?;
            days.insert(day);
        }
        Ok(days)
    }

    fn parse_times(values: &[String]) -> AppResult<Vec<NaiveTime>> {
        let mut times = Vec::with_capacity(values.len());
        for value in values {
            times.push(parse_time_of_day(value)?);
        }
        times.sort();
        times.dedup();
        Ok(times)
    }
}

pub fn parse_time_of_day(value: &str) -> AppResult<NaiveTime> {
    let trimmed = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| AppError::invalid_schedule_format(format!("invalid time of day: {value}")))
}

/// Plain `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp.
fn parse_date(value: &str) -> AppResult<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .ok_or_else(|| AppError::invalid_schedule_format(format!("invalid date: {value}")))
}
