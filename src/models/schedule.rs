use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::lesson::RecurrencePattern;

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Set of weekdays backed by a bitmask, iterated Monday first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn single(day: Weekday) -> Self {
        Self(bit(day))
    }

    pub fn insert(&mut self, day: Weekday) -> bool {
        let was_present = self.contains(day);
        self.0 |= bit(day);
        !was_present
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & bit(day) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        ALL_WEEKDAYS.into_iter().filter(move |day| self.contains(*day))
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

fn bit(day: Weekday) -> u8 {
    1 << day.num_days_from_monday()
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Accepts full English names and three letter abbreviations in any case.
pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
        }
    }
}

impl FromStr for Frequency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Frequency::Weekly),
            other => Err(AppError::invalid_schedule_format(format!(
                "unsupported frequency: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Online,
    InPerson,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Online => "online",
            DeliveryMode::InPerson => "in_person",
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(DeliveryMode::Online),
            "in_person" | "in-person" | "inperson" => Ok(DeliveryMode::InPerson),
            other => Err(AppError::invalid_schedule_format(format!(
                "unsupported delivery mode: {other}"
            ))),
        }
    }
}

/// Which generation rules apply, derived from the preferred days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
    SaturdayOnly,
    WeekdayCohort,
    Mixed,
}

impl Cohort {
    pub fn classify(days: &WeekdaySet) -> Self {
        if days.len() == 1 && days.contains(Weekday::Sat) {
            Cohort::SaturdayOnly
        } else if !days.contains(Weekday::Sat) {
            Cohort::WeekdayCohort
        } else {
            Cohort::Mixed
        }
    }

    /// Only weekday cohorts are limited per ISO week.
    pub fn is_capped(self) -> bool {
        matches!(self, Cohort::WeekdayCohort)
    }

    pub fn admits(self, day: Weekday) -> bool {
        match self {
            Cohort::SaturdayOnly => day == Weekday::Sat,
            Cohort::WeekdayCohort => day != Weekday::Sat,
            Cohort::Mixed => true,
        }
    }
}

/// ISO year-week grouping key, rendered as `YYYY-Www`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekKey {
    pub year: i32,
    pub week: u32,
}

impl WeekKey {
    pub fn of(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.year, self.week)
    }
}

/// Normalized weekly schedule preference for one accepted request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleTemplate {
    pub preferred_days: WeekdaySet,
    /// Ascending and free of duplicates.
    pub preferred_times: Vec<NaiveTime>,
    pub duration_minutes: i64,
    pub term_start: NaiveDate,
    /// Last calendar day of the term, inclusive.
    pub term_end: NaiveDate,
    pub frequency: Frequency,
    pub delivery_mode: DeliveryMode,
}

impl ScheduleTemplate {
    pub fn cohort(&self) -> Cohort {
        Cohort::classify(&self.preferred_days)
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes)
    }

    pub fn term_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.term_start
            .iter_days()
            .take_while(move |date| *date <= self.term_end)
    }

    pub fn recurrence_pattern(&self) -> RecurrencePattern {
        RecurrencePattern {
            frequency: self.frequency,
            days: self
                .preferred_days
                .iter()
                .map(|day| weekday_name(day).to_string())
                .collect(),
            times: self
                .preferred_times
                .iter()
                .map(|time| time.format("%H:%M").to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_saturday_only() {
        let days = WeekdaySet::single(Weekday::Sat);
        assert_eq!(Cohort::classify(&days), Cohort::SaturdayOnly);
        assert!(!Cohort::SaturdayOnly.is_capped());
    }

    #[test]
    fn test_classify_weekday_and_mixed() {
        let weekdays: WeekdaySet = [Weekday::Mon, Weekday::Wed, Weekday::Fri]
            .into_iter()
            .collect();
        assert_eq!(Cohort::classify(&weekdays), Cohort::WeekdayCohort);

        let mixed: WeekdaySet = [Weekday::Tue, Weekday::Sat].into_iter().collect();
        assert_eq!(Cohort::classify(&mixed), Cohort::Mixed);
        assert!(Cohort::Mixed.admits(Weekday::Sun));
    }

    #[test]
    fn test_week_key_uses_iso_year() {
        // 2024-12-30 is a Monday belonging to ISO week 1 of 2025
        let key = WeekKey::of(NaiveDate::from_ymd_opt(2024, 12, 30).unwrap());
        assert_eq!(key.to_string(), "2025-W01");

        let key = WeekKey::of(NaiveDate::from_ymd_opt(2024, 2, 5).unwrap());
        assert_eq!(key.to_string(), "2024-W06");
    }

    #[test]
    fn test_weekday_set_iterates_monday_first() {
        let set: WeekdaySet = [Weekday::Sun, Weekday::Mon, Weekday::Mon]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Weekday::Mon, Weekday::Sun]);
    }

    #[test]
    fn test_parse_weekday_variants() {
        assert_eq!(parse_weekday("Mon"), Some(Weekday::Mon));
        assert_eq!(parse_weekday(" SATURDAY "), Some(Weekday::Sat));
        assert_eq!(parse_weekday("funday"), None);
    }
}
