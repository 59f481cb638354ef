use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, trace};

use crate::models::schedule::{ScheduleTemplate, WeekKey};
use crate::services::holiday_calendar::HolidayCalendar;
use crate::services::schedule_utils::{add_minutes, local_instant};
use crate::services::weekly_cap::enforce_weekly_cap;

/// Provisional lesson slot derived from one term day and one preferred time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSlot {
    /// Position in generation order.
    pub sequence: usize,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CandidateSlot {
    pub fn week_key(&self) -> WeekKey {
        WeekKey::of(self.date)
    }
}

pub struct CandidateGenerator<'a> {
    template: &'a ScheduleTemplate,
    holidays: &'a HolidayCalendar,
    tz: Tz,
    weekly_cap: usize,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(
        template: &'a ScheduleTemplate,
        holidays: &'a HolidayCalendar,
        tz: Tz,
        weekly_cap: usize,
    ) -> Self {
        Self {
            template,
            holidays,
            tz,
            weekly_cap,
        }
    }

    /// Term days that may host a lesson, in calendar order.
    pub fn candidate_dates(&self) -> Vec<NaiveDate> {
        let cohort = self.template.cohort();
        let dates: Vec<NaiveDate> = self
            .template
            .term_days()
            .filter(|date| !self.holidays.contains(*date))
            .filter(|date| self.template.preferred_days.contains(date.weekday()))
            .filter(|date| cohort.admits(date.weekday()))
            .collect();

        if !cohort.is_capped() {
            return dates;
        }

        let (kept, skipped) = enforce_weekly_cap(dates, self.weekly_cap, |date| WeekKey::of(*date));
        if !skipped.is_empty() {
            debug!(
                target: "app::scheduler",
                skipped = skipped.len(),
                cap = self.weekly_cap,
                "weekday dates skipped by weekly cap"
            );
        }
        kept
    }

    /// Future slots for every retained date crossed with every preferred time.
    pub fn generate(&self, now: DateTime<Utc>) -> Vec<CandidateSlot> {
        let mut slots = Vec::new();

        for date in self.candidate_dates() {
            for &time in &self.template.preferred_times {
                let Some(start) = local_instant(self.tz, date, time) else {
                    trace!(target: "app::scheduler", %date, %time, "local time does not exist, skipped");
                    continue;
                };
                if start <= now {
                    trace!(target: "app::scheduler", %start, "candidate in the past, skipped");
                    continue;
                }
                let Ok(end) = add_minutes(start, self.template.duration_minutes) else {
                    continue;
                };

                slots.push(CandidateSlot {
                    sequence: slots.len(),
                    date,
                    time,
                    start,
                    end,
                });
            }
        }

        debug!(
            target: "app::scheduler",
            cohort = ?self.template.cohort(),
            candidates = slots.len(),
            "candidate slots generated"
        );
        slots
    }
}
