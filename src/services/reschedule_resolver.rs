use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::models::schedule::WeekdaySet;
use crate::services::candidate_generator::CandidateSlot;
use crate::services::conflict_detector::ConflictDetector;
use crate::services::holiday_calendar::HolidayCalendar;
use crate::services::schedule_utils::local_instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleStrategy {
    /// Same weekday and time, whole weeks later.
    SameWeekdayLater,
    /// A preferred day in the coming days, same time.
    PreferredDayNearby,
    /// Any day in the coming days, same time.
    AnyDayNearby,
    /// A preferred day in the coming days at one of the fixed alternate times.
    AlternateTimeNearby,
}

/// Bounds and inputs shared by every strategy.
#[derive(Debug, Clone)]
pub struct SearchWindow<'a> {
    pub preferred_days: WeekdaySet,
    /// Last term day a replacement may fall on.
    pub term_end: NaiveDate,
    pub now: DateTime<Utc>,
    pub duration: Duration,
    pub holidays: &'a HolidayCalendar,
    pub tz: Tz,
    pub same_weekday_weeks: u32,
    pub horizon_days: u32,
    pub alternate_times: &'a [NaiveTime],
}

impl SearchWindow<'_> {
    fn admits(&self, date: NaiveDate) -> bool {
        date <= self.term_end && !self.holidays.contains(date)
    }

    fn nearby_days(&self, origin: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        (1..=i64::from(self.horizon_days)).map(move |offset| origin + Duration::days(offset))
    }
}

type StrategyFn = fn(&SearchWindow<'_>, &CandidateSlot) -> Vec<(NaiveDate, NaiveTime)>;

/// Tried in order; the first free slot wins.
static STRATEGIES: [(RescheduleStrategy, StrategyFn); 4] = [
    (RescheduleStrategy::SameWeekdayLater, same_weekday_later),
    (RescheduleStrategy::PreferredDayNearby, preferred_day_nearby),
    (RescheduleStrategy::AnyDayNearby, any_day_nearby),
    (RescheduleStrategy::AlternateTimeNearby, alternate_time_nearby),
];

pub fn same_weekday_later(
    window: &SearchWindow<'_>,
    slot: &CandidateSlot,
) -> Vec<(NaiveDate, NaiveTime)> {
    (1..=i64::from(window.same_weekday_weeks))
        .map(|weeks| (slot.date + Duration::weeks(weeks), slot.time))
        .collect()
}

pub fn preferred_day_nearby(
    window: &SearchWindow<'_>,
    slot: &CandidateSlot,
) -> Vec<(NaiveDate, NaiveTime)> {
    window
        .nearby_days(slot.date)
        .filter(|date| window.preferred_days.contains(date.weekday()))
        .map(|date| (date, slot.time))
        .collect()
}

pub fn any_day_nearby(
    window: &SearchWindow<'_>,
    slot: &CandidateSlot,
) -> Vec<(NaiveDate, NaiveTime)> {
    window
        .nearby_days(slot.date)
        .map(|date| (date, slot.time))
        .collect()
}

pub fn alternate_time_nearby(
    window: &SearchWindow<'_>,
    slot: &CandidateSlot,
) -> Vec<(NaiveDate, NaiveTime)> {
    window
        .nearby_days(slot.date)
        .filter(|date| window.preferred_days.contains(date.weekday()))
        .flat_map(|date| window.alternate_times.iter().map(move |time| (date, *time)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub strategy: RescheduleStrategy,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub struct RescheduleResolver<'a> {
    window: SearchWindow<'a>,
}

impl<'a> RescheduleResolver<'a> {
    pub fn new(window: SearchWindow<'a>) -> Self {
        Self { window }
    }

    /// First free replacement for a conflicting slot, or `None` when every
    /// strategy is exhausted.
    pub fn resolve(&self, slot: &CandidateSlot, detector: &ConflictDetector) -> Option<Resolution> {
        STRATEGIES.iter().find_map(|(strategy, propose)| {
            let resolution = self.first_free(*strategy, propose(&self.window, slot), detector);
            if resolution.is_none() {
                debug!(
                    target: "app::scheduler",
                    strategy = ?strategy,
                    original = %slot.start,
                    "reschedule strategy found no free slot"
                );
            }
            resolution
        })
    }

    pub fn try_strategy(
        &self,
        strategy: RescheduleStrategy,
        slot: &CandidateSlot,
        detector: &ConflictDetector,
    ) -> Option<Resolution> {
        let (_, propose) = STRATEGIES.iter().find(|(kind, _)| *kind == strategy)?;
        self.first_free(strategy, propose(&self.window, slot), detector)
    }

    fn first_free(
        &self,
        strategy: RescheduleStrategy,
        proposals: Vec<(NaiveDate, NaiveTime)>,
        detector: &ConflictDetector,
    ) -> Option<Resolution> {
        proposals
            .into_iter()
            .filter(|(date, _)| self.window.admits(*date))
            .filter_map(|(date, time)| local_instant(self.window.tz, date, time))
            .filter(|start| *start > self.window.now)
            .map(|start| (start, start + self.window.duration))
            .find(|(start, end)| detector.is_free(*start, *end))
            .map(|(start, end)| Resolution {
                strategy,
                start,
                end,
            })
    }
}
