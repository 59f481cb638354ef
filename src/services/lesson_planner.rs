use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::lesson::LessonInterval;
use crate::models::schedule::{Cohort, ScheduleTemplate};
use crate::models::settings::SchedulerSettings;
use crate::services::candidate_generator::{CandidateGenerator, CandidateSlot};
use crate::services::conflict_detector::{CommittedLessonSet, ConflictDetector};
use crate::services::holiday_calendar::HolidayCalendar;
use crate::services::reschedule_resolver::{RescheduleResolver, RescheduleStrategy, SearchWindow};
use crate::services::weekly_cap::enforce_weekly_cap;

/// A candidate that survived both passes, possibly moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSlot {
    pub candidate: CandidateSlot,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Set when the naive slot conflicted and was moved.
    pub strategy: Option<RescheduleStrategy>,
}

impl PlannedSlot {
    pub fn rescheduled_from(&self) -> Option<DateTime<Utc>> {
        self.strategy.map(|_| self.candidate.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NoFreeSlot,
    WeeklyCap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedCandidate {
    pub candidate_start: DateTime<Utc>,
    pub date: NaiveDate,
    pub reason: DropReason,
}

impl DroppedCandidate {
    fn new(candidate: &CandidateSlot, reason: DropReason) -> Self {
        Self {
            candidate_start: candidate.start,
            date: candidate.date,
            reason,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LessonPlan {
    pub cohort: Cohort,
    pub slots: Vec<PlannedSlot>,
    pub dropped: Vec<DroppedCandidate>,
}

impl LessonPlan {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Pure generation pipeline: candidates, conflicts, rescheduling, weekly cap.
pub struct LessonPlanner<'a> {
    template: &'a ScheduleTemplate,
    holidays: &'a HolidayCalendar,
    settings: &'a SchedulerSettings,
    tz: Tz,
}

impl<'a> LessonPlanner<'a> {
    pub fn new(
        template: &'a ScheduleTemplate,
        holidays: &'a HolidayCalendar,
        settings: &'a SchedulerSettings,
        tz: Tz,
    ) -> Self {
        Self {
            template,
            holidays,
            settings,
            tz,
        }
    }

    pub fn plan(
        &self,
        tutor_lessons: &[LessonInterval],
        student_lessons: &[LessonInterval],
        now: DateTime<Utc>,
    ) -> LessonPlan {
        let cohort = self.template.cohort();
        let candidates =
            CandidateGenerator::new(self.template, self.holidays, self.tz, self.settings.weekly_cap)
                .generate(now);

        let mut detector = ConflictDetector::new(
            CommittedLessonSet::from_intervals(tutor_lessons),
            CommittedLessonSet::from_intervals(student_lessons),
        );
        let resolver = RescheduleResolver::new(SearchWindow {
            preferred_days: self.template.preferred_days,
            term_end: self.template.term_end,
            now,
            duration: self.template.duration(),
            holidays: self.holidays,
            tz: self.tz,
            same_weekday_weeks: self.settings.same_weekday_search_weeks,
            horizon_days: self.settings.search_horizon_days,
            alternate_times: &self.settings.alternate_times,
        });

        let mut slots = Vec::with_capacity(candidates.len());
        let mut dropped = Vec::new();

        for candidate in candidates {
            let check = detector.check(candidate.start, candidate.end);
            if check.is_free() {
                detector.accept(candidate.start, candidate.end);
                slots.push(PlannedSlot {
                    start: candidate.start,
                    end: candidate.end,
                    strategy: None,
                    candidate,
                });
                continue;
            }

            debug!(
                target: "app::scheduler",
                start = %candidate.start,
                tutor = check.tutor,
                student = check.student,
                this_run = check.this_run,
                "candidate conflicts, searching for a replacement"
            );

            match resolver.resolve(&candidate, &detector) {
                Some(resolution) => {
                    detector.accept(resolution.start, resolution.end);
                    slots.push(PlannedSlot {
                        start: resolution.start,
                        end: resolution.end,
                        strategy: Some(resolution.strategy),
                        candidate,
                    });
                }
                None => {
                    warn!(
                        target: "app::scheduler",
                        start = %candidate.start,
                        "no free slot found, candidate dropped"
                    );
                    dropped.push(DroppedCandidate::new(&candidate, DropReason::NoFreeSlot));
                }
            }
        }

        if cohort.is_capped() {
            let (kept, over_cap) = enforce_weekly_cap(slots, self.settings.weekly_cap, |slot| {
                slot.candidate.week_key()
            });
            for slot in &over_cap {
                debug!(
                    target: "app::scheduler",
                    week = %slot.candidate.week_key(),
                    start = %slot.start,
                    "slot discarded by weekly cap"
                );
                dropped.push(DroppedCandidate::new(&slot.candidate, DropReason::WeeklyCap));
            }
            slots = kept;
        }

        LessonPlan {
            cohort,
            slots,
            dropped,
        }
    }
}
