use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::lesson::{GeneratedLesson, LessonStatus};
use crate::models::notification::RescheduleNotice;
use crate::models::request::AcceptedRequest;
use crate::models::schedule::{Cohort, ScheduleTemplate};
use crate::models::settings::SchedulerSettings;
use crate::services::holiday_calendar::HolidayCalendar;
use crate::services::lesson_calendar::{LessonCalendar, SqliteLessonCalendar};
use crate::services::lesson_planner::{DroppedCandidate, LessonPlan, LessonPlanner};
use crate::services::notification_service::{NotificationSink, SqliteNotificationSink};
use crate::services::party_locks::PartyLocks;
use crate::services::schedule_parser::{ScheduleParser, TemplateDefaults};
use crate::services::schedule_utils::local_date;
use crate::services::settings_service::SettingsService;

/// Result of one generation (or preview) call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub request_id: String,
    /// `None` when existing lessons were returned without parsing the schedule.
    pub cohort: Option<Cohort>,
    pub lessons: Vec<GeneratedLesson>,
    pub notices: Vec<RescheduleNotice>,
    pub dropped: Vec<DroppedCandidate>,
    /// Lessons were already stored for this request and returned unchanged.
    pub reused_existing: bool,
}

impl GenerationOutcome {
    fn reused(request_id: &str, lessons: Vec<GeneratedLesson>) -> Self {
        Self {
            request_id: request_id.to_string(),
            cohort: None,
            lessons,
            notices: Vec::new(),
            dropped: Vec::new(),
            reused_existing: true,
        }
    }

    pub fn rescheduled(&self) -> impl Iterator<Item = &GeneratedLesson> + '_ {
        self.lessons.iter().filter(|lesson| lesson.was_rescheduled())
    }
}

pub struct LessonGenerationService {
    calendar: Arc<dyn LessonCalendar>,
    notifier: Arc<dyn NotificationSink>,
    settings: SchedulerSettings,
    locks: Arc<PartyLocks>,
}

impl LessonGenerationService {
    pub fn new(
        calendar: Arc<dyn LessonCalendar>,
        notifier: Arc<dyn NotificationSink>,
        settings: SchedulerSettings,
    ) -> Self {
        Self::with_locks(calendar, notifier, settings, Arc::new(PartyLocks::new()))
    }

    /// Services sharing one lock registry serialize runs across each other.
    pub fn with_locks(
        calendar: Arc<dyn LessonCalendar>,
        notifier: Arc<dyn NotificationSink>,
        settings: SchedulerSettings,
        locks: Arc<PartyLocks>,
    ) -> Self {
        Self {
            calendar,
            notifier,
            settings,
            locks,
        }
    }

    /// SQLite-backed service using the settings stored in the same database.
    pub fn from_pool(db: DbPool) -> AppResult<Self> {
        let settings = SettingsService::new(db.clone()).get()?;
        let tz = settings.tz()?;
        Ok(Self::new(
            Arc::new(SqliteLessonCalendar::new(db.clone())),
            Arc::new(SqliteNotificationSink::new(db, tz)),
            settings,
        ))
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn generate(&self, request: &AcceptedRequest) -> AppResult<GenerationOutcome> {
        self.generate_at(request, Utc::now())
    }

    /// Materializes the lesson series for an accepted request as of `now`.
    pub fn generate_at(
        &self,
        request: &AcceptedRequest,
        now: DateTime<Utc>,
    ) -> AppResult<GenerationOutcome> {
        Self::validate_request(request)?;
        let _lease = self
            .locks
            .acquire(&[request.tutor_id.as_str(), request.student_id.as_str()])?;

        if self.calendar.lesson_exists_for_request(&request.request_id)? {
            let existing = self.calendar.lessons_for_request(&request.request_id)?;
            info!(
                target: "app::scheduler",
                request_id = %request.request_id,
                count = existing.len(),
                "lessons already generated, returning existing set"
            );
            return Ok(GenerationOutcome::reused(&request.request_id, existing));
        }

        let outcome = self.build_outcome(request, now)?;
        self.calendar.create_lessons(&outcome.lessons)?;

        for notice in &outcome.notices {
            if let Err(err) = self.notifier.send_reschedule_notice(notice) {
                warn!(
                    target: "app::notify",
                    request_id = %request.request_id,
                    recipient = %notice.recipient_id,
                    error = %err,
                    "failed to deliver reschedule notice"
                );
            }
        }

        info!(
            target: "app::scheduler",
            request_id = %request.request_id,
            lessons = outcome.lessons.len(),
            rescheduled = outcome.notices.len(),
            dropped = outcome.dropped.len(),
            "lesson series generated"
        );
        Ok(outcome)
    }

    pub fn preview(&self, request: &AcceptedRequest) -> AppResult<GenerationOutcome> {
        self.preview_at(request, Utc::now())
    }

    /// Same result `generate_at` would return, without writing or notifying.
    pub fn preview_at(
        &self,
        request: &AcceptedRequest,
        now: DateTime<Utc>,
    ) -> AppResult<GenerationOutcome> {
        Self::validate_request(request)?;
        if self.calendar.lesson_exists_for_request(&request.request_id)? {
            let existing = self.calendar.lessons_for_request(&request.request_id)?;
            return Ok(GenerationOutcome::reused(&request.request_id, existing));
        }
        self.build_outcome(request, now)
    }

    fn build_outcome(
        &self,
        request: &AcceptedRequest,
        now: DateTime<Utc>,
    ) -> AppResult<GenerationOutcome> {
        let tz = self.settings.tz()?;
        let defaults = TemplateDefaults {
            today: local_date(tz, now),
            default_term_weeks: self.settings.default_term_weeks,
            term_weeks_override: request.term_duration_weeks,
        };
        let template = ScheduleParser::parse(&request.schedule_descriptor, &defaults)?;
        let holidays = HolidayCalendar::for_range(template.term_start, template.term_end);

        let tutor_lessons = self.calendar.scheduled_lessons_for_party(&request.tutor_id)?;
        let student_lessons = self
            .calendar
            .scheduled_lessons_for_party(&request.student_id)?;
        debug!(
            target: "app::scheduler",
            request_id = %request.request_id,
            tutor_lessons = tutor_lessons.len(),
            student_lessons = student_lessons.len(),
            holidays = holidays.len(),
            "committed lessons loaded"
        );

        let plan = LessonPlanner::new(&template, &holidays, &self.settings, tz).plan(
            &tutor_lessons,
            &student_lessons,
            now,
        );
        if plan.is_empty() {
            return Err(AppError::empty_generation_result(&request.request_id));
        }

        Ok(Self::materialize(request, &template, plan, now))
    }

    fn materialize(
        request: &AcceptedRequest,
        template: &ScheduleTemplate,
        plan: LessonPlan,
        now: DateTime<Utc>,
    ) -> GenerationOutcome {
        let pattern = template.recurrence_pattern();
        let mut lessons = Vec::with_capacity(plan.slots.len());
        let mut notices = Vec::new();

        for slot in &plan.slots {
            let rescheduled_from = slot.rescheduled_from();
            if let Some(original) = rescheduled_from {
                notices.push(RescheduleNotice::for_conflict(
                    &request.request_id,
                    &request.student_id,
                    original,
                    slot.start,
                ));
            }

            lessons.push(GeneratedLesson {
                id: uuid::Uuid::new_v4().to_string(),
                source_request_id: request.request_id.clone(),
                tutor_id: request.tutor_id.clone(),
                student_id: request.student_id.clone(),
                course_id: request.course_id.clone(),
                subject: request.subject.clone(),
                scheduled_at: slot.start,
                duration_minutes: template.duration_minutes,
                delivery_mode: template.delivery_mode,
                status: LessonStatus::Scheduled,
                recurrence_pattern: pattern.clone(),
                rescheduled_from,
                created_at: now,
            });
        }
        lessons.sort_by_key(|lesson| lesson.scheduled_at);

        GenerationOutcome {
            request_id: request.request_id.clone(),
            cohort: Some(plan.cohort),
            lessons,
            notices,
            dropped: plan.dropped,
            reused_existing: false,
        }
    }

    fn validate_request(request: &AcceptedRequest) -> AppResult<()> {
        let mut missing = Vec::new();
        for (field, value) in [
            ("requestId", &request.request_id),
            ("tutorId", &request.tutor_id),
            ("studentId", &request.student_id),
            ("subject", &request.subject),
        ] {
            if value.trim().is_empty() {
                missing.push(field);
            }
        }
        if !missing.is_empty() {
            return Err(AppError::validation_with_details(
                "accepted request is missing required fields",
                serde_json::json!({ "missing": missing }),
            ));
        }
        if request.tutor_id == request.student_id {
            return Err(AppError::validation("tutor and student must be different parties"));
        }
        Ok(())
    }
}
