use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::schedule::{DeliveryMode, Frequency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl LessonStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LessonStatus::Scheduled => "scheduled",
            LessonStatus::Completed => "completed",
            LessonStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for LessonStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(LessonStatus::Scheduled),
            "completed" => Ok(LessonStatus::Completed),
            "cancelled" => Ok(LessonStatus::Cancelled),
            other => Err(AppError::validation(format!("unknown lesson status: {other}"))),
        }
    }
}

/// Half-open `[start, end)` lesson interval with the parties it binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tutor_id: String,
    pub student_id: String,
}

impl LessonInterval {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tutor_id: impl Into<String>,
        student_id: impl Into<String>,
    ) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::validation("lesson interval must end after it starts"));
        }
        Ok(Self {
            start,
            end,
            tutor_id: tutor_id.into(),
            student_id: student_id.into(),
        })
    }

    /// Touching intervals do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Frequency plus the days and times the student originally asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
    pub frequency: Frequency,
    pub days: Vec<String>,
    pub times: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedLesson {
    pub id: String,
    pub source_request_id: String,
    pub tutor_id: String,
    pub student_id: String,
    pub course_id: Option<String>,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub delivery_mode: DeliveryMode,
    pub status: LessonStatus,
    pub recurrence_pattern: RecurrencePattern,
    /// Naive slot this lesson was moved away from, if it was rescheduled.
    pub rescheduled_from: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GeneratedLesson {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes)
    }

    pub fn interval(&self) -> LessonInterval {
        LessonInterval {
            start: self.scheduled_at,
            end: self.ends_at(),
            tutor_id: self.tutor_id.clone(),
            student_id: self.student_id.clone(),
        }
    }

    pub fn was_rescheduled(&self) -> bool {
        self.rescheduled_from.is_some()
    }
}
