use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::lesson::{GeneratedLesson, LessonInterval, LessonStatus, RecurrencePattern};
use crate::services::schedule_utils::{format_datetime, parse_datetime};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        request_id,
        tutor_id,
        student_id,
        course_id,
        subject,
        scheduled_at,
        ends_at,
        duration_minutes,
        delivery_mode,
        status,
        recurrence_pattern,
        rescheduled_from,
        created_at
    FROM lessons
"#;

#[derive(Debug, Clone)]
pub struct LessonRow {
    pub id: String,
    pub request_id: String,
    pub tutor_id: String,
    pub student_id: String,
    pub course_id: Option<String>,
    pub subject: String,
    pub scheduled_at: String,
    pub ends_at: String,
    pub duration_minutes: i64,
    pub delivery_mode: String,
    pub status: String,
    pub recurrence_pattern: String,
    pub rescheduled_from: Option<String>,
    pub created_at: String,
}

impl LessonRow {
    pub fn from_record(lesson: &GeneratedLesson) -> AppResult<Self> {
        Ok(Self {
            id: lesson.id.clone(),
            request_id: lesson.source_request_id.clone(),
            tutor_id: lesson.tutor_id.clone(),
            student_id: lesson.student_id.clone(),
            course_id: lesson.course_id.clone(),
            subject: lesson.subject.clone(),
            scheduled_at: format_datetime(lesson.scheduled_at),
            ends_at: format_datetime(lesson.ends_at()),
            duration_minutes: lesson.duration_minutes,
            delivery_mode: lesson.delivery_mode.as_str().to_string(),
            status: lesson.status.as_str().to_string(),
            recurrence_pattern: serde_json::to_string(&lesson.recurrence_pattern)?,
            rescheduled_from: lesson.rescheduled_from.map(format_datetime),
            created_at: format_datetime(lesson.created_at),
        })
    }

    pub fn into_record(self) -> AppResult<GeneratedLesson> {
        let recurrence_pattern: RecurrencePattern = serde_json::from_str(&self.recurrence_pattern)?;
        Ok(GeneratedLesson {
            id: self.id,
            source_request_id: self.request_id,
            tutor_id: self.tutor_id,
            student_id: self.student_id,
            course_id: self.course_id,
            subject: self.subject,
            scheduled_at: parse_datetime(&self.scheduled_at)?,
            duration_minutes: self.duration_minutes,
            delivery_mode: self.delivery_mode.parse()?,
            status: self.status.parse::<LessonStatus>()?,
            recurrence_pattern,
            rescheduled_from: self
                .rescheduled_from
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }

    pub fn interval(&self) -> AppResult<LessonInterval> {
        LessonInterval::new(
            parse_datetime(&self.scheduled_at)?,
            parse_datetime(&self.ends_at)?,
            self.tutor_id.clone(),
            self.student_id.clone(),
        )
    }
}

impl TryFrom<&Row<'_>> for LessonRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            request_id: row.get("request_id")?,
            tutor_id: row.get("tutor_id")?,
            student_id: row.get("student_id")?,
            course_id: row.get("course_id")?,
            subject: row.get("subject")?,
            scheduled_at: row.get("scheduled_at")?,
            ends_at: row.get("ends_at")?,
            duration_minutes: row.get("duration_minutes")?,
            delivery_mode: row.get("delivery_mode")?,
            status: row.get("status")?,
            recurrence_pattern: row.get("recurrence_pattern")?,
            rescheduled_from: row.get("rescheduled_from")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct LessonRepository;

impl LessonRepository {
    /// Caller owns the transaction when inserting a batch.
    pub fn insert(conn: &Connection, row: &LessonRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO lessons (
                    id, request_id, tutor_id, student_id, course_id, subject,
                    scheduled_at, ends_at, duration_minutes, delivery_mode, status,
                    recurrence_pattern, rescheduled_from, created_at
                ) VALUES (
                    :id, :request_id, :tutor_id, :student_id, :course_id, :subject,
                    :scheduled_at, :ends_at, :duration_minutes, :delivery_mode, :status,
                    :recurrence_pattern, :rescheduled_from, :created_at
                )
            "#,
            named_params! {
                ":id": row.id,
                ":request_id": row.request_id,
                ":tutor_id": row.tutor_id,
                ":student_id": row.student_id,
                ":course_id": row.course_id,
                ":subject": row.subject,
                ":scheduled_at": row.scheduled_at,
                ":ends_at": row.ends_at,
                ":duration_minutes": row.duration_minutes,
                ":delivery_mode": row.delivery_mode,
                ":status": row.status,
                ":recurrence_pattern": row.recurrence_pattern,
                ":rescheduled_from": row.rescheduled_from,
                ":created_at": row.created_at,
            },
        )?;
        Ok(())
    }

    pub fn list_for_request(conn: &Connection, request_id: &str) -> AppResult<Vec<LessonRow>> {
        let sql = format!("{BASE_SELECT} WHERE request_id = ?1 ORDER BY scheduled_at ASC, id ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([request_id], |row| LessonRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Scheduled lessons where the party is either tutor or student.
    pub fn list_scheduled_for_party(conn: &Connection, party_id: &str) -> AppResult<Vec<LessonRow>> {
        let sql = format!(
            "{BASE_SELECT} WHERE (tutor_id = ?1 OR student_id = ?1) AND status = 'scheduled' \
             ORDER BY scheduled_at ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([party_id], |row| LessonRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn exists_for_request(conn: &Connection, request_id: &str) -> AppResult<bool> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM lessons WHERE request_id = ?1)",
            [request_id],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    pub fn update_status(conn: &Connection, id: &str, status: LessonStatus) -> AppResult<bool> {
        let affected = conn.execute(
            "UPDATE lessons SET status = ?2 WHERE id = ?1",
            [id, status.as_str()],
        )?;
        Ok(affected > 0)
    }
}
