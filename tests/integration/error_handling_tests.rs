// Rejections, empty results and storage conflicts

use chrono::{DateTime, Duration, TimeZone, Utc};
use lesson_scheduler_lib::db::repositories::lesson_repository::LessonRepository;
use lesson_scheduler_lib::db::DbPool;
use lesson_scheduler_lib::error::AppError;
use lesson_scheduler_lib::models::lesson::{GeneratedLesson, LessonStatus, RecurrencePattern};
use lesson_scheduler_lib::models::request::AcceptedRequest;
use lesson_scheduler_lib::models::schedule::{DeliveryMode, Frequency};
use lesson_scheduler_lib::services::lesson_calendar::{LessonCalendar, SqliteLessonCalendar};
use lesson_scheduler_lib::services::lesson_service::LessonGenerationService;
use lesson_scheduler_lib::services::schedule_utils::format_datetime;
use tempfile::tempdir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
}

fn setup() -> (LessonGenerationService, DbPool, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("lessons.sqlite");
    let pool = DbPool::new(&path).expect("db pool");
    let service = LessonGenerationService::from_pool(pool.clone()).expect("service");
    (service, pool, dir)
}

fn request(descriptor: &str) -> AcceptedRequest {
    AcceptedRequest {
        request_id: "req-1".to_string(),
        tutor_id: "tutor-1".to_string(),
        student_id: "student-1".to_string(),
        course_id: None,
        subject: "Geography".to_string(),
        schedule_descriptor: descriptor.to_string(),
        term_duration_weeks: None,
    }
}

fn lesson_count(pool: &DbPool) -> i64 {
    pool.with_connection(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM lessons", [], |row| row.get(0))?)
    })
    .expect("count")
}

fn lesson(id: &str, student: &str, start: DateTime<Utc>) -> GeneratedLesson {
    GeneratedLesson {
        id: id.to_string(),
        source_request_id: format!("request-{id}"),
        tutor_id: "tutor-1".to_string(),
        student_id: student.to_string(),
        course_id: None,
        subject: "History".to_string(),
        scheduled_at: start,
        duration_minutes: 60,
        delivery_mode: DeliveryMode::InPerson,
        status: LessonStatus::Scheduled,
        recurrence_pattern: RecurrencePattern {
            frequency: Frequency::Weekly,
            days: vec!["monday".to_string()],
            times: vec!["16:00".to_string()],
        },
        rescheduled_from: None,
        created_at: now(),
    }
}

#[test]
fn test_undecodable_descriptor_is_rejected() {
    let (service, pool, _dir) = setup();

    for descriptor in [
        "definitely not json",
        r#"{"days":["Mon"],"times":["4pm-ish"],"duration":60}"#,
        r#"{"days":["Mon"],"times":["16:00"],"duration":60,"deliveryMode":"carrier pigeon"}"#,
    ] {
        let err = service
            .generate_at(&request(descriptor), now())
            .expect_err("descriptor should be rejected");
        assert!(
            matches!(err, AppError::InvalidScheduleFormat { .. }),
            "unexpected error for {descriptor}: {err:?}"
        );
        assert!(err.is_schedule_rejection());
    }
    assert_eq!(lesson_count(&pool), 0);
}

#[test]
fn test_incomplete_descriptor_names_missing_fields() {
    let (service, pool, _dir) = setup();

    let err = service
        .generate_at(&request(r#"{"days":["Mon"]}"#), now())
        .expect_err("incomplete descriptor");
    match err {
        AppError::IncompleteSchedule { missing } => assert_eq!(missing, vec!["times", "duration"]),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(lesson_count(&pool), 0);
}

#[test]
fn test_term_without_matching_day_is_empty() {
    let (service, pool, _dir) = setup();

    // Tuesday to Thursday, Mondays only
    let err = service
        .generate_at(
            &request(
                r#"{"days":["Mon"],"times":["16:00"],"duration":60,"startDate":"2024-02-06","endDate":"2024-02-08"}"#,
            ),
            now(),
        )
        .expect_err("empty generation");
    assert!(matches!(err, AppError::EmptyGenerationResult { ref request_id } if request_id == "req-1"));
    assert_eq!(lesson_count(&pool), 0);
}

#[test]
fn test_term_entirely_in_the_past_is_empty() {
    let (service, _pool, _dir) = setup();

    let err = service
        .generate_at(
            &request(
                r#"{"days":["Mon","Wed"],"times":["16:00"],"duration":60,"startDate":"2024-02-05","termDurationWeeks":2}"#,
            ),
            now() + Duration::days(60),
        )
        .expect_err("empty generation");
    assert!(matches!(err, AppError::EmptyGenerationResult { .. }));
}

#[test]
fn test_duplicate_tutor_slot_fails_whole_batch() {
    let (_service, pool, _dir) = setup();
    let calendar = SqliteLessonCalendar::new(pool.clone());
    let start = Utc.with_ymd_and_hms(2024, 2, 5, 14, 0, 0).unwrap();

    let err = calendar
        .create_lessons(&[
            lesson("a", "student-1", start - Duration::days(7)),
            lesson("b", "student-1", start),
            lesson("c", "student-2", start),
        ])
        .expect_err("unique slot violation");
    assert!(matches!(err, AppError::Conflict { .. }));
    assert_eq!(lesson_count(&pool), 0);
}

#[test]
fn test_cancelled_lesson_frees_its_slot() {
    let (service, pool, _dir) = setup();
    let calendar = SqliteLessonCalendar::new(pool.clone());
    let start = Utc.with_ymd_and_hms(2024, 2, 5, 14, 0, 0).unwrap();
    calendar
        .create_lessons(&[lesson("old", "student-7", start)])
        .expect("seed");
    let updated = pool
        .with_connection(|conn| LessonRepository::update_status(conn, "old", LessonStatus::Cancelled))
        .expect("cancel");
    assert!(updated);

    let outcome = service
        .generate_at(
            &request(
                r#"{"days":["Mon"],"times":["16:00"],"duration":60,"startDate":"2024-02-05","termDurationWeeks":1}"#,
            ),
            now(),
        )
        .expect("generation");
    assert_eq!(outcome.lessons.len(), 1);
    assert_eq!(format_datetime(outcome.lessons[0].scheduled_at), "2024-02-05T14:00:00Z");
    assert!(outcome.notices.is_empty());
}

#[test]
fn test_missing_parties_are_validation_errors() {
    let (service, _pool, _dir) = setup();
    let mut req = request(r#"{"days":["Mon"],"times":["16:00"],"duration":60}"#);
    req.student_id = String::new();

    let err = service.generate_at(&req, now()).expect_err("validation");
    match err {
        AppError::Validation { details, .. } => {
            let details = details.expect("details");
            assert_eq!(details["missing"], serde_json::json!(["studentId"]));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
