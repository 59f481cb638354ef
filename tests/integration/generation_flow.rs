// End-to-end lesson generation against a temporary SQLite database

use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};
use lesson_scheduler_lib::db::DbPool;
use lesson_scheduler_lib::models::lesson::{
    GeneratedLesson, LessonInterval, LessonStatus, RecurrencePattern,
};
use lesson_scheduler_lib::models::request::AcceptedRequest;
use lesson_scheduler_lib::models::schedule::{Cohort, DeliveryMode, Frequency, WeekKey};
use lesson_scheduler_lib::services::holiday_calendar::HolidayCalendar;
use lesson_scheduler_lib::services::lesson_calendar::{LessonCalendar, SqliteLessonCalendar};
use lesson_scheduler_lib::services::notification_service::SqliteNotificationSink;
use lesson_scheduler_lib::services::schedule_utils::{format_datetime, local_date};
use tempfile::tempdir;

const TZ: chrono_tz::Tz = chrono_tz::Africa::Johannesburg;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
}

fn request(id: &str, student: &str, descriptor: &str) -> AcceptedRequest {
    AcceptedRequest {
        request_id: id.to_string(),
        tutor_id: "tutor-1".to_string(),
        student_id: student.to_string(),
        course_id: None,
        subject: "Physical Sciences".to_string(),
        schedule_descriptor: descriptor.to_string(),
        term_duration_weeks: None,
    }
}

const MON_WED_TWO_WEEKS: &str =
    r#"{"days":["Mon","Wed"],"times":["16:00"],"duration":60,"startDate":"2024-02-05","termDurationWeeks":2}"#;

fn seed_lesson(path: &Path, tutor: &str, student: &str, start: DateTime<Utc>) {
    let pool = DbPool::new(path).expect("db pool");
    let calendar = SqliteLessonCalendar::new(pool);
    let lesson = GeneratedLesson {
        id: format!("seed-{tutor}-{}", start.timestamp()),
        source_request_id: format!("seed-request-{}", start.timestamp()),
        tutor_id: tutor.to_string(),
        student_id: student.to_string(),
        course_id: None,
        subject: "Accounting".to_string(),
        scheduled_at: start,
        duration_minutes: 60,
        delivery_mode: DeliveryMode::Online,
        status: LessonStatus::Scheduled,
        recurrence_pattern: RecurrencePattern {
            frequency: Frequency::Weekly,
            days: vec!["monday".to_string()],
            times: vec!["16:00".to_string()],
        },
        rescheduled_from: None,
        created_at: now(),
    };
    calendar.create_lessons(&[lesson]).expect("seed lesson");
}

fn starts(lessons: &[GeneratedLesson]) -> Vec<String> {
    lessons
        .iter()
        .map(|lesson| format_datetime(lesson.scheduled_at))
        .collect()
}

fn assert_no_overlap(mut intervals: Vec<LessonInterval>) {
    intervals.sort_by_key(|interval| interval.start);
    for pair in intervals.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "{:?} overlaps {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_two_week_mon_wed_series() {
    let dir = tempdir().expect("temp dir");
    let service = lesson_scheduler_lib::open(&dir.path().join("lessons.sqlite")).expect("service");

    let outcome = service
        .generate_at(&request("req-1", "student-1", MON_WED_TWO_WEEKS), now())
        .expect("generation");

    assert_eq!(outcome.cohort, Some(Cohort::WeekdayCohort));
    assert_eq!(
        starts(&outcome.lessons),
        vec![
            "2024-02-05T14:00:00Z",
            "2024-02-07T14:00:00Z",
            "2024-02-12T14:00:00Z",
            "2024-02-14T14:00:00Z",
        ]
    );
    for lesson in &outcome.lessons {
        let local = lesson.scheduled_at.with_timezone(&TZ);
        assert_eq!(local.format("%H:%M").to_string(), "16:00");
        assert_eq!(lesson.ends_at().with_timezone(&TZ).format("%H:%M").to_string(), "17:00");
        assert_eq!(lesson.status, LessonStatus::Scheduled);
        assert_eq!(lesson.recurrence_pattern.days, vec!["monday", "wednesday"]);
        assert!(!lesson.was_rescheduled());
    }
    assert!(outcome.notices.is_empty());
    assert!(outcome.dropped.is_empty());
}

#[test]
fn test_busy_tutor_slot_moves_one_week_and_notifies_student() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("lessons.sqlite");
    seed_lesson(
        &path,
        "tutor-1",
        "student-9",
        Utc.with_ymd_and_hms(2024, 2, 5, 14, 0, 0).unwrap(),
    );

    let service = lesson_scheduler_lib::open(&path).expect("service");
    let outcome = service
        .generate_at(&request("req-1", "student-1", MON_WED_TWO_WEEKS), now())
        .expect("generation");

    let moved = outcome
        .lessons
        .iter()
        .find(|lesson| {
            lesson.rescheduled_from == Some(Utc.with_ymd_and_hms(2024, 2, 5, 14, 0, 0).unwrap())
        })
        .expect("moved lesson");
    assert_eq!(format_datetime(moved.scheduled_at), "2024-02-12T14:00:00Z");
    assert_eq!(moved.scheduled_at.with_timezone(&TZ).weekday(), Weekday::Mon);
    assert!(!starts(&outcome.lessons).contains(&"2024-02-05T14:00:00Z".to_string()));

    let sink = SqliteNotificationSink::new(DbPool::new(&path).expect("db pool"), TZ);
    let notices = sink.list_for_recipient("student-1").expect("notices");
    let first = notices
        .iter()
        .find(|notice| format_datetime(notice.original_start) == "2024-02-05T14:00:00Z")
        .expect("notice for moved lesson");
    assert_eq!(format_datetime(first.new_start), "2024-02-12T14:00:00Z");
    assert_eq!(first.reason, "scheduling conflict");
    assert_eq!(notices.len(), outcome.notices.len());

    let calendar = SqliteLessonCalendar::new(DbPool::new(&path).expect("db pool"));
    assert_no_overlap(
        calendar
            .scheduled_lessons_for_party("tutor-1")
            .expect("tutor lessons"),
    );
    assert_no_overlap(
        calendar
            .scheduled_lessons_for_party("student-1")
            .expect("student lessons"),
    );
}

#[test]
fn test_weekday_cohort_keeps_first_two_days() {
    let dir = tempdir().expect("temp dir");
    let service = lesson_scheduler_lib::open(&dir.path().join("lessons.sqlite")).expect("service");

    let outcome = service
        .generate_at(
            &request(
                "req-1",
                "student-1",
                r#"{"days":["Mon","Wed","Fri"],"times":["16:00"],"duration":60,"startDate":"2024-02-05","termDurationWeeks":1}"#,
            ),
            now(),
        )
        .expect("generation");

    assert_eq!(outcome.cohort, Some(Cohort::WeekdayCohort));
    let weekdays: Vec<Weekday> = outcome
        .lessons
        .iter()
        .map(|lesson| lesson.scheduled_at.with_timezone(&TZ).weekday())
        .collect();
    assert_eq!(weekdays, vec![Weekday::Mon, Weekday::Wed]);
}

#[test]
fn test_saturday_and_mixed_cohorts() {
    let dir = tempdir().expect("temp dir");
    let service = lesson_scheduler_lib::open(&dir.path().join("lessons.sqlite")).expect("service");

    let saturday = service
        .generate_at(
            &request(
                "req-sat",
                "student-1",
                r#"{"days":["Saturday"],"times":["09:00"],"duration":90,"startDate":"2024-02-05","termDurationWeeks":3}"#,
            ),
            now(),
        )
        .expect("saturday generation");
    assert_eq!(saturday.cohort, Some(Cohort::SaturdayOnly));
    assert_eq!(
        starts(&saturday.lessons),
        vec![
            "2024-02-10T07:00:00Z",
            "2024-02-17T07:00:00Z",
            "2024-02-24T07:00:00Z",
        ]
    );

    let mixed = service
        .generate_at(
            &request(
                "req-mixed",
                "student-2",
                r#"{"days":["Mon","Wed","Fri","Sat"],"times":["18:00"],"duration":60,"startDate":"2024-02-05","termDurationWeeks":1}"#,
            ),
            now(),
        )
        .expect("mixed generation");
    assert_eq!(mixed.cohort, Some(Cohort::Mixed));
    assert_eq!(mixed.lessons.len(), 4);
}

#[test]
fn test_second_call_returns_existing_lessons() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("lessons.sqlite");
    let service = lesson_scheduler_lib::open(&path).expect("service");
    let req = request("req-1", "student-1", MON_WED_TWO_WEEKS);

    let first = service.generate_at(&req, now()).expect("first run");
    let second = service
        .generate_at(&req, now() + chrono::Duration::days(1))
        .expect("second run");

    assert!(!first.reused_existing);
    assert!(second.reused_existing);
    assert_eq!(
        first.lessons.iter().map(|l| &l.id).collect::<Vec<_>>(),
        second.lessons.iter().map(|l| &l.id).collect::<Vec<_>>()
    );
    assert_eq!(starts(&first.lessons), starts(&second.lessons));

    let pool = DbPool::new(&path).expect("db pool");
    let count: i64 = pool
        .with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM lessons WHERE request_id = ?1",
                ["req-1"],
                |row| row.get(0),
            )?)
        })
        .expect("count");
    assert_eq!(count, 4);
}

#[test]
fn test_easter_holidays_are_skipped() {
    let dir = tempdir().expect("temp dir");
    let service = lesson_scheduler_lib::open(&dir.path().join("lessons.sqlite")).expect("service");

    let outcome = service
        .generate_at(
            &request(
                "req-1",
                "student-1",
                r#"{"days":["Mon","Fri"],"times":["15:00"],"duration":45,"startDate":"2024-03-18","endDate":"2024-04-07"}"#,
            ),
            now(),
        )
        .expect("generation");

    let holidays = HolidayCalendar::for_years(2024, 2024);
    let dates: Vec<NaiveDate> = outcome
        .lessons
        .iter()
        .map(|lesson| local_date(TZ, lesson.scheduled_at))
        .collect();
    assert!(dates.iter().all(|date| !holidays.contains(*date)));
    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 22).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 25).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap(),
        ]
    );
}

#[test]
fn test_cap_holds_per_original_week_after_rescheduling() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("lessons.sqlite");
    for day in [5, 7, 12] {
        seed_lesson(
            &path,
            "tutor-1",
            "student-9",
            Utc.with_ymd_and_hms(2024, 2, day, 14, 0, 0).unwrap(),
        );
    }

    let service = lesson_scheduler_lib::open(&path).expect("service");
    let outcome = service
        .generate_at(
            &request(
                "req-1",
                "student-1",
                r#"{"days":["Mon","Wed"],"times":["16:00"],"duration":60,"startDate":"2024-02-05","termDurationWeeks":4}"#,
            ),
            now(),
        )
        .expect("generation");

    let mut per_week = std::collections::HashMap::new();
    for lesson in &outcome.lessons {
        let original = lesson.rescheduled_from.unwrap_or(lesson.scheduled_at);
        *per_week
            .entry(WeekKey::of(local_date(TZ, original)))
            .or_insert(0usize) += 1;
    }
    assert!(per_week.values().all(|count| *count <= 2), "{per_week:?}");
    assert!(outcome.rescheduled().count() >= 3);
}

#[test]
fn test_concurrent_runs_for_one_tutor_never_double_book() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("lessons.sqlite");
    let service = Arc::new(lesson_scheduler_lib::open(&path).expect("service"));

    let handles: Vec<_> = (1..=3)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                service.generate_at(
                    &request(
                        &format!("req-{i}"),
                        &format!("student-{i}"),
                        r#"{"days":["Mon","Wed"],"times":["16:00"],"duration":60,"startDate":"2024-02-05","termDurationWeeks":3}"#,
                    ),
                    now(),
                )
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.join().expect("thread");
        assert!(outcome.is_ok(), "generation failed: {outcome:?}");
    }

    let calendar = SqliteLessonCalendar::new(DbPool::new(&path).expect("db pool"));
    let tutor_lessons = calendar
        .scheduled_lessons_for_party("tutor-1")
        .expect("tutor lessons");
    assert!(tutor_lessons.len() >= 3);
    assert_no_overlap(tutor_lessons);
}
