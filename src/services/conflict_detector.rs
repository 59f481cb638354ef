use chrono::{DateTime, Utc};

use crate::models::lesson::LessonInterval;
use crate::services::schedule_utils::overlaps;

/// Snapshot of one party's scheduled lessons, sorted by start.
#[derive(Debug, Clone, Default)]
pub struct CommittedLessonSet {
    intervals: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

impl CommittedLessonSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_intervals<'a, I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = &'a LessonInterval>,
    {
        let mut set = Self::new();
        for interval in intervals {
            set.insert(interval.start, interval.end);
        }
        set
    }

    pub fn insert(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        let idx = self.intervals.partition_point(|(s, _)| *s <= start);
        self.intervals.insert(idx, (start, end));
    }

    pub fn conflicts(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        // Anything starting at or after `end` cannot overlap.
        let upper = self.intervals.partition_point(|(s, _)| *s < end);
        self.intervals[..upper]
            .iter()
            .any(|(s, e)| overlaps(*s, *e, start, end))
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConflictCheck {
    pub tutor: bool,
    pub student: bool,
    /// Collides with a lesson already accepted earlier in the same run.
    pub this_run: bool,
}

impl ConflictCheck {
    pub fn is_free(&self) -> bool {
        !(self.tutor || self.student || self.this_run)
    }
}

/// Checks candidate intervals against both parties for one generation run.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    tutor: CommittedLessonSet,
    student: CommittedLessonSet,
    accepted: CommittedLessonSet,
}

impl ConflictDetector {
    pub fn new(tutor: CommittedLessonSet, student: CommittedLessonSet) -> Self {
        Self {
            tutor,
            student,
            accepted: CommittedLessonSet::new(),
        }
    }

    pub fn check(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> ConflictCheck {
        ConflictCheck {
            tutor: self.tutor.conflicts(start, end),
            student: self.student.conflicts(start, end),
            this_run: self.accepted.conflicts(start, end),
        }
    }

    pub fn is_free(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.check(start, end).is_free()
    }

    /// Records an accepted slot; it binds both parties for the rest of the run.
    pub fn accept(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.accepted.insert(start, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, hour, 0, 0).unwrap()
    }

    fn lesson(day: u32, hour: u32) -> LessonInterval {
        LessonInterval::new(at(day, hour), at(day, hour) + Duration::hours(1), "tutor", "student")
            .unwrap()
    }

    #[test]
    fn test_committed_set_detects_overlap() {
        let lessons = vec![lesson(5, 14), lesson(5, 9), lesson(7, 14)];
        let set = CommittedLessonSet::from_intervals(&lessons);

        assert_eq!(set.len(), 3);
        assert!(set.conflicts(at(5, 14), at(5, 15)));
        assert!(set.conflicts(at(5, 13) + Duration::minutes(30), at(5, 14) + Duration::minutes(30)));
        assert!(!set.conflicts(at(5, 15), at(5, 16)));
        assert!(!set.conflicts(at(5, 13), at(5, 14)));
        assert!(!set.conflicts(at(6, 14), at(6, 15)));
    }

    #[test]
    fn test_long_committed_lesson_is_found() {
        let mut set = CommittedLessonSet::new();
        set.insert(at(5, 8), at(5, 18));
        set.insert(at(5, 12), at(5, 13));
        assert!(set.conflicts(at(5, 16), at(5, 17)));
    }

    #[test]
    fn test_detector_reports_each_party() {
        let tutor = CommittedLessonSet::from_intervals(&[lesson(5, 14)]);
        let student = CommittedLessonSet::from_intervals(&[lesson(7, 14)]);
        let mut detector = ConflictDetector::new(tutor, student);

        let check = detector.check(at(5, 14), at(5, 15));
        assert!(check.tutor && !check.student);
        assert!(!check.is_free());

        let check = detector.check(at(7, 14), at(7, 15));
        assert!(!check.tutor && check.student);

        assert!(detector.is_free(at(6, 14), at(6, 15)));
        detector.accept(at(6, 14), at(6, 15));
        let check = detector.check(at(6, 14), at(6, 15));
        assert!(check.this_run);
    }
}
