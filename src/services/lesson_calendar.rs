use tracing::{debug, info};

use crate::db::repositories::lesson_repository::{LessonRepository, LessonRow};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::lesson::{GeneratedLesson, LessonInterval};

/// Storage of committed lessons for both sides of the marketplace.
pub trait LessonCalendar: Send + Sync {
    /// Scheduled lessons where the party is tutor or student.
    fn scheduled_lessons_for_party(&self, party_id: &str) -> AppResult<Vec<LessonInterval>>;

    fn lesson_exists_for_request(&self, request_id: &str) -> AppResult<bool>;

    fn lessons_for_request(&self, request_id: &str) -> AppResult<Vec<GeneratedLesson>>;

    /// Writes all lessons or none.
    fn create_lessons(&self, lessons: &[GeneratedLesson]) -> AppResult<()>;
}

#[derive(Clone, Debug)]
pub struct SqliteLessonCalendar {
    db: DbPool,
}

impl SqliteLessonCalendar {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &DbPool {
        &self.db
    }
}

impl LessonCalendar for SqliteLessonCalendar {
    fn scheduled_lessons_for_party(&self, party_id: &str) -> AppResult<Vec<LessonInterval>> {
        self.db.with_connection(|conn| {
            LessonRepository::list_scheduled_for_party(conn, party_id)?
                .iter()
                .map(LessonRow::interval)
                .collect()
        })
    }

    fn lesson_exists_for_request(&self, request_id: &str) -> AppResult<bool> {
        self.db
            .with_connection(|conn| LessonRepository::exists_for_request(conn, request_id))
    }

    fn lessons_for_request(&self, request_id: &str) -> AppResult<Vec<GeneratedLesson>> {
        self.db.with_connection(|conn| {
            LessonRepository::list_for_request(conn, request_id)?
                .into_iter()
                .map(LessonRow::into_record)
                .collect()
        })
    }

    fn create_lessons(&self, lessons: &[GeneratedLesson]) -> AppResult<()> {
        if lessons.is_empty() {
            return Ok(());
        }

        let rows = lessons
            .iter()
            .map(LessonRow::from_record)
            .collect::<AppResult<Vec<_>>>()?;

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction()?;
        for row in &rows {
            LessonRepository::insert(&tx, row)?;
        }
        tx.commit()?;

        debug!(target: "app::db", count = rows.len(), "lesson batch committed");
        info!(
            target: "app::scheduler",
            request_id = %rows[0].request_id,
            count = rows.len(),
            "lessons persisted"
        );
        Ok(())
    }
}
