pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use std::path::Path;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::services::lesson_service::LessonGenerationService;

pub use crate::error::AppError;
pub use crate::models::request::AcceptedRequest;
pub use crate::services::lesson_service::GenerationOutcome;

/// Opens (creating if needed) the lesson database and builds a generation service over it.
pub fn open(db_path: &Path) -> AppResult<LessonGenerationService> {
    let pool = DbPool::new(db_path)?;
    LessonGenerationService::from_pool(pool)
}
