use rusqlite;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("record not found")]
    NotFound,

    #[error("record conflict: {message}")]
    Conflict { message: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("invalid schedule format: {message}")]
    InvalidScheduleFormat { message: String },

    #[error("incomplete schedule: missing {missing:?}")]
    IncompleteSchedule { missing: Vec<&'static str> },

    #[error("no lessons could be generated for request {request_id}")]
    EmptyGenerationResult { request_id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn invalid_schedule_format(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::scheduler", %message, "schedule descriptor rejected");
        AppError::InvalidScheduleFormat { message }
    }

    pub fn incomplete_schedule(missing: Vec<&'static str>) -> Self {
        warn!(target: "app::scheduler", ?missing, "schedule descriptor incomplete");
        AppError::IncompleteSchedule { missing }
    }

    pub fn empty_generation_result(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        warn!(target: "app::scheduler", %request_id, "generation produced no usable slots");
        AppError::EmptyGenerationResult { request_id }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::conflict", %message, "conflict error");
        AppError::Conflict { message }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::database", "resource not found");
        AppError::NotFound
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::database", %message, "database error");
        AppError::Database { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }

    /// True for errors the caller caused by submitting a bad schedule.
    pub fn is_schedule_rejection(&self) -> bool {
        matches!(
            self,
            AppError::InvalidScheduleFormat { .. }
                | AppError::IncompleteSchedule { .. }
                | AppError::EmptyGenerationResult { .. }
        )
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("unique or constraint violation")
            }
            _ => {
                error!(target: "app::database", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}
