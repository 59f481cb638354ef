use serde::{Deserialize, Serialize};

/// Accepted tutoring request handed over by the request workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedRequest {
    pub request_id: String,
    pub tutor_id: String,
    pub student_id: String,
    #[serde(default)]
    pub course_id: Option<String>,
    pub subject: String,
    /// Stored JSON schedule preference.
    pub schedule_descriptor: String,
    /// Overrides the descriptor's term length when present.
    #[serde(default)]
    pub term_duration_weeks: Option<u32>,
}
