use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const RESCHEDULE_REASON: &str = "scheduling conflict";

/// Tells a student that one lesson of their series moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleNotice {
    pub id: String,
    pub request_id: String,
    pub recipient_id: String,
    pub original_start: DateTime<Utc>,
    pub new_start: DateTime<Utc>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl RescheduleNotice {
    pub fn for_conflict(
        request_id: impl Into<String>,
        recipient_id: impl Into<String>,
        original_start: DateTime<Utc>,
        new_start: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.into(),
            recipient_id: recipient_id.into(),
            original_start,
            new_start,
            reason: RESCHEDULE_REASON.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn message(&self, tz: Tz) -> String {
        let old = self.original_start.with_timezone(&tz);
        let new = self.new_start.with_timezone(&tz);
        format!(
            "Your lesson on {} at {} was moved to {} at {} due to a {}.",
            old.format("%A %-d %B %Y"),
            old.format("%H:%M"),
            new.format("%A %-d %B %Y"),
            new.format("%H:%M"),
            self.reason
        )
    }
}
