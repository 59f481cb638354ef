use chrono_tz::Tz;
use tracing::info;

use crate::db::repositories::notification_repository::{
    NotificationRepository, RescheduleNoticeRow,
};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::notification::RescheduleNotice;

/// Delivery channel for reschedule notices.
pub trait NotificationSink: Send + Sync {
    fn send_reschedule_notice(&self, notice: &RescheduleNotice) -> AppResult<()>;
}

/// Stores notices in an outbox table for the notification collaborator to drain.
#[derive(Clone, Debug)]
pub struct SqliteNotificationSink {
    db: DbPool,
    tz: Tz,
}

impl SqliteNotificationSink {
    pub fn new(db: DbPool, tz: Tz) -> Self {
        Self { db, tz }
    }

    pub fn list_for_recipient(&self, recipient_id: &str) -> AppResult<Vec<RescheduleNotice>> {
        self.db.with_connection(|conn| {
            NotificationRepository::list_for_recipient(conn, recipient_id)?
                .into_iter()
                .map(RescheduleNoticeRow::into_record)
                .collect()
        })
    }
}

impl NotificationSink for SqliteNotificationSink {
    fn send_reschedule_notice(&self, notice: &RescheduleNotice) -> AppResult<()> {
        let row = RescheduleNoticeRow::from_record(notice);
        self.db
            .with_connection(|conn| NotificationRepository::insert(conn, &row))?;

        info!(
            target: "app::notify",
            recipient = %notice.recipient_id,
            request_id = %notice.request_id,
            message = %notice.message(self.tz),
            "reschedule notice queued"
        );
        Ok(())
    }
}
