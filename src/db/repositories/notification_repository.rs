use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::notification::RescheduleNotice;
use crate::services::schedule_utils::{format_datetime, parse_datetime};

#[derive(Debug, Clone)]
pub struct RescheduleNoticeRow {
    pub id: String,
    pub request_id: String,
    pub recipient_id: String,
    pub original_start: String,
    pub new_start: String,
    pub reason: String,
    pub created_at: String,
}

impl RescheduleNoticeRow {
    pub fn from_record(notice: &RescheduleNotice) -> Self {
        Self {
            id: notice.id.clone(),
            request_id: notice.request_id.clone(),
            recipient_id: notice.recipient_id.clone(),
            original_start: format_datetime(notice.original_start),
            new_start: format_datetime(notice.new_start),
            reason: notice.reason.clone(),
            created_at: format_datetime(notice.created_at),
        }
    }

    pub fn into_record(self) -> AppResult<RescheduleNotice> {
        Ok(RescheduleNotice {
            id: self.id,
            request_id: self.request_id,
            recipient_id: self.recipient_id,
            original_start: parse_datetime(&self.original_start)?,
            new_start: parse_datetime(&self.new_start)?,
            reason: self.reason,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl TryFrom<&Row<'_>> for RescheduleNoticeRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            request_id: row.get("request_id")?,
            recipient_id: row.get("recipient_id")?,
            original_start: row.get("original_start")?,
            new_start: row.get("new_start")?,
            reason: row.get("reason")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct NotificationRepository;

impl NotificationRepository {
    pub fn insert(conn: &Connection, row: &RescheduleNoticeRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO reschedule_notices (
                    id, request_id, recipient_id, original_start, new_start, reason, created_at
                ) VALUES (
                    :id, :request_id, :recipient_id, :original_start, :new_start, :reason, :created_at
                )
            "#,
            named_params! {
                ":id": row.id,
                ":request_id": row.request_id,
                ":recipient_id": row.recipient_id,
                ":original_start": row.original_start,
                ":new_start": row.new_start,
                ":reason": row.reason,
                ":created_at": row.created_at,
            },
        )?;
        Ok(())
    }

    pub fn list_for_recipient(
        conn: &Connection,
        recipient_id: &str,
    ) -> AppResult<Vec<RescheduleNoticeRow>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, request_id, recipient_id, original_start, new_start, reason, created_at
                FROM reschedule_notices
                WHERE recipient_id = ?1
                ORDER BY created_at ASC, original_start ASC
            "#,
        )?;
        let rows = stmt
            .query_map([recipient_id], |row| RescheduleNoticeRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
