use diesel::prelude::*;
use uuid::Uuid;

/// Marks an event id as handled so redelivered messages are skipped.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::processed_events)]
pub struct NewProcessedEvent<'a> {
    pub event_id: Uuid,
    pub event_type: &'a str,
    pub emails_sent: i32,
}
