use anyhow::Result;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use futures::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use shared::EventEnvelope;
use std::str::Utf8Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dispatch::{deliver, emails_for, Recipients};
use crate::mailer::Mailer;
use crate::models::NewProcessedEvent;
use crate::schema::processed_events;

type DbPool = Pool<AsyncPgConnection>;

const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(60);

/// Outcome of one attempt at a consumed message.
#[derive(Debug)]
pub enum Delivery {
    Handled,
    /// Never readable, so retrying cannot help.
    Unreadable(String),
    /// Redelivered until it succeeds.
    Failed(anyhow::Error),
}

impl Delivery {
    pub fn should_commit(&self) -> bool {
        !matches!(self, Delivery::Failed(_))
    }
}

pub fn decode(payload: Option<Result<&str, Utf8Error>>) -> std::result::Result<EventEnvelope, String> {
    match payload {
        Some(Ok(json)) => serde_json::from_str(json).map_err(|e| format!("unreadable event: {e}")),
        Some(Err(e)) => Err(format!("payload is not UTF-8: {e}")),
        None => Err("empty message".to_string()),
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(RETRY_MAX)
}

pub struct EventHandler {
    pool: DbPool,
    mailer: Arc<dyn Mailer>,
    recipients: Arc<Recipients>,
}

impl EventHandler {
    pub fn new(pool: DbPool, mailer: Arc<dyn Mailer>, recipients: Recipients) -> Self {
        Self {
            pool,
            mailer,
            recipients: Arc::new(recipients),
        }
    }

    pub async fn run(&self, consumer: StreamConsumer) {
        let mut message_stream = consumer.stream();

        while let Some(message) = message_stream.next().await {
            let m = match message {
                Ok(m) => m,
                Err(e) => {
                    error!("Error receiving message: {}", e);
                    continue;
                }
            };

            let mut backoff = RETRY_BASE;
            let envelope = decode(m.payload_view::<str>());
            loop {
                let delivery = match &envelope {
                    Ok(envelope) => match self.handle_event(envelope).await {
                        Ok(()) => Delivery::Handled,
                        Err(e) => Delivery::Failed(e),
                    },
                    Err(reason) => Delivery::Unreadable(reason.clone()),
                };

                match &delivery {
                    Delivery::Handled => {}
                    Delivery::Unreadable(reason) => {
                        warn!(topic = m.topic(), offset = m.offset(), "Skipping message: {}", reason)
                    }
                    Delivery::Failed(e) => error!(
                        topic = m.topic(),
                        offset = m.offset(),
                        retry_in_secs = backoff.as_secs(),
                        "Error handling event: {}",
                        e
                    ),
                }

                if delivery.should_commit() {
                    if let Err(e) = consumer.commit_message(&m, CommitMode::Async) {
                        error!("Error committing message: {}", e);
                    }
                    break;
                }

                time::sleep(backoff).await;
                backoff = next_backoff(backoff);
            }
        }
    }

    async fn handle_event(&self, envelope: &EventEnvelope) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let event_type = envelope.event.event_type();

        if self.already_processed(&mut conn, envelope.id).await? {
            info!(event_id = %envelope.id, event_type, "Event already processed, skipping");
            return Ok(());
        }

        let recipients = Arc::clone(&self.recipients);
        let event = envelope.event.clone();
        let emails = tokio::task::spawn_blocking(move || emails_for(&event, &recipients)).await?;

        let sent = deliver(self.mailer.as_ref(), &emails).await;
        if sent < emails.len() {
            warn!(event_id = %envelope.id, event_type, sent, total = emails.len(), "Some emails were not delivered");
        }

        self.store_processed_event(&mut conn, envelope.id, event_type, sent).await?;
        info!(event_id = %envelope.id, event_type, aggregate_id = %envelope.aggregate_id, sent, "Event processed");

        Ok(())
    }

    async fn already_processed(&self, conn: &mut AsyncPgConnection, event_id: Uuid) -> Result<bool> {
        let exists = diesel::select(diesel::dsl::exists(
            processed_events::table.filter(processed_events::event_id.eq(event_id)),
        ))
        .get_result::<bool>(conn)
        .await?;
        Ok(exists)
    }

    async fn store_processed_event(&self, conn: &mut AsyncPgConnection, event_id: Uuid, event_type: &str, sent: usize) -> Result<()> {
        let processed_event = NewProcessedEvent {
            event_id,
            event_type,
            emails_sent: i32::try_from(sent).unwrap_or(i32::MAX),
        };

        diesel::insert_into(processed_events::table)
            .values(&processed_event)
            .on_conflict_do_nothing()
            .execute(conn)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{AffiliateSnapshot, DomainEvent};

    fn envelope_json() -> String {
        let event = DomainEvent::AffiliateApplied {
            affiliate: AffiliateSnapshot {
                affiliate_id: Uuid::new_v4(),
                name: "Meera".into(),
                email: "meera@blog.example".into(),
                phone: None,
                website: None,
                social_handle: None,
                audience_size: None,
                message: None,
            },
        };
        serde_json::to_string(&EventEnvelope::new(event)).unwrap()
    }

    #[test]
    fn failed_events_are_not_committed() {
        assert!(Delivery::Handled.should_commit());
        assert!(Delivery::Unreadable("empty message".into()).should_commit());
        assert!(!Delivery::Failed(anyhow::anyhow!("pool timed out")).should_commit());
    }

    #[test]
    fn decodes_envelopes_and_names_unreadable_payloads() {
        let json = envelope_json();
        let envelope = decode(Some(Ok(json.as_str()))).unwrap();
        assert_eq!(envelope.event.event_type(), "AffiliateApplied");

        assert_eq!(decode(None).unwrap_err(), "empty message");
        assert!(decode(Some(Ok("{\"type\":\"nope\"}"))).unwrap_err().starts_with("unreadable event"));

        let invalid = [0xff_u8, 0xfe];
        let utf8_error = std::str::from_utf8(&invalid).unwrap_err();
        assert!(decode(Some(Err(utf8_error))).unwrap_err().starts_with("payload is not UTF-8"));
    }

    #[test]
    fn retry_backoff_doubles_up_to_a_minute() {
        assert_eq!(next_backoff(RETRY_BASE), Duration::from_secs(2));
        assert_eq!(next_backoff(Duration::from_secs(40)), RETRY_MAX);
        assert_eq!(next_backoff(RETRY_MAX), RETRY_MAX);
    }
}
