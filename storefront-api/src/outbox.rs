use anyhow::Result;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use rdkafka::producer::{FutureProducer, FutureRecord};
use shared::events::topic_for;
use shared::{DomainEvent, EventEnvelope};
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info};
use uuid::Uuid;
use crate::error::ApiResult;
use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

const BATCH_SIZE: i64 = 100;

/// Records an event in the caller's transaction; the processor publishes it
/// once the transaction commits.
pub async fn enqueue(conn: &mut AsyncPgConnection, event: DomainEvent) -> ApiResult<Uuid> {
    let envelope = EventEnvelope::new(event);
    let row = NewOutboxEvent::try_from(&envelope).map_err(anyhow::Error::from)?;

    diesel::insert_into(outbox_events::table)
        .values(&row)
        .execute(conn)
        .await?;

    debug!(event_id = %envelope.id, event_type = %row.event_type, "Queued outbox event");
    Ok(envelope.id)
}

pub struct OutboxProcessor {
    pool: DbPool,
    producer: FutureProducer,
    poll_interval: Duration,
}

impl OutboxProcessor {
    pub fn new(pool: DbPool, producer: FutureProducer, poll_interval: Duration) -> Self {
        Self { pool, producer, poll_interval }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.poll_interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.process_outbox_events().await {
                error!("Error processing outbox events: {}", e);
            }
        }
    }

    async fn process_outbox_events(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;

        for event in pending_batch(&mut conn).await? {
            if let Err(e) = self.publish_event(&event).await {
                error!("Failed to publish event {}: {}", event.id, e);
                continue;
            }

            mark_processed(&mut conn, event.id).await?;
            info!(event_id = %event.id, event_type = %event.event_type, "Published outbox event");
        }

        Ok(())
    }

    async fn publish_event(&self, event: &DbOutboxEvent) -> Result<()> {
        let topic = topic_for(&event.event_type)
            .ok_or_else(|| anyhow::anyhow!("No topic for event type '{}'", event.event_type))?;
        let json = serde_json::to_string(&event.event_data)?;
        let key = event.aggregate_id.to_string();
        let record = FutureRecord::to(topic)
            .payload(&json)
            .key(&key);

        self.producer.send(record, Duration::from_secs(5)).await
            .map_err(|(e, _)| anyhow::anyhow!("Failed to publish event: {}", e))?;

        Ok(())
    }
}

/// Oldest unpublished events first.
async fn pending_batch(conn: &mut AsyncPgConnection) -> Result<Vec<DbOutboxEvent>> {
    Ok(outbox_events::table
        .filter(outbox_events::processed.eq(false))
        .order(outbox_events::created_at.asc())
        .limit(BATCH_SIZE)
        .load::<DbOutboxEvent>(conn)
        .await?)
}

async fn mark_processed(conn: &mut AsyncPgConnection, id: Uuid) -> Result<()> {
    diesel::update(outbox_events::table.filter(outbox_events::id.eq(id)))
        .set(outbox_events::processed.eq(true))
        .execute(conn)
        .await?;
    Ok(())
}
