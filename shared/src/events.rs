//! Domain events written to the outbox by the API and consumed by the
//! notification service.
//!
//! Every event carries the full snapshot its consumers need, so consumers
//! never read back from the API's database.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::ShippingAddress;
use crate::status::{AffiliateStatus, OrderStatus, PaymentStatus};

pub const ORDER_EVENTS_TOPIC: &str = "order-events";
pub const PAYMENT_EVENTS_TOPIC: &str = "payment-events";
pub const LEAD_EVENTS_TOPIC: &str = "lead-events";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemSnapshot {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub line_total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub subtotal: BigDecimal,
    pub discount: BigDecimal,
    pub tax: BigDecimal,
    pub shipping_fee: BigDecimal,
    pub total: BigDecimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItemSnapshot>,
    pub created_at: DateTime<Utc>,
}

impl OrderSnapshot {
    pub fn is_pre_order(&self) -> bool {
        self.shipping_address.is_pre_order()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOrderSnapshot {
    pub bulk_order_id: Uuid,
    pub contact_name: String,
    pub company_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub product_details: String,
    pub quantity: i32,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateSnapshot {
    pub affiliate_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub social_handle: Option<String>,
    pub audience_size: Option<i32>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced {
        order: OrderSnapshot,
    },
    OrderStatusChanged {
        order: OrderSnapshot,
        previous: OrderStatus,
        #[serde(default)]
        reason: Option<String>,
    },
    OrderCancelled {
        order: OrderSnapshot,
        reason: Option<String>,
        stock_restored: bool,
    },
    PaymentStatusChanged {
        order: OrderSnapshot,
        transaction_id: Uuid,
        previous: PaymentStatus,
        current: PaymentStatus,
        amount: BigDecimal,
    },
    BulkOrderRequested {
        bulk_order: BulkOrderSnapshot,
    },
    AffiliateApplied {
        affiliate: AffiliateSnapshot,
    },
    AffiliateStatusChanged {
        affiliate: AffiliateSnapshot,
        status: AffiliateStatus,
    },
}

impl DomainEvent {
    /// Name stored in `outbox_events.event_type`.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::OrderPlaced { .. } => "OrderPlaced",
            DomainEvent::OrderStatusChanged { .. } => "OrderStatusChanged",
            DomainEvent::OrderCancelled { .. } => "OrderCancelled",
            DomainEvent::PaymentStatusChanged { .. } => "PaymentStatusChanged",
            DomainEvent::BulkOrderRequested { .. } => "BulkOrderRequested",
            DomainEvent::AffiliateApplied { .. } => "AffiliateApplied",
            DomainEvent::AffiliateStatusChanged { .. } => "AffiliateStatusChanged",
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DomainEvent::OrderPlaced { order }
            | DomainEvent::OrderStatusChanged { order, .. }
            | DomainEvent::OrderCancelled { order, .. }
            | DomainEvent::PaymentStatusChanged { order, .. } => order.order_id,
            DomainEvent::BulkOrderRequested { bulk_order } => bulk_order.bulk_order_id,
            DomainEvent::AffiliateApplied { affiliate }
            | DomainEvent::AffiliateStatusChanged { affiliate, .. } => affiliate.affiliate_id,
        }
    }
}

/// Kafka topic for an outbox `event_type`, `None` for unknown types.
pub fn topic_for(event_type: &str) -> Option<&'static str> {
    match event_type {
        "OrderPlaced" | "OrderStatusChanged" | "OrderCancelled" => Some(ORDER_EVENTS_TOPIC),
        "PaymentStatusChanged" => Some(PAYMENT_EVENTS_TOPIC),
        "BulkOrderRequested" | "AffiliateApplied" | "AffiliateStatusChanged" => Some(LEAD_EVENTS_TOPIC),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate_id: event.aggregate_id(),
            occurred_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::str::FromStr;

    pub fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    pub fn order() -> OrderSnapshot {
        OrderSnapshot {
            order_id: Uuid::new_v4(),
            order_number: "ORD-0042161026".into(),
            user_id: None,
            customer_name: "Asha Rao".into(),
            customer_email: "asha@example.com".into(),
            customer_phone: Some("+91 98765 43210".into()),
            subtotal: dec("598.00"),
            discount: dec("0"),
            tax: dec("29.90"),
            shipping_fee: dec("50.00"),
            total: dec("677.90"),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: Some("upi".into()),
            shipping_address: ShippingAddress {
                full_name: "Asha Rao".into(),
                line1: "12 Lake Road".into(),
                city: "Pune".into(),
                postal_code: "411001".into(),
                country: "India".into(),
                ..ShippingAddress::default()
            },
            items: vec![OrderItemSnapshot {
                product_id: Uuid::new_v4(),
                product_name: "Assam Gold Tea 250g".into(),
                unit_price: dec("299.00"),
                quantity: 2,
                line_total: dec("598.00"),
            }],
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_type_tag() {
        let envelope = EventEnvelope::new(DomainEvent::OrderPlaced {
            order: fixtures::order(),
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event"]["type"], "order_placed");
        assert_eq!(json["event"]["order"]["status"], "pending");

        let back: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn aggregate_id_follows_the_subject() {
        let order = fixtures::order();
        let id = order.order_id;
        let event = DomainEvent::OrderCancelled {
            order,
            reason: None,
            stock_restored: true,
        };
        assert_eq!(EventEnvelope::new(event).aggregate_id, id);
    }

    #[test]
    fn topics_group_event_families() {
        assert_eq!(topic_for("OrderPlaced"), Some(ORDER_EVENTS_TOPIC));
        assert_eq!(topic_for("PaymentStatusChanged"), Some(PAYMENT_EVENTS_TOPIC));
        assert_eq!(topic_for("AffiliateApplied"), Some(LEAD_EVENTS_TOPIC));
        assert_eq!(topic_for("BulkOrderRequested"), Some(LEAD_EVENTS_TOPIC));
    }

    #[test]
    fn every_event_type_has_a_topic() {
        let order = fixtures::order();
        let events = [
            DomainEvent::OrderPlaced { order: order.clone() },
            DomainEvent::OrderStatusChanged { order: order.clone(), previous: OrderStatus::Pending, reason: None },
            DomainEvent::OrderCancelled { order: order.clone(), reason: None, stock_restored: true },
            DomainEvent::PaymentStatusChanged {
                order,
                transaction_id: Uuid::new_v4(),
                previous: PaymentStatus::Pending,
                current: PaymentStatus::Paid,
                amount: fixtures::dec("1"),
            },
        ];
        for event in &events {
            assert!(topic_for(event.event_type()).is_some(), "{}", event.event_type());
        }
    }

    #[test]
    fn unknown_event_types_have_no_topic() {
        assert_eq!(topic_for("OrderShipped"), None);
        assert_eq!(topic_for("affiliate_applied"), None);
    }
}
