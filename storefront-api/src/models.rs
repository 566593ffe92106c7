use anyhow::Context;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared::*;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::products)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub stock_quantity: i32,
    pub in_stock: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::orders)]
pub struct Order {
    pub id: Uuid,
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
    pub status: String,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub shipping_address: serde_json::Value,
    pub is_pre_order: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrder {
    pub id: Uuid,
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
    pub status: String,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub shipping_address: serde_json::Value,
    pub is_pre_order: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(belongs_to(Order))]
#[diesel(table_name = crate::schema::order_items)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub line_total: BigDecimal,
    /// Zero-based line number in the order as placed.
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct NewOrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub line_total: BigDecimal,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn order_status(&self) -> anyhow::Result<OrderStatus> {
        Ok(self.status.parse()?)
    }

    pub fn payment_state(&self) -> anyhow::Result<PaymentStatus> {
        Ok(self.payment_status.parse()?)
    }

    /// Event/invoice view of the order.
    pub fn snapshot(&self, items: &[OrderItem]) -> anyhow::Result<OrderSnapshot> {
        let shipping_address: ShippingAddress = serde_json::from_value(self.shipping_address.clone())
            .with_context(|| format!("order {} has an unreadable shipping address", self.id))?;

        Ok(OrderSnapshot {
            order_id: self.id,
            order_number: self.order_number.clone(),
            user_id: self.user_id,
            customer_name: self.customer_name.clone(),
            customer_email: self.customer_email.clone(),
            customer_phone: self.customer_phone.clone(),
            subtotal: self.subtotal.clone(),
            discount: self.discount.clone(),
            tax: self.tax.clone(),
            shipping_fee: self.shipping_fee.clone(),
            total: self.total.clone(),
            status: self.order_status()?,
            payment_status: self.payment_state()?,
            payment_method: self.payment_method.clone(),
            shipping_address,
            items: items
                .iter()
                .map(|item| OrderItemSnapshot {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    unit_price: item.unit_price.clone(),
                    quantity: item.quantity,
                    line_total: item.line_total.clone(),
                })
                .collect(),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::transactions)]
pub struct Transaction {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub reference: Option<String>,
    pub amount: BigDecimal,
    pub provider: Option<String>,
    pub payment_method: Option<String>,
    pub status: String,
    pub provider_payload: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::transactions)]
pub struct NewTransaction {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub reference: Option<String>,
    pub amount: BigDecimal,
    pub provider: Option<String>,
    pub payment_method: Option<String>,
    pub status: String,
    pub provider_payload: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn payment_status(&self) -> anyhow::Result<PaymentStatus> {
        Ok(self.status.parse()?)
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::banners)]
pub struct Banner {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::banners)]
#[diesel(treat_none_as_null = true)]
pub struct BannerValues {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::bulk_orders)]
pub struct BulkOrder {
    pub id: Uuid,
    pub contact_name: String,
    pub company_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub product_details: String,
    pub quantity: i32,
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::bulk_orders)]
pub struct NewBulkOrder {
    pub id: Uuid,
    pub contact_name: String,
    pub company_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub product_details: String,
    pub quantity: i32,
    pub message: Option<String>,
    pub status: String,
}

impl From<&NewBulkOrder> for BulkOrderSnapshot {
    fn from(lead: &NewBulkOrder) -> Self {
        Self {
            bulk_order_id: lead.id,
            contact_name: lead.contact_name.clone(),
            company_name: lead.company_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            product_details: lead.product_details.clone(),
            quantity: lead.quantity,
            message: lead.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::affiliates)]
pub struct Affiliate {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub social_handle: Option<String>,
    pub audience_size: Option<i32>,
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::affiliates)]
pub struct NewAffiliate {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub social_handle: Option<String>,
    pub audience_size: Option<i32>,
    pub message: Option<String>,
    pub status: String,
}

impl From<&NewAffiliate> for AffiliateSnapshot {
    fn from(affiliate: &NewAffiliate) -> Self {
        Self {
            affiliate_id: affiliate.id,
            name: affiliate.name.clone(),
            email: affiliate.email.clone(),
            phone: affiliate.phone.clone(),
            website: affiliate.website.clone(),
            social_handle: affiliate.social_handle.clone(),
            audience_size: affiliate.audience_size,
            message: affiliate.message.clone(),
        }
    }
}

impl From<&Affiliate> for AffiliateSnapshot {
    fn from(affiliate: &Affiliate) -> Self {
        Self {
            affiliate_id: affiliate.id,
            name: affiliate.name.clone(),
            email: affiliate.email.clone(),
            phone: affiliate.phone.clone(),
            website: affiliate.website.clone(),
            social_handle: affiliate.social_handle.clone(),
            audience_size: affiliate.audience_size,
            message: affiliate.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::admin_notifications)]
pub struct AdminNotification {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub reference_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::admin_notifications)]
pub struct NewAdminNotification {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::outbox_events)]
pub struct DbOutboxEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::outbox_events)]
pub struct NewOutboxEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
}

impl TryFrom<&EventEnvelope> for NewOutboxEvent {
    type Error = serde_json::Error;

    fn try_from(envelope: &EventEnvelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id,
            aggregate_id: envelope.aggregate_id,
            event_type: envelope.event.event_type().to_string(),
            event_data: serde_json::to_value(envelope)?,
        })
    }
}
