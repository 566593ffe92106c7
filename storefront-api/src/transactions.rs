//! Payment-lifecycle records. An order's `payment_status` always mirrors
//! its linked transaction.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use num_traits::Zero;
use serde::Deserialize;
use shared::validation::is_blank;
use shared::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{AppState, Page, Pagination};
use crate::error::{ApiError, ApiResult};
use crate::models::*;
use crate::outbox;
use crate::orders::load_items;
use crate::schema::{orders, transactions};

/// Refuses to link a transaction that already pays for another order.
pub fn ensure_linkable(existing: &Transaction, order: &Order) -> ApiResult<()> {
    match (existing.order_id, existing.reference.as_deref()) {
        (Some(owner), reference) if owner != order.id => Err(ApiError::conflict(format!(
            "payment reference {} belongs to another order",
            reference.unwrap_or_default()
        ))),
        _ => Ok(()),
    }
}

/// The payment status `order` has to take to mirror `transaction`, when
/// the two differ.
pub fn status_to_mirror<'a>(order: &Order, transaction: &'a Transaction) -> Option<&'a str> {
    (transaction.status != order.payment_status).then_some(transaction.status.as_str())
}

fn pending_for(order: &Order) -> NewTransaction {
    NewTransaction {
        id: Uuid::new_v4(),
        order_id: Some(order.id),
        reference: order.payment_reference.clone(),
        amount: order.total.clone(),
        provider: None,
        payment_method: order.payment_method.clone(),
        status: PaymentStatus::Pending.as_str().to_string(),
        provider_payload: None,
        paid_at: None,
    }
}

/// Links the order to a transaction a payment webhook already recorded
/// under the same reference, or opens a pending one.
pub async fn attach_to_order(conn: &mut AsyncPgConnection, order: &Order) -> ApiResult<Transaction> {
    if let Some(reference) = order.payment_reference.as_deref() {
        let existing = transactions::table
            .filter(transactions::reference.eq(reference))
            .for_update()
            .first::<Transaction>(conn)
            .await
            .optional()?;

        if let Some(existing) = existing {
            ensure_linkable(&existing, order)?;
            if existing.amount != order.total {
                warn!(
                    transaction_id = %existing.id,
                    order_number = %order.order_number,
                    paid = %existing.amount,
                    total = %order.total,
                    "Linked payment amount differs from order total"
                );
            }

            let linked = diesel::update(transactions::table.find(existing.id))
                .set((
                    transactions::order_id.eq(order.id),
                    transactions::payment_method.eq(existing.payment_method.clone().or(order.payment_method.clone())),
                    transactions::updated_at.eq(Utc::now()),
                ))
                .get_result::<Transaction>(conn)
                .await?;

            info!(transaction_id = %linked.id, order_id = %order.id, status = %linked.status, "Linked existing payment to order");
            return Ok(linked);
        }
    }

    Ok(diesel::insert_into(transactions::table)
        .values(&pending_for(order))
        .get_result::<Transaction>(conn)
        .await?)
}

/// Moves a transaction to `next`, mirrors the status onto its order and
/// queues a `PaymentStatusChanged` event. Re-applying the current status is
/// a no-op.
async fn apply_status(
    conn: &mut AsyncPgConnection,
    transaction: Transaction,
    next: PaymentStatus,
    payload: Option<serde_json::Value>,
) -> ApiResult<Transaction> {
    let previous = transaction.payment_status()?;
    if previous == next {
        return Ok(transaction);
    }
    if !previous.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "payment cannot move from {previous} to {next}"
        )));
    }

    let now = Utc::now();
    let paid_at = if next == PaymentStatus::Paid { Some(now) } else { transaction.paid_at };
    let refunded_at = if next == PaymentStatus::Refunded { Some(now) } else { transaction.refunded_at };

    let updated = diesel::update(transactions::table.find(transaction.id))
        .set((
            transactions::status.eq(next.as_str()),
            transactions::paid_at.eq(paid_at),
            transactions::refunded_at.eq(refunded_at),
            transactions::provider_payload.eq(payload.or(transaction.provider_payload)),
            transactions::updated_at.eq(now),
        ))
        .get_result::<Transaction>(conn)
        .await?;

    if let Some(order_id) = updated.order_id {
        let order = diesel::update(orders::table.find(order_id))
            .set((orders::payment_status.eq(next.as_str()), orders::updated_at.eq(now)))
            .get_result::<Order>(conn)
            .await?;
        let items = load_items(conn, order_id).await?;

        outbox::enqueue(
            conn,
            DomainEvent::PaymentStatusChanged {
                order: order.snapshot(&items)?,
                transaction_id: updated.id,
                previous,
                current: next,
                amount: updated.amount.clone(),
            },
        )
        .await?;
    }

    info!(transaction_id = %updated.id, from = %previous, to = %next, "Payment status changed");
    Ok(updated)
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentWebhook {
    pub reference: String,
    pub status: PaymentStatus,
    pub amount: BigDecimal,
    pub provider: Option<String>,
    pub payment_method: Option<String>,
    pub payload: Option<serde_json::Value>,
}

impl PaymentWebhook {
    pub fn validate(&self) -> ApiResult<()> {
        if is_blank(&self.reference) {
            return Err(ApiError::validation("reference is required"));
        }
        if self.amount < BigDecimal::zero() {
            return Err(ApiError::validation("amount must not be negative"));
        }
        Ok(())
    }
}

async fn record_webhook(conn: &mut AsyncPgConnection, webhook: PaymentWebhook) -> ApiResult<Transaction> {
    let reference = webhook.reference.trim().to_string();

    let existing = transactions::table
        .filter(transactions::reference.eq(&reference))
        .for_update()
        .first::<Transaction>(conn)
        .await
        .optional()?;

    match existing {
        Some(transaction) => apply_status(conn, transaction, webhook.status, webhook.payload).await,
        None => {
            // The order may not exist yet; checkout links it by reference.
            let transaction = NewTransaction {
                id: Uuid::new_v4(),
                order_id: None,
                reference: Some(reference),
                amount: money::round2(&webhook.amount),
                provider: webhook.provider,
                payment_method: webhook.payment_method,
                status: webhook.status.as_str().to_string(),
                provider_payload: webhook.payload,
                paid_at: (webhook.status == PaymentStatus::Paid).then(Utc::now),
            };

            Ok(diesel::insert_into(transactions::table)
                .values(&transaction)
                .get_result::<Transaction>(conn)
                .await?)
        }
    }
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(webhook): Json<PaymentWebhook>,
) -> ApiResult<Json<Transaction>> {
    webhook.validate()?;
    info!(reference = %webhook.reference, status = %webhook.status, "Payment webhook received");

    let mut conn = state.pool.get().await?;
    let transaction = conn
        .transaction::<_, ApiError, _>(|conn| Box::pin(record_webhook(conn, webhook)))
        .await?;

    Ok(Json(transaction))
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTransactionStatusRequest {
    pub status: PaymentStatus,
    pub payload: Option<serde_json::Value>,
}

pub async fn update_transaction_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTransactionStatusRequest>,
) -> ApiResult<Json<Transaction>> {
    let mut conn = state.pool.get().await?;

    let transaction = conn
        .transaction::<_, ApiError, _>(|conn| {
            Box::pin(async move {
                let current = transactions::table
                    .find(id)
                    .for_update()
                    .first::<Transaction>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::not_found(format!("transaction {id}")))?;
                apply_status(conn, current, request.status, request.payload).await
            })
        })
        .await?;

    Ok(Json(transaction))
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionQuery {
    pub status: Option<PaymentStatus>,
    pub order_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<Page<Transaction>>> {
    let pagination = Pagination {
        page: query.page,
        limit: query.limit,
    };
    let filtered = || {
        let mut sql = transactions::table.into_boxed();
        if let Some(status) = query.status {
            sql = sql.filter(transactions::status.eq(status.as_str()));
        }
        if let Some(order_id) = query.order_id {
            sql = sql.filter(transactions::order_id.eq(order_id));
        }
        sql
    };

    let mut conn = state.pool.get().await?;
    let total = filtered().count().get_result::<i64>(&mut conn).await?;
    let data = filtered()
        .order(transactions::created_at.desc())
        .limit(pagination.limit())
        .offset(pagination.offset())
        .load::<Transaction>(&mut conn)
        .await?;

    Ok(Json(Page::new(data, total, pagination)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Transaction>> {
    let mut conn = state.pool.get().await?;
    let transaction = transactions::table
        .find(id)
        .first::<Transaction>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("transaction {id}")))?;
    Ok(Json(transaction))
}

pub async fn list_order_transactions(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let mut conn = state.pool.get().await?;
    let data = transactions::table
        .filter(transactions::order_id.eq(order_id))
        .order(transactions::created_at.desc())
        .load::<Transaction>(&mut conn)
        .await?;
    Ok(Json(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{create_router, test_support};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::str::FromStr;
    use tower::ServiceExt;

    fn webhook(reference: &str, amount: &str) -> PaymentWebhook {
        PaymentWebhook {
            reference: reference.into(),
            status: PaymentStatus::Paid,
            amount: BigDecimal::from_str(amount).unwrap(),
            provider: Some("razorpay".into()),
            payment_method: None,
            payload: None,
        }
    }

    #[test]
    fn webhook_requires_reference_and_non_negative_amount() {
        assert!(webhook("pay_123", "499.00").validate().is_ok());
        assert!(webhook("  ", "499.00").validate().is_err());
        assert!(webhook("pay_123", "-1").validate().is_err());
    }

    #[test]
    fn webhook_status_parses_from_snake_case() {
        let parsed: PaymentWebhook = serde_json::from_value(serde_json::json!({
            "reference": "pay_123",
            "status": "refunded",
            "amount": "10.00"
        }))
        .unwrap();
        assert_eq!(parsed.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn unknown_webhook_status_is_rejected_by_the_router() {
        let app = create_router(test_support::lazy_state());
        let body = serde_json::json!({ "reference": "pay_1", "status": "lost", "amount": "1" });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/transactions/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    fn transaction_row(order_id: Option<Uuid>, status: PaymentStatus) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            order_id,
            reference: Some("pay_123".into()),
            amount: BigDecimal::from(648),
            provider: Some("razorpay".into()),
            payment_method: None,
            status: status.as_str().to_string(),
            provider_payload: None,
            paid_at: None,
            refunded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unlinked_or_own_transactions_can_be_linked() {
        let order = test_support::order_row("pending", false);
        assert!(ensure_linkable(&transaction_row(None, PaymentStatus::Paid), &order).is_ok());
        assert!(ensure_linkable(&transaction_row(Some(order.id), PaymentStatus::Paid), &order).is_ok());
    }

    #[test]
    fn reference_owned_by_another_order_is_a_conflict() {
        let order = test_support::order_row("pending", false);
        let err = ensure_linkable(&transaction_row(Some(Uuid::new_v4()), PaymentStatus::Paid), &order).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.to_string(), "payment reference pay_123 belongs to another order");
    }

    #[test]
    fn order_takes_the_linked_transaction_status() {
        let order = test_support::order_row("pending", false);
        assert_eq!(status_to_mirror(&order, &transaction_row(None, PaymentStatus::Paid)), Some("paid"));
        assert_eq!(status_to_mirror(&order, &transaction_row(None, PaymentStatus::Pending)), None);
    }

    fn order_request(product_id: Uuid, reference: &str) -> crate::orders::CreateOrderRequest {
        serde_json::from_value(serde_json::json!({
            "customer_name": "Asha Rao",
            "customer_email": "asha@example.com",
            "items": [{ "product_id": product_id, "quantity": 2 }],
            "payment_method": "upi",
            "payment_reference": reference,
            "shipping_address": {
                "full_name": "Asha Rao",
                "line1": "12 Lake Road",
                "city": "Pune",
                "postal_code": "411001",
                "country": "India"
            }
        }))
        .unwrap()
    }

    async fn by_reference(conn: &mut AsyncPgConnection, reference: &str) -> Transaction {
        transactions::table
            .filter(transactions::reference.eq(reference))
            .first::<Transaction>(conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn webhook_payment_is_linked_when_the_order_arrives() {
        let Some(mut conn) = test_support::test_connection().await else {
            return;
        };
        let tea = test_support::seed_product(&mut conn, "Assam Gold", "299", 10).await;
        let reference = format!("pay_{}", Uuid::new_v4().simple());

        let early = record_webhook(&mut conn, webhook(&reference, "598.00")).await.unwrap();
        assert_eq!(early.order_id, None);
        assert_eq!(early.status, "paid");

        let placed = crate::orders::place_order(&mut conn, order_request(tea, &reference)).await.unwrap();
        assert_eq!(placed.order.payment_status, "paid");

        let linked = by_reference(&mut conn, &reference).await;
        assert_eq!(linked.id, early.id);
        assert_eq!(linked.order_id, Some(placed.order.id));
    }

    #[tokio::test]
    async fn second_order_cannot_claim_a_used_reference() {
        let Some(mut conn) = test_support::test_connection().await else {
            return;
        };
        let tea = test_support::seed_product(&mut conn, "Assam Gold", "299", 10).await;
        let reference = format!("pay_{}", Uuid::new_v4().simple());

        crate::orders::place_order(&mut conn, order_request(tea, &reference)).await.unwrap();

        let second = order_request(tea, &reference);
        let err = conn
            .transaction::<_, ApiError, _>(|conn| Box::pin(crate::orders::place_order(conn, second)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(test_support::stock_of(&mut conn, tea).await, 8);
    }

    #[tokio::test]
    async fn payment_status_is_mirrored_onto_the_order() {
        let Some(mut conn) = test_support::test_connection().await else {
            return;
        };
        let tea = test_support::seed_product(&mut conn, "Assam Gold", "299", 10).await;
        let reference = format!("pay_{}", Uuid::new_v4().simple());
        let placed = crate::orders::place_order(&mut conn, order_request(tea, &reference)).await.unwrap();
        let order_id = placed.order.id;

        let pending = by_reference(&mut conn, &reference).await;
        assert_eq!(pending.status, "pending");

        let paid = apply_status(&mut conn, pending, PaymentStatus::Paid, None).await.unwrap();
        assert!(paid.paid_at.is_some());
        let order = orders::table.find(order_id).first::<Order>(&mut conn).await.unwrap();
        assert_eq!(order.payment_status, "paid");

        let repeated = apply_status(&mut conn, paid, PaymentStatus::Paid, None).await.unwrap();
        let refunded = apply_status(&mut conn, repeated, PaymentStatus::Refunded, None).await.unwrap();
        assert!(refunded.refunded_at.is_some());
        let order = orders::table.find(order_id).first::<Order>(&mut conn).await.unwrap();
        assert_eq!(order.payment_status, "refunded");

        let err = apply_status(&mut conn, refunded, PaymentStatus::Pending, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
