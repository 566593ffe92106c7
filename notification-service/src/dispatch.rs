//! Maps domain events to the emails they trigger and delivers them.

use shared::invoice::render_invoice;
use shared::*;
use tracing::{error, warn};

use crate::mailer::{Attachment, Mailer, OutgoingEmail};
use crate::templates;

/// Who receives what.
#[derive(Debug, Clone)]
pub struct Recipients {
    pub store: StoreProfile,
    pub admin_email: String,
}

impl Recipients {
    fn customer(&self, to: &str, subject: String, html: String) -> OutgoingEmail {
        OutgoingEmail::new(to, subject, html).reply_to(self.store.contact_email.clone())
    }

    fn admin(&self, subject: String, html: String, reply_to: &str) -> OutgoingEmail {
        OutgoingEmail::new(&self.admin_email, subject, html).reply_to(Some(reply_to.to_string()))
    }
}

fn invoice_attachment(order: &OrderSnapshot, store: &StoreProfile) -> Option<Attachment> {
    match render_invoice(order, store) {
        Ok(data) => Some(Attachment {
            filename: format!("invoice-{}.pdf", order.order_number),
            content_type: "application/pdf".to_string(),
            data,
        }),
        Err(e) => {
            warn!(order_number = %order.order_number, error = %e, "Invoice rendering failed, sending confirmation without it");
            None
        }
    }
}

/// Emails for one event. Rendering the invoice is CPU-bound, so callers on
/// the async runtime should run this on a blocking thread.
pub fn emails_for(event: &DomainEvent, to: &Recipients) -> Vec<OutgoingEmail> {
    let store = &to.store;
    match event {
        DomainEvent::OrderPlaced { order } => {
            let subject = if order.is_pre_order() {
                format!("Pre-order {} confirmed", order.order_number)
            } else {
                format!("Order {} confirmed", order.order_number)
            };
            let mut confirmation = to.customer(&order.customer_email, subject, templates::order_confirmation(order, store));
            if let Some(invoice) = invoice_attachment(order, store) {
                confirmation = confirmation.attach(invoice);
            }
            vec![
                confirmation,
                to.admin(
                    format!("New order {} from {}", order.order_number, order.customer_name),
                    templates::admin_new_order(order, store),
                    &order.customer_email,
                ),
            ]
        }
        DomainEvent::OrderStatusChanged { order, reason, .. } => vec![to.customer(
            &order.customer_email,
            format!("Order {} is {}", order.order_number, order.status),
            templates::order_status_update(order, reason.as_deref(), store),
        )],
        DomainEvent::OrderCancelled { order, reason, stock_restored } => vec![
            to.customer(
                &order.customer_email,
                format!("Order {} cancelled", order.order_number),
                templates::order_cancelled(order, reason.as_deref(), store),
            ),
            to.admin(
                format!("Order {} cancelled", order.order_number),
                templates::admin_order_cancelled(order, reason.as_deref(), *stock_restored, store),
                &order.customer_email,
            ),
        ],
        DomainEvent::PaymentStatusChanged { order, current, amount, .. } => {
            let subject = match current {
                PaymentStatus::Pending => return Vec::new(),
                PaymentStatus::Paid => format!("Payment received for {}", order.order_number),
                PaymentStatus::Failed => format!("Payment failed for {}", order.order_number),
                PaymentStatus::Refunded => format!("Refund issued for {}", order.order_number),
            };
            vec![to.customer(
                &order.customer_email,
                subject,
                templates::payment_update(order, *current, amount, store),
            )]
        }
        DomainEvent::BulkOrderRequested { bulk_order } => vec![
            to.admin(
                format!("Bulk order enquiry from {}", bulk_order.contact_name),
                templates::admin_bulk_order(bulk_order, store),
                &bulk_order.email,
            ),
            to.customer(
                &bulk_order.email,
                "We received your bulk order enquiry".to_string(),
                templates::bulk_order_acknowledgement(bulk_order, store),
            ),
        ],
        DomainEvent::AffiliateApplied { affiliate } => vec![
            to.admin(
                format!("Affiliate application from {}", affiliate.name),
                templates::admin_affiliate_application(affiliate, store),
                &affiliate.email,
            ),
            to.customer(
                &affiliate.email,
                "Your affiliate application".to_string(),
                templates::affiliate_acknowledgement(affiliate, store),
            ),
        ],
        DomainEvent::AffiliateStatusChanged { affiliate, status } => vec![to.customer(
            &affiliate.email,
            format!("Your affiliate application was {status}"),
            templates::affiliate_decision(affiliate, *status, store),
        )],
    }
}

/// Sends every email, logging failures without stopping. Returns how many
/// were accepted by the mailer.
pub async fn deliver(mailer: &dyn Mailer, emails: &[OutgoingEmail]) -> usize {
    let mut sent = 0;
    for email in emails {
        match mailer.send(email).await {
            Ok(()) => sent += 1,
            Err(e) => error!(to = %email.to, subject = %email.subject, error = %e, "Failed to send email"),
        }
    }
    sent
}
