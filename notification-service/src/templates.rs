//! HTML bodies for customer and admin emails. All of them share
//! [`layout`]; user-provided values go through [`escape`].

use shared::money::format_with_currency;
use shared::*;

pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn layout(store: &StoreProfile, heading: &str, body: &str) -> String {
    let contact = match &store.contact_email {
        Some(email) => format!(
            "<p style=\"color:#666;font-size:12px\">Questions? Write to {}</p>",
            escape(email)
        ),
        None => String::new(),
    };
    format!(
        "<!DOCTYPE html><html><body style=\"font-family:Helvetica,Arial,sans-serif;color:#222\">\
         <div style=\"max-width:600px;margin:0 auto\">\
         <h2>{}</h2>{}<hr/>\
         <p style=\"color:#666;font-size:12px\">{}<br/>{}</p>{}\
         </div></body></html>",
        escape(heading),
        body,
        escape(&store.name),
        escape(&store.address_lines.join(", ")),
        contact
    )
}

fn row(label: &str, value: &str) -> String {
    format!("<tr><td style=\"padding:4px 8px;color:#666\">{}</td><td style=\"padding:4px 8px\">{}</td></tr>", escape(label), escape(value))
}

fn items_table(order: &OrderSnapshot, currency: &str) -> String {
    let rows: String = order
        .items
        .iter()
        .map(|item| {
            format!(
                "<tr><td style=\"padding:4px 8px\">{}</td><td style=\"padding:4px 8px;text-align:right\">{}</td><td style=\"padding:4px 8px;text-align:right\">{}</td></tr>",
                escape(&item.product_name),
                item.quantity,
                escape(&format_with_currency(&item.line_total, currency))
            )
        })
        .collect();

    let mut totals = row("Subtotal", &format_with_currency(&order.subtotal, currency));
    if order.discount != bigdecimal::BigDecimal::from(0) {
        totals.push_str(&row("Discount", &format!("-{}", format_with_currency(&order.discount, currency))));
    }
    totals.push_str(&row("Tax", &format_with_currency(&order.tax, currency)));
    totals.push_str(&row("Shipping", &format_with_currency(&order.shipping_fee, currency)));
    totals.push_str(&row("Total", &format_with_currency(&order.total, currency)));

    format!(
        "<table style=\"width:100%;border-collapse:collapse\">\
         <tr><th style=\"text-align:left\">Item</th><th style=\"text-align:right\">Qty</th><th style=\"text-align:right\">Amount</th></tr>\
         {rows}</table><table style=\"margin-left:auto\">{totals}</table>"
    )
}

fn pre_order_notice(order: &OrderSnapshot) -> String {
    let Some(info) = order.shipping_address.pre_order.as_ref().filter(|p| p.is_pre_order) else {
        return String::new();
    };
    let when = match info.expected_date {
        Some(date) => format!("It is expected to ship around {}.", date.format("%d %b %Y")),
        None => "We will let you know as soon as it ships.".to_string(),
    };
    let note = info
        .note
        .as_deref()
        .map(|n| format!(" {}", escape(n)))
        .unwrap_or_default();
    format!("<p><strong>This is a pre-order.</strong> {when}{note}</p>")
}

pub fn order_confirmation(order: &OrderSnapshot, store: &StoreProfile) -> String {
    let body = format!(
        "<p>Hi {},</p><p>Thank you for your order <strong>{}</strong>. Your invoice is attached.</p>{}{}<p>Shipping to:<br/>{}</p>",
        escape(&order.customer_name),
        escape(&order.order_number),
        pre_order_notice(order),
        items_table(order, &store.currency),
        order
            .shipping_address
            .lines()
            .iter()
            .map(|l| escape(l))
            .collect::<Vec<_>>()
            .join("<br/>")
    );
    layout(store, "Order confirmed", &body)
}

pub fn admin_new_order(order: &OrderSnapshot, store: &StoreProfile) -> String {
    let mut details = String::new();
    details.push_str(&row("Order", &order.order_number));
    details.push_str(&row("Customer", &format!("{} <{}>", order.customer_name, order.customer_email)));
    if let Some(phone) = &order.customer_phone {
        details.push_str(&row("Phone", phone));
    }
    details.push_str(&row("Payment", &format!(
        "{} ({})",
        order.payment_method.as_deref().unwrap_or("not specified"),
        order.payment_status
    )));
    if order.is_pre_order() {
        details.push_str(&row("Type", "Pre-order"));
    }
    let body = format!("<table>{details}</table>{}", items_table(order, &store.currency));
    layout(store, "New order received", &body)
}

pub fn order_status_update(order: &OrderSnapshot, reason: Option<&str>, store: &StoreProfile) -> String {
    let message = match order.status {
        OrderStatus::Confirmed => "has been confirmed and is being prepared.",
        OrderStatus::Processing => "is being packed.",
        OrderStatus::Shipped => "is on its way.",
        OrderStatus::Delivered => "has been delivered. We hope you enjoy it!",
        OrderStatus::Pending | OrderStatus::Cancelled => "has been updated.",
    };
    let note = reason
        .filter(|r| !r.trim().is_empty())
        .map(|r| format!("<p>Note: {}</p>", escape(r)))
        .unwrap_or_default();
    let body = format!(
        "<p>Hi {},</p><p>Your order <strong>{}</strong> {message}</p>{note}<table>{}</table>",
        escape(&order.customer_name),
        escape(&order.order_number),
        row("Status", order.status.as_str())
    );
    layout(store, &format!("Order {}", order.status), &body)
}

pub fn order_cancelled(order: &OrderSnapshot, reason: Option<&str>, store: &StoreProfile) -> String {
    let reason = reason
        .map(|r| format!("<p>Reason: {}</p>", escape(r)))
        .unwrap_or_default();
    let refund = if order.payment_status == PaymentStatus::Paid {
        "<p>Your payment will be refunded to the original payment method.</p>"
    } else {
        ""
    };
    let body = format!(
        "<p>Hi {},</p><p>Your order <strong>{}</strong> has been cancelled.</p>{reason}{refund}",
        escape(&order.customer_name),
        escape(&order.order_number),
    );
    layout(store, "Order cancelled", &body)
}

pub fn admin_order_cancelled(order: &OrderSnapshot, reason: Option<&str>, stock_restored: bool, store: &StoreProfile) -> String {
    let mut details = String::new();
    details.push_str(&row("Order", &order.order_number));
    details.push_str(&row("Customer", &order.customer_name));
    details.push_str(&row("Total", &format_with_currency(&order.total, &store.currency)));
    details.push_str(&row("Payment", order.payment_status.as_str()));
    details.push_str(&row("Reason", reason.unwrap_or("not given")));
    details.push_str(&row("Stock restored", if stock_restored { "yes" } else { "no" }));
    layout(store, "Order cancelled", &format!("<table>{details}</table>"))
}

pub fn payment_update(order: &OrderSnapshot, current: PaymentStatus, amount: &bigdecimal::BigDecimal, store: &StoreProfile) -> String {
    let amount = format_with_currency(amount, &store.currency);
    let message = match current {
        PaymentStatus::Paid => format!("We have received your payment of {amount}."),
        PaymentStatus::Failed => format!("Your payment of {amount} could not be completed. Please try again or choose another payment method."),
        PaymentStatus::Refunded => format!("A refund of {amount} has been issued. It may take a few days to appear."),
        PaymentStatus::Pending => format!("Your payment of {amount} is pending."),
    };
    let body = format!(
        "<p>Hi {},</p><p>{}</p><table>{}</table>",
        escape(&order.customer_name),
        escape(&message),
        row("Order", &order.order_number)
    );
    let heading = match current {
        PaymentStatus::Paid => "Payment received",
        PaymentStatus::Failed => "Payment failed",
        PaymentStatus::Refunded => "Refund issued",
        PaymentStatus::Pending => "Payment pending",
    };
    layout(store, heading, &body)
}

pub fn admin_bulk_order(lead: &BulkOrderSnapshot, store: &StoreProfile) -> String {
    let mut details = String::new();
    details.push_str(&row("Contact", &lead.contact_name));
    if let Some(company) = &lead.company_name {
        details.push_str(&row("Company", company));
    }
    details.push_str(&row("Email", &lead.email));
    if let Some(phone) = &lead.phone {
        details.push_str(&row("Phone", phone));
    }
    details.push_str(&row("Products", &lead.product_details));
    details.push_str(&row("Quantity", &lead.quantity.to_string()));
    if let Some(message) = &lead.message {
        details.push_str(&row("Message", message));
    }
    layout(store, "New bulk order enquiry", &format!("<table>{details}</table>"))
}

pub fn bulk_order_acknowledgement(lead: &BulkOrderSnapshot, store: &StoreProfile) -> String {
    let body = format!(
        "<p>Hi {},</p><p>Thanks for your bulk order enquiry for {} x {}. Our team will get back to you shortly.</p>",
        escape(&lead.contact_name),
        lead.quantity,
        escape(&lead.product_details)
    );
    layout(store, "We received your enquiry", &body)
}

pub fn admin_affiliate_application(affiliate: &AffiliateSnapshot, store: &StoreProfile) -> String {
    let mut details = String::new();
    details.push_str(&row("Name", &affiliate.name));
    details.push_str(&row("Email", &affiliate.email));
    for (label, value) in [
        ("Phone", &affiliate.phone),
        ("Website", &affiliate.website),
        ("Social", &affiliate.social_handle),
        ("Message", &affiliate.message),
    ] {
        if let Some(value) = value {
            details.push_str(&row(label, value));
        }
    }
    if let Some(size) = affiliate.audience_size {
        details.push_str(&row("Audience", &size.to_string()));
    }
    layout(store, "New affiliate application", &format!("<table>{details}</table>"))
}

pub fn affiliate_acknowledgement(affiliate: &AffiliateSnapshot, store: &StoreProfile) -> String {
    let body = format!(
        "<p>Hi {},</p><p>Thanks for applying to the {} affiliate programme. We review every application and will be in touch.</p>",
        escape(&affiliate.name),
        escape(&store.name)
    );
    layout(store, "Application received", &body)
}

pub fn affiliate_decision(affiliate: &AffiliateSnapshot, status: AffiliateStatus, store: &StoreProfile) -> String {
    let message = match status {
        AffiliateStatus::Approved => "Good news! Your affiliate application has been approved. We will send your partner details separately.",
        AffiliateStatus::Rejected => "Thank you for your interest. We are unable to approve your affiliate application at this time.",
        AffiliateStatus::Pending => "Your affiliate application is under review.",
    };
    let body = format!("<p>Hi {},</p><p>{message}</p>", escape(&affiliate.name));
    layout(store, "Affiliate application update", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b>Tom & \"Jerry\"</b>"), "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;");
    }

    #[test]
    fn layout_escapes_store_identity() {
        let store = StoreProfile::new("Leaf & Co", "4 Market St", Some("hi@leaf.example".into()), "INR");
        let html = layout(&store, "Hello", "<p>x</p>");
        assert!(html.contains("Leaf &amp; Co"));
        assert!(html.contains("hi@leaf.example"));
        assert!(html.contains("<p>x</p>"));
    }
}
