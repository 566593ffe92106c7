//! PDF invoices rendered with the built-in Helvetica faces, so no font files
//! ship with the services.

use bigdecimal::BigDecimal;
use num_traits::Zero;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use thiserror::Error;

use crate::events::OrderSnapshot;
use crate::money::format_with_currency;
use crate::StoreProfile;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT: f32 = 20.0;
const TOP: f32 = 277.0;
const BOTTOM: f32 = 30.0;
const ROW: f32 = 7.0;
const MAX_PRODUCT_CHARS: usize = 48;

const COL_QTY: f32 = 118.0;
const COL_PRICE: f32 = 135.0;
const COL_AMOUNT: f32 = 165.0;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("failed to load font: {0}")]
    Font(String),
    #[error("failed to write pdf: {0}")]
    Write(String),
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

struct Canvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    y: f32,
}

impl Canvas {
    fn new(title: &str) -> Result<Self, InvoiceError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| InvoiceError::Font(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| InvoiceError::Font(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            fonts: Fonts { regular, bold },
            y: TOP,
        })
    }

    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.fonts.bold } else { &self.fonts.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn text_at(&self, text: &str, size: f32, x: f32, y: f32, bold: bool) {
        let font = if bold { &self.fonts.bold } else { &self.fonts.regular };
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP;
    }

    fn ensure_room(&mut self, needed: f32) -> bool {
        if self.y - needed < BOTTOM {
            self.new_page();
            return true;
        }
        false
    }

    fn finish(self) -> Result<Vec<u8>, InvoiceError> {
        self.doc
            .save_to_bytes()
            .map_err(|e| InvoiceError::Write(e.to_string()))
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

fn items_header(canvas: &mut Canvas) {
    canvas.text("Product", 10.0, LEFT, true);
    canvas.text("Qty", 10.0, COL_QTY, true);
    canvas.text("Unit price", 10.0, COL_PRICE, true);
    canvas.text("Amount", 10.0, COL_AMOUNT, true);
    canvas.advance(2.0);
    canvas.text(&"_".repeat(95), 8.0, LEFT, false);
    canvas.advance(ROW);
}

/// Renders the invoice for an order and returns the PDF bytes.
pub fn render_invoice(order: &OrderSnapshot, store: &StoreProfile) -> Result<Vec<u8>, InvoiceError> {
    let money = |amount: &BigDecimal| format_with_currency(amount, &store.currency);
    let mut canvas = Canvas::new(&format!("Invoice {}", order.order_number))?;

    // Store header on the left, invoice meta on the right.
    canvas.text(&store.name, 18.0, LEFT, true);
    canvas.text("INVOICE", 20.0, 150.0, true);
    let mut meta_y = TOP - 8.0;
    for line in [
        format!("Order: {}", order.order_number),
        format!("Date: {}", order.created_at.format("%d %b %Y")),
        format!("Payment: {}", order.payment_status),
    ] {
        canvas.text_at(&line, 9.0, 150.0, meta_y, false);
        meta_y -= 5.0;
    }
    canvas.advance(8.0);
    for line in &store.address_lines {
        canvas.text(line, 9.0, LEFT, false);
        canvas.advance(4.5);
    }
    if let Some(email) = &store.contact_email {
        canvas.text(email, 9.0, LEFT, false);
        canvas.advance(4.5);
    }

    canvas.y = canvas.y.min(meta_y) - 8.0;
    canvas.text("Bill to", 11.0, LEFT, true);
    canvas.advance(5.5);
    let mut bill_to = vec![order.customer_name.clone(), order.customer_email.clone()];
    if let Some(phone) = &order.customer_phone {
        bill_to.push(phone.clone());
    }
    bill_to.extend(order.shipping_address.lines());
    for line in bill_to {
        canvas.text(&line, 9.5, LEFT, false);
        canvas.advance(4.5);
    }

    canvas.advance(6.0);
    items_header(&mut canvas);
    for item in &order.items {
        if canvas.ensure_room(ROW) {
            items_header(&mut canvas);
        }
        canvas.text(&truncate(&item.product_name, MAX_PRODUCT_CHARS), 9.5, LEFT, false);
        canvas.text(&item.quantity.to_string(), 9.5, COL_QTY, false);
        canvas.text(&money(&item.unit_price), 9.5, COL_PRICE, false);
        canvas.text(&money(&item.line_total), 9.5, COL_AMOUNT, false);
        canvas.advance(ROW);
    }

    let mut totals = vec![("Subtotal", &order.subtotal)];
    if !order.discount.is_zero() {
        totals.push(("Discount", &order.discount));
    }
    totals.push(("Tax", &order.tax));
    totals.push(("Shipping", &order.shipping_fee));

    canvas.ensure_room(ROW * (totals.len() as f32 + 3.0));
    canvas.advance(2.0);
    for (label, amount) in totals {
        let value = if label == "Discount" {
            format!("-{}", money(amount))
        } else {
            money(amount)
        };
        canvas.text(label, 10.0, COL_PRICE, false);
        canvas.text(&value, 10.0, COL_AMOUNT, false);
        canvas.advance(6.0);
    }
    canvas.text("Total", 11.0, COL_PRICE, true);
    canvas.text(&money(&order.total), 11.0, COL_AMOUNT, true);
    canvas.advance(12.0);

    if let Some(pre_order) = order.shipping_address.pre_order.as_ref().filter(|p| p.is_pre_order) {
        canvas.ensure_room(ROW * 2.0);
        let note = match pre_order.expected_date {
            Some(date) => format!("Pre-order: expected to ship around {}.", date.format("%d %b %Y")),
            None => "Pre-order: ships as soon as stock arrives.".to_string(),
        };
        canvas.text(&note, 9.5, LEFT, true);
        canvas.advance(ROW);
    }

    canvas.ensure_room(ROW);
    canvas.text(&format!("Thank you for shopping with {}.", store.name), 9.5, LEFT, false);

    canvas.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::PreOrderInfo;
    use crate::events::{fixtures, OrderItemSnapshot};
    use uuid::Uuid;

    fn store() -> StoreProfile {
        StoreProfile {
            name: "Leaf & Co".into(),
            address_lines: vec!["4 Market Street".into(), "Pune 411001".into()],
            contact_email: Some("hello@leaf.example".into()),
            currency: "INR".into(),
        }
    }

    #[test]
    fn renders_a_pdf_document() {
        let bytes = render_invoice(&fixtures::order(), &store()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_orders_spill_onto_more_pages() {
        let mut order = fixtures::order();
        order.items = (0..80)
            .map(|i| OrderItemSnapshot {
                product_id: Uuid::new_v4(),
                product_name: format!("Sample tin {i}"),
                unit_price: fixtures::dec("10"),
                quantity: 1,
                line_total: fixtures::dec("10"),
            })
            .collect();
        order.shipping_address.pre_order = Some(PreOrderInfo {
            is_pre_order: true,
            expected_date: None,
            note: None,
        });

        let short = render_invoice(&fixtures::order(), &store()).unwrap();
        let long = render_invoice(&order, &store()).unwrap();
        assert!(long.starts_with(b"%PDF"));
        assert!(long.len() > short.len());
    }

    #[test]
    fn truncates_long_product_names() {
        assert_eq!(truncate("Short", 10), "Short");
        assert_eq!(truncate("A very long product name", 10), "A very ...");
    }
}
