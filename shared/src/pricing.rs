use bigdecimal::BigDecimal;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::money::round2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("quantity for product {0} must be at least 1")]
    InvalidQuantity(Uuid),
    #[error("discount exceeds the order amount")]
    DiscountTooLarge,
}

/// A line priced from the catalogue at the moment of purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub line_total: BigDecimal,
}

impl PricedLine {
    pub fn new(
        product_id: Uuid,
        product_name: impl Into<String>,
        unit_price: &BigDecimal,
        quantity: i32,
    ) -> Result<Self, PricingError> {
        if quantity < 1 {
            return Err(PricingError::InvalidQuantity(product_id));
        }
        if *unit_price < BigDecimal::zero() {
            return Err(PricingError::Negative("unit price"));
        }
        let unit_price = round2(unit_price);
        let line_total = round2(&(&unit_price * BigDecimal::from(quantity)));
        Ok(Self {
            product_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
            line_total,
        })
    }
}

/// Order-level adjustments supplied with the order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    #[serde(default)]
    pub discount: BigDecimal,
    #[serde(default)]
    pub tax: BigDecimal,
    #[serde(default)]
    pub shipping_fee: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: BigDecimal,
    pub discount: BigDecimal,
    pub tax: BigDecimal,
    pub shipping_fee: BigDecimal,
    pub total: BigDecimal,
}

impl OrderTotals {
    /// `total = subtotal - discount + tax + shipping_fee`
    pub fn compute(lines: &[PricedLine], adjustments: &Adjustments) -> Result<Self, PricingError> {
        let zero = BigDecimal::zero();
        for (name, value) in [
            ("discount", &adjustments.discount),
            ("tax", &adjustments.tax),
            ("shipping fee", &adjustments.shipping_fee),
        ] {
            if *value < zero {
                return Err(PricingError::Negative(name));
            }
        }

        let subtotal = round2(
            &lines
                .iter()
                .fold(BigDecimal::zero(), |acc, line| acc + &line.line_total),
        );
        let discount = round2(&adjustments.discount);
        let tax = round2(&adjustments.tax);
        let shipping_fee = round2(&adjustments.shipping_fee);

        let gross = &subtotal + &tax + &shipping_fee;
        if discount > gross {
            return Err(PricingError::DiscountTooLarge);
        }
        let total = round2(&(gross - &discount));

        Ok(Self {
            subtotal,
            discount,
            tax,
            shipping_fee,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn line(price: &str, qty: i32) -> PricedLine {
        PricedLine::new(Uuid::new_v4(), "Tea", &dec(price), qty).unwrap()
    }

    #[test]
    fn line_total_is_price_times_quantity() {
        let l = line("199.99", 3);
        assert_eq!(l.line_total, dec("599.97"));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let id = Uuid::new_v4();
        assert_eq!(
            PricedLine::new(id, "Tea", &dec("1"), 0),
            Err(PricingError::InvalidQuantity(id))
        );
    }

    #[test]
    fn totals_apply_discount_tax_and_shipping() {
        let lines = vec![line("100", 2), line("49.50", 1)];
        let totals = OrderTotals::compute(
            &lines,
            &Adjustments {
                discount: dec("20"),
                tax: dec("12.375"),
                shipping_fee: dec("40"),
            },
        )
        .unwrap();

        assert_eq!(totals.subtotal, dec("249.50"));
        assert_eq!(totals.tax, dec("12.38"));
        assert_eq!(totals.total, dec("281.88"));
    }

    #[test]
    fn missing_adjustments_default_to_zero() {
        let totals = OrderTotals::compute(&[line("10", 1)], &Adjustments::default()).unwrap();
        assert_eq!(totals.total, dec("10"));
    }

    #[test]
    fn negative_adjustments_are_rejected() {
        let err = OrderTotals::compute(
            &[line("10", 1)],
            &Adjustments {
                shipping_fee: dec("-1"),
                ..Adjustments::default()
            },
        )
        .unwrap_err();
        assert_eq!(err, PricingError::Negative("shipping fee"));
    }

    #[test]
    fn discount_cannot_exceed_gross_amount() {
        let err = OrderTotals::compute(
            &[line("10", 1)],
            &Adjustments {
                discount: dec("10.01"),
                ..Adjustments::default()
            },
        )
        .unwrap_err();
        assert_eq!(err, PricingError::DiscountTooLarge);
    }
}
