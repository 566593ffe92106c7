pub mod address;
pub mod events;
pub mod invoice;
pub mod money;
pub mod order_number;
pub mod pricing;
pub mod status;
pub mod validation;

pub use address::{PreOrderInfo, ShippingAddress};
pub use events::{
    AffiliateSnapshot, BulkOrderSnapshot, DomainEvent, EventEnvelope, OrderItemSnapshot,
    OrderSnapshot,
};
pub use status::{AffiliateStatus, BulkOrderStatus, OrderStatus, ParseStatusError, PaymentStatus};

use serde::{Deserialize, Serialize};

/// Shop identity printed on invoices and email footers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreProfile {
    pub name: String,
    pub address_lines: Vec<String>,
    pub contact_email: Option<String>,
    pub currency: String,
}

impl StoreProfile {
    /// Builds a profile from the comma-separated address form used in
    /// service configuration.
    pub fn new(name: &str, address: &str, contact_email: Option<String>, currency: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            address_lines: address
                .split(',')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            contact_email: contact_email.filter(|email| !email.trim().is_empty()),
            currency: currency.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_profile_splits_address_lines() {
        let store = StoreProfile::new(" Leaf & Co ", "4 Market Street, , Pune 411001", Some(String::new()), "INR");
        assert_eq!(store.name, "Leaf & Co");
        assert_eq!(store.address_lines, vec!["4 Market Street", "Pune 411001"]);
        assert_eq!(store.contact_email, None);
    }
}
