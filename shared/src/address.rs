use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stored verbatim in the `orders.shipping_address` JSONB column. Pre-order
/// details travel with the address so checkout can send them in one blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_order: Option<PreOrderInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreOrderInfo {
    #[serde(default)]
    pub is_pre_order: bool,
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
}

impl ShippingAddress {
    pub fn is_pre_order(&self) -> bool {
        self.pre_order.as_ref().is_some_and(|p| p.is_pre_order)
    }

    /// Address lines for printing, skipping empty parts.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.line1.clone()];
        if let Some(line2) = self.line2.as_deref().filter(|l| !l.trim().is_empty()) {
            lines.push(line2.to_string());
        }
        let city_line = match self.state.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(state) => format!("{}, {} {}", self.city, state, self.postal_code),
            None => format!("{} {}", self.city, self.postal_code),
        };
        lines.push(city_line);
        lines.push(self.country.clone());
        lines
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".into(),
            phone: None,
            line1: "12 Lake Road".into(),
            line2: Some(" ".into()),
            city: "Pune".into(),
            state: Some("MH".into()),
            postal_code: "411001".into(),
            country: "India".into(),
            pre_order: None,
        }
    }

    #[test]
    fn pre_order_flag_comes_from_the_embedded_info() {
        let mut addr = address();
        assert!(!addr.is_pre_order());
        addr.pre_order = Some(PreOrderInfo {
            is_pre_order: true,
            expected_date: NaiveDate::from_ymd_opt(2026, 11, 1),
            note: None,
        });
        assert!(addr.is_pre_order());
    }

    #[test]
    fn parses_checkout_json_with_pre_order_info() {
        let addr: ShippingAddress = serde_json::from_value(serde_json::json!({
            "full_name": "Asha Rao",
            "line1": "12 Lake Road",
            "city": "Pune",
            "postal_code": "411001",
            "country": "India",
            "pre_order": { "is_pre_order": true, "expected_date": "2026-11-01" }
        }))
        .unwrap();
        assert!(addr.is_pre_order());
        assert_eq!(addr.state, None);
    }

    #[test]
    fn printable_lines_skip_blank_parts() {
        assert_eq!(
            address().lines(),
            vec!["12 Lake Road", "Pune, MH 411001", "India"]
        );
    }

    #[test]
    fn reports_blank_required_fields() {
        let mut addr = address();
        addr.city = "  ".into();
        addr.country.clear();
        assert_eq!(addr.missing_fields(), vec!["city", "country"]);
    }
}
