/// Loose structural check: one `@`, a non-empty local part and a dotted
/// domain without whitespace. Deliverability is the provider's problem.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Digits with an optional leading `+`, spaces and dashes allowed.
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    let body = phone.strip_prefix('+').unwrap_or(phone);
    let digits = body.chars().filter(char::is_ascii_digit).count();
    body.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') && (7..=15).contains(&digits)
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(is_valid_email("asha@example.com"));
        assert!(is_valid_email("  first.last+tag@shop.co.in "));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in ["", "asha", "@example.com", "asha@", "asha@example", "a@@b.com", "a b@c.com", "a@.com", "a@b..com"] {
            assert!(!is_valid_email(email), "{email} should be rejected");
        }
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Asha@Example.COM "), "asha@example.com");
    }

    #[test]
    fn phone_numbers() {
        assert!(is_valid_phone("+91 98765-43210"));
        assert!(is_valid_phone("0201234567"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("call me"));
    }
}
