use bigdecimal::{BigDecimal, RoundingMode};

/// Rounds to the two decimal places stored in `NUMERIC(12,2)` columns.
pub fn round2(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// `1234.5` -> `1,234.50`
pub fn format_amount(amount: &BigDecimal) -> String {
    let text = round2(amount).to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}{grouped}.{fraction}")
}

pub fn format_with_currency(amount: &BigDecimal, currency: &str) -> String {
    format!("{currency} {}", format_amount(amount))
}
