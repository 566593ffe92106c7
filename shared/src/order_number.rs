//! Human-readable order numbers: `ORD-<seq><DDMMYY>`.
//!
//! The sequence part is zero-padded to four digits and grows past that
//! without truncation, so the date is always the last six characters.

use chrono::NaiveDate;

pub const PREFIX: &str = "ORD-";
const DATE_FORMAT: &str = "%d%m%y";
const MIN_SEQ_WIDTH: usize = 4;

pub fn format(seq: i64, date: NaiveDate) -> String {
    format!(
        "{PREFIX}{seq:0width$}{}",
        date.format(DATE_FORMAT),
        width = MIN_SEQ_WIDTH
    )
}

/// Splits an order number back into its sequence and date.
pub fn parse(order_number: &str) -> Option<(i64, NaiveDate)> {
    let body = order_number.strip_prefix(PREFIX)?;
    if body.len() < MIN_SEQ_WIDTH + 6 || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (seq, date) = body.split_at(body.len() - 6);
    let seq = seq.parse().ok()?;
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    Some((seq, date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn pads_sequence_and_appends_day_month_year() {
        assert_eq!(format(42, date(2026, 10, 16)), "ORD-0042161026");
        assert_eq!(format(1, date(2025, 1, 5)), "ORD-0001050125");
    }

    #[test]
    fn long_sequences_are_not_truncated() {
        assert_eq!(format(123456, date(2026, 12, 31)), "ORD-123456311226");
    }

    #[test]
    fn parse_recovers_sequence_and_date() {
        assert_eq!(parse("ORD-0042161026"), Some((42, date(2026, 10, 16))));
        assert_eq!(parse("ORD-123456311226"), Some((123456, date(2026, 12, 31))));
    }

    #[test]
    fn parse_rejects_malformed_numbers() {
        assert_eq!(parse("0042161026"), None);
        assert_eq!(parse("ORD-42161026"), None);
        assert_eq!(parse("ORD-0042991326"), None);
        assert_eq!(parse("ORD-00a2161026"), None);
    }
}
