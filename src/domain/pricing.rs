//! Price display for the INR storefront.

use rust_decimal::{Decimal, RoundingStrategy};

/// Format a rupee amount the way the storefront shows it: whole rupees with
/// Indian digit grouping, e.g. `₹1,23,456`.
pub fn format_inr(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let grouped = group_indian(&rounded.abs().to_string());
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-₹{grouped}")
    } else {
        format!("₹{grouped}")
    }
}

/// `₹5,000 (includes 18% GST)` display form.
pub fn format_inr_with_gst(price: Decimal, gst_percentage: Option<Decimal>) -> String {
    let pct = gst_percentage.unwrap_or_else(|| Decimal::new(18, 0));
    format!("{} (includes {}% GST)", format_inr(price), pct)
}

// Indian grouping: last three digits, then pairs (12,34,567).
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut parts: Vec<&str> = Vec::new();
    let mut i = head.len();
    while i > 2 {
        parts.push(&head[i - 2..i]);
        i -= 2;
    }
    parts.push(&head[..i]);
    parts.reverse();
    format!("{},{}", parts.join(","), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn small_amounts_are_ungrouped() {
        assert_eq!(format_inr(dec(0)), "₹0");
        assert_eq!(format_inr(dec(999)), "₹999");
    }

    #[test]
    fn grouping_is_indian_style() {
        assert_eq!(format_inr(dec(5000)), "₹5,000");
        assert_eq!(format_inr(dec(89_999)), "₹89,999");
        assert_eq!(format_inr(dec(123_456)), "₹1,23,456");
        assert_eq!(format_inr(dec(1_234_567)), "₹12,34,567");
        assert_eq!(format_inr(dec(123_456_789)), "₹12,34,56,789");
    }

    #[test]
    fn paise_round_half_away_from_zero() {
        assert_eq!(format_inr(Decimal::new(649_50, 2)), "₹650");
        assert_eq!(format_inr(Decimal::new(649_49, 2)), "₹649");
    }

    #[test]
    fn negative_amounts_keep_the_sign_outside() {
        assert_eq!(format_inr(dec(-123_456)), "-₹1,23,456");
    }

    #[test]
    fn gst_suffix_uses_configured_percentage() {
        assert_eq!(
            format_inr_with_gst(dec(5000), None),
            "₹5,000 (includes 18% GST)"
        );
        assert_eq!(
            format_inr_with_gst(dec(5000), Some(dec(12))),
            "₹5,000 (includes 12% GST)"
        );
    }
}
