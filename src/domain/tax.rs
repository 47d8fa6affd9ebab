//! GST math for a GST-inclusive catalog.
//!
//! Catalog prices already include GST; these helpers resolve the configured
//! rate and split an inclusive price into its base and GST portions for
//! invoices and order records.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// GST rate as a decimal fraction (0.18 for 18%).
///
/// The admin settings store the rate as a string (e.g. `"18"`); a missing or
/// malformed value falls back to 18%.
pub fn gst_rate(tax_rate_setting: Option<&str>) -> Decimal {
    gst_percentage(tax_rate_setting) / Decimal::ONE_HUNDRED
}

/// GST rate in percent (18 for 18%), for display.
pub fn gst_percentage(tax_rate_setting: Option<&str>) -> Decimal {
    tax_rate_setting
        .and_then(|raw| raw.trim().parse::<Decimal>().ok())
        .unwrap_or_else(|| Decimal::new(18, 0))
}

/// Base/GST split of a GST-inclusive price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: Decimal,
    pub gst_amount: Decimal,
    pub total_price: Decimal,
}

/// Split a GST-inclusive price at the given fractional rate.
///
/// Both portions are rounded to two decimal places, half away from zero, and
/// the GST portion is the exact complement of the base so the parts always
/// sum back to the inclusive price.
pub fn price_breakdown(gst_inclusive: Decimal, rate: Decimal) -> PriceBreakdown {
    let base_price = round_paise(gst_inclusive / (Decimal::ONE + rate));
    let gst_amount = gst_inclusive - base_price;
    PriceBreakdown {
        base_price,
        gst_amount,
        total_price: gst_inclusive,
    }
}

fn round_paise(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_defaults_to_eighteen_percent() {
        assert_eq!(gst_rate(None), Decimal::new(18, 2));
        assert_eq!(gst_percentage(None), Decimal::new(18, 0));
    }

    #[test]
    fn rate_reads_admin_setting() {
        assert_eq!(gst_rate(Some("12")), Decimal::new(12, 2));
        assert_eq!(gst_percentage(Some("5")), Decimal::new(5, 0));
    }

    #[test]
    fn malformed_rate_falls_back() {
        assert_eq!(gst_rate(Some("not-a-number")), Decimal::new(18, 2));
        assert_eq!(gst_rate(Some("")), Decimal::new(18, 2));
    }

    #[test]
    fn breakdown_splits_inclusive_price() {
        let b = price_breakdown(Decimal::new(5000, 0), Decimal::new(18, 2));
        assert_eq!(b.base_price, Decimal::new(4237_29, 2));
        assert_eq!(b.gst_amount, Decimal::new(762_71, 2));
        assert_eq!(b.total_price, Decimal::new(5000, 0));
    }

    #[test]
    fn breakdown_parts_sum_to_total() {
        let b = price_breakdown(Decimal::new(64_999, 0), Decimal::new(18, 2));
        assert_eq!(b.base_price + b.gst_amount, b.total_price);
    }

    #[test]
    fn zero_rate_means_no_gst() {
        let b = price_breakdown(Decimal::new(5000, 0), Decimal::ZERO);
        assert_eq!(b.base_price, Decimal::new(5000, 0));
        assert_eq!(b.gst_amount, Decimal::ZERO);
    }
}
