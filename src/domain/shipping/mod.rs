//! Distance-based shipping quotes.
//!
//! Store-wide defaults come from admin settings; an active shipping zone may
//! override individual parameters. The quote itself is a pure function: it
//! never fails on numeric input and always returns a full breakdown so the
//! storefront can render a line-item explanation without recomputing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-wide shipping defaults, sourced from the `store_settings` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingSettings {
    pub free_shipping_threshold: Decimal,
    pub distance_free_radius: Decimal,
    pub shipping_per_km_rate: Decimal,
    pub base_shipping_rate: Decimal,
}

impl Default for ShippingSettings {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::new(10_000, 0),
            distance_free_radius: Decimal::new(5, 0),
            shipping_per_km_rate: Decimal::new(50, 0),
            base_shipping_rate: Decimal::new(500, 0),
        }
    }
}

/// Admin-configured zone override.
///
/// A `None` field inherits the corresponding store setting; `Some(0)` is an
/// explicit override to no charge. `max_shipping_distance`, when declared,
/// caps the serviceable distance before any charge is computed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingZone {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub regions: Vec<String>,
    pub base_rate: Option<Decimal>,
    pub free_shipping_threshold: Option<Decimal>,
    pub distance_free_radius: Option<Decimal>,
    pub per_km_rate: Option<Decimal>,
    pub max_shipping_distance: Option<Decimal>,
    pub estimated_days_min: Option<i32>,
    pub estimated_days_max: Option<i32>,
    pub is_active: bool,
}

/// Every intermediate quantity of a quote, post zone-override and post-clamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingBreakdown {
    pub base_rate: Decimal,
    pub distance_km: Decimal,
    pub distance_free_radius: Decimal,
    pub distance_charged: Decimal,
    pub per_km_rate: Decimal,
    pub distance_charge: Decimal,
    pub is_free_shipping: bool,
    pub order_value: Decimal,
    pub free_shipping_threshold: Decimal,
    pub total_shipping_charge: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub amount: Decimal,
    pub breakdown: ShippingBreakdown,
}

/// Quote the shipping charge for a cart.
///
/// Rules:
/// 1. Order value >= free shipping threshold:
///    - within the free radius: free
///    - beyond it: `(distance - free_radius) * per_km_rate`, base rate waived
/// 2. Order value below the threshold:
///    - base rate, plus the distance charge when beyond the free radius
///
/// The first active zone in `zones` overrides any settings it declares.
/// Negative distances never charge; there is no input validation here.
pub fn quote(
    cart_total: Decimal,
    distance_km: Decimal,
    zones: &[ShippingZone],
    settings: Option<&ShippingSettings>,
) -> ShippingQuote {
    let defaults = ShippingSettings::default();
    let settings = settings.unwrap_or(&defaults);

    let mut free_shipping_threshold = settings.free_shipping_threshold;
    let mut distance_free_radius = settings.distance_free_radius;
    let mut per_km_rate = settings.shipping_per_km_rate;
    let mut base_rate = settings.base_shipping_rate;

    if zones.iter().filter(|z| z.is_active).count() > 1 {
        tracing::warn!("multiple shipping zones active, using first in list order");
    }

    let active_zone = zones.iter().find(|z| z.is_active);
    if let Some(zone) = active_zone {
        free_shipping_threshold = zone.free_shipping_threshold.unwrap_or(free_shipping_threshold);
        distance_free_radius = zone.distance_free_radius.unwrap_or(distance_free_radius);
        per_km_rate = zone.per_km_rate.unwrap_or(per_km_rate);
        base_rate = zone.base_rate.unwrap_or(base_rate);
    }

    // Clamp to the zone's serviceable distance before anything else.
    let distance_km = match active_zone.and_then(|z| z.max_shipping_distance) {
        Some(max) => distance_km.min(max),
        None => distance_km,
    };

    let distance_charged = (distance_km - distance_free_radius).max(Decimal::ZERO);
    let mut distance_charge = Decimal::ZERO;

    let total_shipping_charge = if cart_total >= free_shipping_threshold {
        if distance_km <= distance_free_radius {
            Decimal::ZERO
        } else {
            distance_charge = distance_charged * per_km_rate;
            distance_charge
        }
    } else {
        if distance_km > distance_free_radius {
            distance_charge = distance_charged * per_km_rate;
        }
        base_rate + distance_charge
    };

    let breakdown = ShippingBreakdown {
        base_rate,
        distance_km,
        distance_free_radius,
        distance_charged,
        per_km_rate,
        distance_charge,
        is_free_shipping: cart_total >= free_shipping_threshold
            && distance_km <= distance_free_radius,
        order_value: cart_total,
        free_shipping_threshold,
        total_shipping_charge,
    };

    ShippingQuote {
        amount: total_shipping_charge,
        breakdown,
    }
}

/// Quote at distance zero and return only the amount.
#[deprecated(note = "use `quote` with an explicit delivery distance")]
pub fn flat_amount(
    cart_total: Decimal,
    zones: &[ShippingZone],
    settings: Option<&ShippingSettings>,
) -> Decimal {
    quote(cart_total, Decimal::ZERO, zones, settings).amount
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn zone(is_active: bool) -> ShippingZone {
        ShippingZone {
            name: Some("Metro".into()),
            is_active,
            ..ShippingZone::default()
        }
    }

    #[test]
    fn below_threshold_within_radius_charges_base_rate() {
        let q = quote(dec(5000), dec(3), &[], None);
        assert_eq!(q.amount, dec(500));
        assert!(!q.breakdown.is_free_shipping);
        assert_eq!(q.breakdown.distance_charge, dec(0));
    }

    #[test]
    fn below_threshold_beyond_radius_adds_distance_charge() {
        // 5000 cart, 8 km: base 500 + 3 km * 50 = 650
        let q = quote(dec(5000), dec(8), &[], None);
        assert_eq!(q.amount, dec(650));
        assert_eq!(q.breakdown.distance_charged, dec(3));
        assert_eq!(q.breakdown.distance_charge, dec(150));
    }

    #[test]
    fn above_threshold_within_radius_is_free() {
        let q = quote(dec(15_000), dec(3), &[], None);
        assert_eq!(q.amount, dec(0));
        assert!(q.breakdown.is_free_shipping);
    }

    #[test]
    fn above_threshold_beyond_radius_waives_base_rate_only() {
        // 15000 cart, 8 km: 3 km * 50 = 150, base waived, not free
        let q = quote(dec(15_000), dec(8), &[], None);
        assert_eq!(q.amount, dec(150));
        assert!(!q.breakdown.is_free_shipping);
        assert_eq!(q.breakdown.base_rate, dec(500)); // echoed even when waived
    }

    #[test]
    fn exactly_at_threshold_qualifies_for_free_shipping() {
        let q = quote(dec(10_000), dec(5), &[], None);
        assert_eq!(q.amount, dec(0));
        assert!(q.breakdown.is_free_shipping);
    }

    #[test]
    fn amount_is_monotonic_in_distance() {
        let mut last = Decimal::MIN;
        for km in 0..30i64 {
            let q = quote(dec(5000), dec(km), &[], None);
            assert!(q.amount >= last, "amount decreased at {} km", km);
            last = q.amount;
        }
    }

    #[test]
    fn negative_distance_never_charges_for_distance() {
        let q = quote(dec(5000), dec(-4), &[], None);
        assert_eq!(q.amount, dec(500));
        assert_eq!(q.breakdown.distance_charged, dec(0));

        let q = quote(dec(15_000), dec(-4), &[], None);
        assert_eq!(q.amount, dec(0));
        assert!(q.breakdown.is_free_shipping);
    }

    #[test]
    fn active_zone_base_rate_overrides_settings() {
        let z = ShippingZone {
            base_rate: Some(dec(200)),
            ..zone(true)
        };
        let q = quote(dec(5000), dec(0), &[z], None);
        assert_eq!(q.amount, dec(200));
        assert_eq!(q.breakdown.base_rate, dec(200));
    }

    #[test]
    fn zone_zero_override_is_distinct_from_inherit() {
        // Explicit zero base rate: below-threshold orders ship at no charge.
        let z = ShippingZone {
            base_rate: Some(dec(0)),
            ..zone(true)
        };
        assert_eq!(quote(dec(5000), dec(0), &[z], None).amount, dec(0));

        // Absent base rate inherits the 500 default.
        assert_eq!(quote(dec(5000), dec(0), &[zone(true)], None).amount, dec(500));
    }

    #[test]
    fn inactive_zones_are_ignored() {
        let z = ShippingZone {
            base_rate: Some(dec(9999)),
            ..zone(false)
        };
        assert_eq!(quote(dec(5000), dec(0), &[z], None).amount, dec(500));
    }

    #[test]
    fn first_active_zone_wins() {
        let first = ShippingZone {
            base_rate: Some(dec(100)),
            ..zone(true)
        };
        let second = ShippingZone {
            base_rate: Some(dec(900)),
            ..zone(true)
        };
        assert_eq!(quote(dec(5000), dec(0), &[first, second], None).amount, dec(100));
    }

    #[test]
    fn max_distance_clamps_before_charging() {
        let z = ShippingZone {
            max_shipping_distance: Some(dec(10)),
            ..zone(true)
        };
        let q = quote(dec(5000), dec(50), &[z], None);
        assert_eq!(q.breakdown.distance_km, dec(10));
        // base 500 + (10 - 5) * 50
        assert_eq!(q.amount, dec(750));
    }

    #[test]
    fn custom_settings_replace_defaults() {
        let settings = ShippingSettings {
            free_shipping_threshold: dec(40_000),
            distance_free_radius: dec(10),
            shipping_per_km_rate: dec(25),
            base_shipping_rate: dec(300),
        };
        let q = quote(dec(20_000), dec(14), &[], Some(&settings));
        // below the 40k threshold: 300 + 4 * 25
        assert_eq!(q.amount, dec(400));
        assert_eq!(q.breakdown.free_shipping_threshold, dec(40_000));
    }

    #[test]
    fn breakdown_echoes_resolved_parameters() {
        let z = ShippingZone {
            per_km_rate: Some(dec(80)),
            distance_free_radius: Some(dec(2)),
            ..zone(true)
        };
        let q = quote(dec(5000), dec(6), &[z], None);
        assert_eq!(q.breakdown.per_km_rate, dec(80));
        assert_eq!(q.breakdown.distance_free_radius, dec(2));
        assert_eq!(q.breakdown.distance_charged, dec(4));
        assert_eq!(q.breakdown.order_value, dec(5000));
        assert_eq!(q.breakdown.total_shipping_charge, q.amount);
    }

    #[test]
    #[allow(deprecated)]
    fn flat_amount_quotes_at_zero_distance() {
        assert_eq!(flat_amount(dec(5000), &[], None), dec(500));
        assert_eq!(flat_amount(dec(15_000), &[], None), dec(0));
    }
}
