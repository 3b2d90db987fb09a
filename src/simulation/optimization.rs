// src/simulation/optimization.rs

/// Inventory-policy calculations used by the day calculator.
///
/// Target stock follows the safety-stock formula: cover mean demand over the
/// supplier lead time plus `z` standard deviations of demand over that horizon.

/// Upper bound on |z| returned for confidence levels at or beyond the extremes.
pub const Z_CAP: f64 = 5.0;

/// Rational approximation of the standard normal quantile (Abramowitz and
/// Stegun 26.2.23), accurate to about 4.5e-4.
///
/// Only `service_z` calls it, turning the configured confidence level into the
/// safety-stock multiplier once per run. Levels of 0 or 1 map to `∓Z_CAP`
/// instead of infinities.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p >= 1.0 {
        return Z_CAP;
    }
    if p <= 0.0 || p.is_nan() {
        return -Z_CAP;
    }
    if p == 0.5 {
        return 0.0;
    }

    // Valid for 0 < q <= 0.5; the upper tail is mirrored
    let q = if p < 0.5 { p } else { 1.0 - p };
    let t = (-2.0 * q.ln()).sqrt();

    let (c0, c1, c2) = (2.515517, 0.802853, 0.010328);
    let (d1, d2, d3) = (1.432788, 0.189269, 0.001308);

    let numerator = c0 + c1 * t + c2 * t * t;
    let denominator = 1.0 + d1 * t + d2 * t * t + d3 * t * t * t;
    let x = t - numerator / denominator;

    if p < 0.5 {
        -x
    } else {
        x
    }
}

/// Whole days between placing a raw-material order and receiving it.
///
/// Same-day delivery still lands the next morning, so anything below one day
/// counts as one. Both the delivery pipeline and the stock targets use this.
pub fn effective_lead_time(te: f64) -> usize {
    te.round().max(1.0) as usize
}

/// z-factor for a target service level, e.g. 0.95 -> ~1.645.
pub fn service_z(confidence_level: f64) -> f64 {
    inverse_normal_cdf(confidence_level).clamp(-Z_CAP, Z_CAP)
}

/// `z × σ × √L`, never negative.
pub fn safety_stock(z: f64, std_dev: f64, lead_time_days: f64) -> f64 {
    (z * std_dev * lead_time_days.max(0.0).sqrt()).max(0.0)
}

/// Stock that covers mean demand over the lead time plus safety stock.
pub fn target_stock(mean_demand: f64, lead_time_days: f64, safety: f64) -> f64 {
    (mean_demand * lead_time_days.max(0.0) + safety).max(0.0)
}

/// Order-up-to quantity for raw material.
///
/// Brings on-hand plus in-transit stock up to the reorder point plus one
/// more lead time of consumption.
pub fn replenishment_order(
    reorder_point: f64,
    daily_usage: f64,
    lead_time_days: f64,
    on_hand: f64,
    in_transit: f64,
) -> f64 {
    let up_to = reorder_point + daily_usage * lead_time_days.max(0.0);
    (up_to - on_hand - in_transit).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_for_common_service_levels() {
        assert!((service_z(0.95) - 1.645).abs() < 1e-3);
        assert!((service_z(0.5)).abs() < 1e-12);
        assert!((service_z(0.05) + 1.645).abs() < 1e-3);
        assert_eq!(service_z(1.0), Z_CAP);
    }

    #[test]
    fn test_target_stock_matches_safety_stock_formula() {
        let z = 1.645;
        let ss = safety_stock(z, 250.0, 4.0);
        assert!((ss - 822.5).abs() < 1e-9);
        assert!((target_stock(2500.0, 4.0, ss) - 10822.5).abs() < 1e-9);
        assert_eq!(safety_stock(-1.0, 250.0, 4.0), 0.0);
    }

    #[test]
    fn test_lead_time_is_at_least_one_day() {
        assert_eq!(effective_lead_time(0.0), 1);
        assert_eq!(effective_lead_time(0.4), 1);
        assert_eq!(effective_lead_time(2.6), 3);
        assert_eq!(effective_lead_time(f64::NAN), 1);
    }

    #[test]
    fn test_replenishment_counts_pipeline() {
        assert_eq!(replenishment_order(900.0, 300.0, 3.0, 600.0, 400.0), 800.0);
        assert_eq!(replenishment_order(100.0, 10.0, 1.0, 5000.0, 0.0), 0.0);
    }
}
