//! Parameter response curve.
//!
//! A fixed quintic maps a normalised control position `x` in `[0, 1]` to the
//! effective attachment rate. The curve has no closed-form inverse, so
//! recovering a control position from a stored rate is done by bisection.

/// Polynomial coefficients, lowest order first.
pub const RESPONSE_COEFFICIENTS: [f64; 6] = [
    0.0, 0.073_502_3, 0.386_606, -0.387_84, 3.519_94, -2.592_16,
];

/// Inversion stops once `|f(x) - y|` drops below this.
pub const INVERSION_TOLERANCE: f64 = 1e-4;

/// Upper bound on bisection steps.
pub const MAX_BISECTION_STEPS: u32 = 64;

/// Evaluates the response curve at `x`.
#[must_use]
pub fn response(x: f64) -> f64 {
    RESPONSE_COEFFICIENTS
        .iter()
        .rev()
        .fold(0.0, |acc, coefficient| acc * x + coefficient)
}

/// Recovers `x` in `[0, 1]` such that `response(x)` is within
/// [`INVERSION_TOLERANCE`] of `y`.
///
/// The curve is monotonic on `[0, 1]`; targets outside its range clamp to
/// the nearest end. Deterministic for identical `y`.
#[must_use]
pub fn invert_response(y: f64) -> f64 {
    if y.is_nan() || y <= response(0.0) {
        return 0.0;
    }
    if y >= response(1.0) {
        return 1.0;
    }

    let mut low = 0.0;
    let mut high = 1.0;
    let mut mid = 0.5;

    for _ in 0..MAX_BISECTION_STEPS {
        mid = (low + high) / 2.0;
        let value = response(mid);
        if (value - y).abs() < INVERSION_TOLERANCE {
            break;
        }
        if value < y {
            low = mid;
        } else {
            high = mid;
        }
    }

    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_curve_endpoints() {
        assert_eq!(response(0.0), 0.0);
        assert!((response(1.0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_inversion_recovers_input() {
        let y = response(0.73);
        let x = invert_response(y);
        assert!((x - 0.73).abs() < 1e-4, "recovered {x}");
    }

    #[test]
    fn test_inversion_is_reproducible() {
        let y = response(0.31);
        assert_eq!(invert_response(y).to_bits(), invert_response(y).to_bits());
    }

    #[test]
    fn test_inversion_clamps_out_of_range() {
        assert_eq!(invert_response(-0.5), 0.0);
        assert_eq!(invert_response(2.0), 1.0);
        assert_eq!(invert_response(f64::NAN), 0.0);
    }

    proptest! {
        #[test]
        fn prop_curve_is_monotonic(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(response(low) <= response(high) + 1e-12);
        }

        #[test]
        fn prop_inversion_meets_tolerance(x in 0.0f64..1.0) {
            let y = response(x);
            let recovered = invert_response(y);
            prop_assert!((response(recovered) - y).abs() < INVERSION_TOLERANCE);
        }
    }
}
