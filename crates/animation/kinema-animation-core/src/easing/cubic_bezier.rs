//! Cubic-bezier timing curves solved by binary subdivision.

const SUBDIVISION_PRECISION: f64 = 0.000_000_1;
const SUBDIVISION_MAX_ITERATIONS: usize = 12;

/// Bezier polynomial for one axis with fixed endpoints 0 and 1.
#[inline]
fn calc_bezier(t: f64, a1: f64, a2: f64) -> f64 {
    (((1.0 - 3.0 * a2 + 3.0 * a1) * t + (3.0 * a2 - 6.0 * a1)) * t + 3.0 * a1) * t
}

fn binary_subdivide(x: f64, mut lower: f64, mut upper: f64, x1: f64, x2: f64) -> f64 {
    let mut current_t;
    let mut i = 0;
    loop {
        current_t = lower + (upper - lower) / 2.0;
        let current_x = calc_bezier(current_t, x1, x2) - x;
        if current_x > 0.0 {
            upper = current_t;
        } else {
            lower = current_t;
        }
        i += 1;
        if current_x.abs() <= SUBDIVISION_PRECISION || i >= SUBDIVISION_MAX_ITERATIONS {
            break;
        }
    }
    current_t
}

/// Evaluate the curve `[x1, y1, x2, y2]` at progress `p`.
/// Endpoints are returned unchanged; `x1 == y1 && x2 == y2` is the identity.
pub fn cubic_bezier(curve: [f64; 4], p: f64) -> f64 {
    let [x1, y1, x2, y2] = curve;
    if x1 == y1 && x2 == y2 {
        return p;
    }
    if p == 0.0 || p == 1.0 {
        return p;
    }
    calc_bezier(binary_subdivide(p, 0.0, 1.0, x1, x2), y1, y2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_curve_is_linear() {
        for p in [0.1, 0.33, 0.8] {
            assert_eq!(cubic_bezier([0.3, 0.3, 0.7, 0.7], p), p);
        }
    }

    #[test]
    fn ease_in_out_is_symmetric() {
        let curve = [0.42, 0.0, 0.58, 1.0];
        let a = cubic_bezier(curve, 0.25);
        let b = cubic_bezier(curve, 0.75);
        assert!((a + b - 1.0).abs() < 1e-3);
        assert!((cubic_bezier(curve, 0.5) - 0.5).abs() < 1e-3);
        assert_eq!(cubic_bezier(curve, 1.0), 1.0);
    }
}
