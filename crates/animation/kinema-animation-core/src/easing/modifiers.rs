//! Easing modifiers: derive one curve from another.

/// Play the curve forward then backward over one progress range.
#[inline]
pub fn mirror_easing(ease: impl Fn(f64) -> f64, p: f64) -> f64 {
    if p <= 0.5 {
        ease(2.0 * p) / 2.0
    } else {
        (2.0 - ease(2.0 * (1.0 - p))) / 2.0
    }
}

/// Flip an ease-in into an ease-out and vice versa.
#[inline]
pub fn reverse_easing(ease: impl Fn(f64) -> f64, p: f64) -> f64 {
    1.0 - ease(1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_keep_endpoints() {
        let quad = |p: f64| p * p;
        assert_eq!(reverse_easing(quad, 0.0), 0.0);
        assert_eq!(reverse_easing(quad, 1.0), 1.0);
        assert_eq!(mirror_easing(quad, 0.5), 0.5);
        assert_eq!(mirror_easing(quad, 1.0), 1.0);
        assert_eq!(reverse_easing(quad, 0.5), 0.75);
    }
}
