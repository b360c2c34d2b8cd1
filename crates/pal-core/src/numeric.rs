/// Absolute and relative bounds for float comparison.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

impl Tolerances {
    /// Values that went through deck text and back: at least seven
    /// significant digits survive formatting and unit conversion.
    pub fn text_round_trip() -> Self {
        Self {
            abs: 1e-9,
            rel: 1e-6,
        }
    }
}

pub fn nearly_equal(a: f64, b: f64, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    diff <= tol.abs || diff <= tol.rel * a.abs().max(b.abs())
}

pub fn slices_nearly_equal(a: &[f64], b: &[f64], tol: Tolerances) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| nearly_equal(*x, *y, tol))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_bound_covers_values_near_zero() {
        let tol = Tolerances::default();
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(0.0, 1e-11, tol));
    }

    #[test]
    fn relative_bound_scales_with_magnitude() {
        let tol = Tolerances::text_round_trip();
        assert!(nearly_equal(14_503.77, 14_503.78, tol));
        assert!(!nearly_equal(1.0, 1.001, tol));
    }

    #[test]
    fn slices_compare_length_first() {
        let tol = Tolerances::default();
        assert!(slices_nearly_equal(&[1.0, 2.0], &[1.0, 2.0], tol));
        assert!(!slices_nearly_equal(&[1.0, 2.0], &[1.0], tol));
    }
}
