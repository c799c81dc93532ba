use anyhow::{Result, bail};

pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Absolute tolerance used for every numeric comparison in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance(f64);

impl Tolerance {
    pub fn new(epsilon: f64) -> Result<Self> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            bail!("tolerance must be a positive finite number, got {epsilon}");
        }
        Ok(Self(epsilon))
    }

    pub fn epsilon(self) -> f64 {
        self.0
    }

    pub fn floats_equal(self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.0
    }

    /// Textually identical values match without parsing; otherwise both sides
    /// must parse as floats and fall within tolerance.
    pub fn values_equal(self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
            (Ok(x), Ok(y)) => self.floats_equal(x, y),
            _ => false,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::Tolerance;

    #[test]
    fn boundary_is_exclusive() {
        let tolerance = Tolerance::default();
        assert!(tolerance.floats_equal(0.5, 0.5000009));
        assert!(!tolerance.floats_equal(0.5, 0.5000011));
        assert!(!Tolerance::new(0.5).unwrap().floats_equal(0.0, 0.5));
    }

    #[test]
    fn identical_text_matches_without_parsing() {
        let tolerance = Tolerance::default();
        assert!(tolerance.values_equal("true", "true"));
        assert!(tolerance.values_equal("nan", "nan"));
        assert!(!tolerance.values_equal("A", "B"));
    }

    #[test]
    fn numeric_text_is_compared_within_tolerance() {
        let tolerance = Tolerance::default();
        assert!(tolerance.values_equal("1.0", "1.0000001"));
        assert!(tolerance.values_equal("1e-3", "0.001"));
        assert!(!tolerance.values_equal("1.0", "1.01"));
        assert!(!tolerance.values_equal("1.0", "one"));
    }

    #[test]
    fn distinct_tolerances_coexist() {
        let loose = Tolerance::new(0.1).unwrap();
        let tight = Tolerance::new(1e-9).unwrap();
        assert!(loose.floats_equal(1.0, 1.05));
        assert!(!tight.floats_equal(1.0, 1.05));
    }

    #[test]
    fn rejects_non_positive_or_non_finite_epsilon() {
        assert!(Tolerance::new(0.0).is_err());
        assert!(Tolerance::new(-1e-6).is_err());
        assert!(Tolerance::new(f64::NAN).is_err());
        assert!(Tolerance::new(f64::INFINITY).is_err());
    }
}
