/// Tolerances governing adaptive arc-length refinement.
///
/// Subdivision of a parametric span stops once the two half-chords fail to
/// exceed the full chord by more than `length`, or once the span itself
/// shrinks below `parametric`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Tolerance {
    /// Chord-length refinement threshold (in model units)
    pub length: f64,
    /// Smallest parametric span worth subdividing
    pub parametric: f64,
}

impl Tolerance {
    pub const DEFAULT_LENGTH: f64 = 1e-7;
    pub const DEFAULT_PARAMETRIC: f64 = 1e-6;

    pub fn new(length: f64, parametric: f64) -> Self {
        Self { length, parametric }
    }

    pub fn default_precision() -> Self {
        Self {
            length: Self::DEFAULT_LENGTH,
            parametric: Self::DEFAULT_PARAMETRIC,
        }
    }

    pub fn loose() -> Self {
        Self {
            length: 1e-4,
            parametric: 1e-4,
        }
    }

    pub fn tight() -> Self {
        Self {
            length: 1e-10,
            parametric: 1e-8,
        }
    }

    /// Check if two lengths are equal within the length tolerance
    pub fn length_eq(self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.length
    }

    /// Check if a parametric span is too small to subdivide
    pub fn span_vanishes(self, t0: f64, t1: f64) -> bool {
        (t1 - t0).abs() < self.parametric
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::default_precision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let tol = Tolerance::default();
        assert_eq!(tol.length, 1e-7);
        assert_eq!(tol.parametric, 1e-6);
    }

    #[test]
    fn test_span_vanishes() {
        let tol = Tolerance::default();
        assert!(tol.span_vanishes(0.5, 0.5 + 1e-8));
        assert!(!tol.span_vanishes(0.5, 0.6));
    }
}
