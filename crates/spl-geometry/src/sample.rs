//! The result-plus-validity pair returned by every evaluation.

/// A best-effort evaluation result.
///
/// Queries outside a curve or surface domain still produce a value (clamped
/// to the nearest defined point) but carry `in_domain = false`, so callers
/// can distinguish "approximately right" from "exactly right".  Structural
/// holes (an empty piecewise curve, an undefined quilt patch) produce a
/// default value with `in_domain = false`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<T> {
    pub value: T,
    pub in_domain: bool,
}

impl<T> Sample<T> {
    #[inline]
    pub fn new(value: T, in_domain: bool) -> Self {
        Self { value, in_domain }
    }

    /// A value produced from a query inside the domain.
    #[inline]
    pub fn valid(value: T) -> Self {
        Self {
            value,
            in_domain: true,
        }
    }

    /// A clamped or otherwise best-effort value.
    #[inline]
    pub fn clamped(value: T) -> Self {
        Self {
            value,
            in_domain: false,
        }
    }

    /// Combine with the validity of an enclosing lookup.  The value always
    /// propagates; the flag only stays set if both levels were in-domain.
    #[inline]
    pub fn narrow(mut self, in_domain: bool) -> Self {
        self.in_domain &= in_domain;
        self
    }

    /// Apply `f` to the value, keeping the flag.
    #[inline]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sample<U> {
        Sample {
            value: f(self.value),
            in_domain: self.in_domain,
        }
    }
}

impl<T: Default> Sample<T> {
    /// The result of a query against undefined geometry.
    #[inline]
    pub fn undefined() -> Self {
        Self {
            value: T::default(),
            in_domain: false,
        }
    }
}
