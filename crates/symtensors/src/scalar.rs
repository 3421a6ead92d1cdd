//! Scalar trait for tensor element types.

use faer_traits::ComplexField;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub};

pub use faer::c64;

/// Trait for scalar types supported by symtensors.
///
/// This trait wraps faer's `ComplexField` with the arithmetic bounds used by
/// the block kernels. Real-valued helpers (`real_part`, `abs_sqr`, ...) return
/// `f64` since singular values, norms and truncation thresholds are real.
pub trait Scalar:
    ComplexField
    + Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + MulAssign
{
    /// Whether the type carries an imaginary part.
    const IS_COMPLEX: bool;

    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;

    /// Embed a real number.
    fn from_real(x: f64) -> Self;

    /// Complex conjugate (identity for real types).
    fn conjugate(self) -> Self;

    /// Real part.
    fn real_part(self) -> f64;

    /// Squared modulus `|x|^2`.
    fn abs_sqr(self) -> f64;

    /// Modulus `|x|`.
    fn modulus(self) -> f64 {
        self.abs_sqr().sqrt()
    }

    /// Principal square root.
    fn principal_sqrt(self) -> Self;

    /// Exponential.
    fn exponential(self) -> Self;
}

impl Scalar for f64 {
    const IS_COMPLEX: bool = false;

    fn one() -> Self {
        1.0
    }

    fn from_real(x: f64) -> Self {
        x
    }

    fn conjugate(self) -> Self {
        self
    }

    fn real_part(self) -> f64 {
        self
    }

    fn abs_sqr(self) -> f64 {
        self * self
    }

    fn modulus(self) -> f64 {
        self.abs()
    }

    fn principal_sqrt(self) -> Self {
        self.sqrt()
    }

    fn exponential(self) -> Self {
        self.exp()
    }
}

impl Scalar for c64 {
    const IS_COMPLEX: bool = true;

    fn one() -> Self {
        c64::new(1.0, 0.0)
    }

    fn from_real(x: f64) -> Self {
        c64::new(x, 0.0)
    }

    fn conjugate(self) -> Self {
        self.conj()
    }

    fn real_part(self) -> f64 {
        self.re
    }

    fn abs_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    fn principal_sqrt(self) -> Self {
        self.sqrt()
    }

    fn exponential(self) -> Self {
        self.exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_one() {
        assert_eq!(f64::zero(), 0.0);
        assert_eq!(f64::one(), 1.0);
        assert_eq!(c64::zero(), c64::new(0.0, 0.0));
        assert_eq!(c64::one(), c64::new(1.0, 0.0));
    }

    #[test]
    fn test_conjugate_and_modulus() {
        let z = c64::new(3.0, -4.0);
        assert_eq!(z.conjugate(), c64::new(3.0, 4.0));
        assert_relative_eq!(z.modulus(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(z.abs_sqr(), 25.0, epsilon = 1e-12);
        assert_relative_eq!((-2.0f64).modulus(), 2.0);
    }

    #[test]
    fn test_is_complex() {
        assert!(!f64::IS_COMPLEX);
        assert!(c64::IS_COMPLEX);
    }
}
