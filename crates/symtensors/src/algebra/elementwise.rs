//! Element-wise maps over stored entries.
//!
//! Only stored entries are touched: absent blocks stay absent, so maps
//! with `f(0) != 0` (such as [`SymTensor::exp`]) are meant for diagonal
//! tensors, where every stored entry is a diagonal element.

use crate::scalar::Scalar;
use crate::tensor::SymTensor;

impl<T: Scalar> SymTensor<T> {
    /// Element-wise modulus.
    pub fn abs(&self) -> Self {
        self.map_elements(|x| T::from_real(x.modulus()))
    }

    /// Element-wise principal square root.
    pub fn sqrt(&self) -> Self {
        self.map_elements(|x| x.principal_sqrt())
    }

    /// `1 / sqrt(x)` where `|x| > cutoff`, zero elsewhere.
    pub fn rsqrt(&self, cutoff: f64) -> Self {
        self.map_elements(|x| {
            if x.modulus() > cutoff {
                T::one() / x.principal_sqrt()
            } else {
                T::zero()
            }
        })
    }

    /// `1 / x` where `|x| > cutoff`, zero elsewhere.
    ///
    /// # Example
    ///
    /// ```
    /// use symtensors::{Config, SymTensor, Symmetry};
    ///
    /// let config = Config::new(Symmetry::u1());
    /// let mut d: SymTensor<f64> = SymTensor::new_diag(&config, 1).unwrap();
    /// d.set_block(&[0, 0], &[3], vec![2.0, 1e-15, 0.5]).unwrap();
    /// assert_eq!(d.reciprocal(1e-12).data(), &[0.5, 0.0, 2.0]);
    /// ```
    pub fn reciprocal(&self, cutoff: f64) -> Self {
        self.map_elements(|x| if x.modulus() > cutoff { T::one() / x } else { T::zero() })
    }

    /// `exp(step * x)`.
    pub fn exp(&self, step: T) -> Self {
        self.map_elements(|x| (step * x).exponential())
    }
}
